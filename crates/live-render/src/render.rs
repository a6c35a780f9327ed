//! Resolver / interleaver.
//!
//! Pure function of the current tree and registry: resolves template and
//! component references and interleaves static fragments with resolved
//! dynamic content into a single markup string. Every failure mode
//! degrades to empty output; rendering cannot raise.

use tracing::trace;

use crate::node::{Dynamics, Node, Statics};
use crate::registry::ComponentRegistry;

/// Renders `node` to markup text.
pub fn render(node: &Node, registry: &ComponentRegistry) -> String {
    let mut out = String::new();
    let mut in_progress = Vec::new();
    render_into(node, registry, &mut in_progress, &mut out);
    out
}

/// Resolved statics, borrowed from the node or the registry.
enum Resolved<'a> {
    Fragments(&'a [String]),
    Text(&'a str),
    /// No statics at all: concatenate dynamics in key order.
    Absent,
    /// Statics present but unresolvable: the node renders empty.
    Unresolved,
}

fn resolve<'a>(
    statics: &'a Option<Statics>,
    registry: &'a ComponentRegistry,
) -> Resolved<'a> {
    match statics {
        None => Resolved::Absent,
        Some(Statics::Inline(fragments)) => Resolved::Fragments(fragments),
        Some(Statics::Text(text)) => Resolved::Text(text),
        Some(Statics::Ref(id)) => match registry.resolve_statics(*id) {
            Some(Statics::Inline(fragments)) => Resolved::Fragments(fragments),
            Some(Statics::Text(text)) => Resolved::Text(text),
            Some(Statics::Ref(_)) | None => {
                trace!(id, "statics reference did not resolve; rendering empty");
                Resolved::Unresolved
            }
        },
    }
}

fn render_into(
    node: &Node,
    registry: &ComponentRegistry,
    in_progress: &mut Vec<i64>,
    out: &mut String,
) {
    match node {
        Node::Literal(text) => out.push_str(text),
        Node::Ref(id) => render_component(*id, registry, in_progress, out),
        Node::Composite { statics, dynamics } => match resolve(statics, registry) {
            Resolved::Fragments(fragments) => {
                interleave(fragments, dynamics, registry, in_progress, out)
            }
            Resolved::Text(text) => out.push_str(text),
            Resolved::Absent => {
                for child in dynamics.values() {
                    render_into(child, registry, in_progress, out);
                }
            }
            Resolved::Unresolved => {}
        },
        Node::Comprehension {
            statics,
            entries,
            count,
        } => {
            let resolved = resolve(statics, registry);
            for position in 0..*count {
                let Some(dynamics) = entries.get(&position) else {
                    continue;
                };
                match &resolved {
                    Resolved::Fragments(fragments) => {
                        interleave(fragments, dynamics, registry, in_progress, out)
                    }
                    Resolved::Text(text) => out.push_str(text),
                    Resolved::Absent => {
                        for child in dynamics.values() {
                            render_into(child, registry, in_progress, out);
                        }
                    }
                    Resolved::Unresolved => {}
                }
            }
        }
    }
}

/// Walks fragments `f0, f1, …, fn`, emitting `f0`, then for each remaining
/// fragment the dynamic at the preceding slot index followed by the
/// fragment. Missing dynamics contribute nothing.
fn interleave(
    fragments: &[String],
    dynamics: &Dynamics,
    registry: &ComponentRegistry,
    in_progress: &mut Vec<i64>,
    out: &mut String,
) {
    let Some((first, rest)) = fragments.split_first() else {
        return;
    };
    out.push_str(first);
    for (slot, fragment) in rest.iter().enumerate() {
        if let Some(child) = dynamics.get(&crate::node::DynKey::Index(slot as u64)) {
            render_into(child, registry, in_progress, out);
        }
        out.push_str(fragment);
    }
}

fn render_component(
    id: i64,
    registry: &ComponentRegistry,
    in_progress: &mut Vec<i64>,
    out: &mut String,
) {
    if in_progress.contains(&id) {
        trace!(id, "component render cycle; emitting nothing");
        return;
    }
    let Some(node) = registry.get(id) else {
        trace!(id, "unknown component reference; emitting nothing");
        return;
    };
    in_progress.push(id);
    render_into(node, registry, in_progress, out);
    in_progress.pop();
}

// ── Tests ─────────────────────────────────────────────────────────────────
