//! Diff merge engine.
//!
//! Folds one decoded diff fragment into the render tree. Template
//! substitution ([`crate::templates`]) has already run by the time a
//! fragment reaches [`merge`]; the rules applied here, in priority order:
//!
//! 1. a source carrying statics replaces the target wholesale — stale
//!    statics and stale dynamics never coexist;
//! 2. a comprehension diff reconciles keyed entries against a snapshot of
//!    the target's pre-merge entries, because move descriptors read from
//!    pre-merge positions;
//! 3. anything else merges per key: composite-shaped on both sides
//!    recurses, otherwise the source value replaces the target's.
//!
//! The engine performs no I/O, never blocks, and never fails: malformed
//! descriptors skip that single entry and processing continues.

use std::collections::BTreeMap;

use tracing::{trace, warn};

use crate::node::{Dynamics, Node};
use crate::wire::{DiffNode, EntryDiff};

/// Merges `source` into `target`, returning the new node.
pub fn merge(target: Node, source: DiffNode) -> Node {
    match source {
        DiffNode::Literal(text) => Node::Literal(text),
        DiffNode::Ref(id) => Node::Ref(id),
        source @ DiffNode::Fragment { statics: Some(_), .. } => materialize(source),
        source @ DiffNode::Comprehension { statics: Some(_), .. } => materialize(source),
        DiffNode::Comprehension { entries, count, .. } => {
            merge_comprehension(target, entries, count)
        }
        DiffNode::Fragment { dynamics, .. } => {
            // Keys absent from the source leave the target untouched, so a
            // keyless fragment is a no-op against any target shape.
            if dynamics.is_empty() {
                return target;
            }
            match target {
                Node::Composite {
                    statics,
                    dynamics: mut merged,
                } => {
                    merge_dynamics(&mut merged, dynamics);
                    Node::Composite {
                        statics,
                        dynamics: merged,
                    }
                }
                other => {
                    if matches!(other, Node::Comprehension { .. }) {
                        trace!("plain fragment diff replaces comprehension target");
                    }
                    materialize(DiffNode::Fragment {
                        statics: None,
                        dynamics,
                        templates: None,
                    })
                }
            }
        }
    }
}

/// Keyed reconciliation. Move descriptors address positions in the
/// target's pre-merge entries, so those are cloned up front; in-place
/// patches see the entries as they stand mid-merge.
fn merge_comprehension(
    target: Node,
    source: BTreeMap<u64, EntryDiff>,
    count: Option<u64>,
) -> Node {
    let (statics, mut entries, prior_count) = match target {
        Node::Comprehension {
            statics,
            entries,
            count,
        } => (statics, entries, Some(count)),
        _ => (None, BTreeMap::new(), None),
    };
    let snapshot = entries.clone();
    for (position, descriptor) in source {
        match descriptor {
            EntryDiff::Fill => {
                entries.insert(position, Dynamics::new());
            }
            EntryDiff::Move(old) => match snapshot.get(&old) {
                Some(entry) => {
                    entries.insert(position, entry.clone());
                }
                None => warn!(position, old, "move source missing; entry skipped"),
            },
            EntryDiff::MoveMerge(old, diff) => {
                let mut entry = snapshot.get(&old).cloned().unwrap_or_default();
                merge_dynamics(&mut entry, diff);
                entries.insert(position, entry);
            }
            EntryDiff::Patch(diff) => {
                let mut entry = entries.remove(&position).unwrap_or_default();
                merge_dynamics(&mut entry, diff);
                entries.insert(position, entry);
            }
        }
    }
    let count = count
        .or(prior_count)
        .unwrap_or_else(|| entries.keys().next_back().map(|last| last + 1).unwrap_or(0));
    Node::Comprehension {
        statics,
        entries,
        count,
    }
}

fn merge_dynamics(target: &mut Dynamics, source: BTreeMap<crate::node::DynKey, DiffNode>) {
    for (key, diff) in source {
        let merged = match target.remove(&key) {
            Some(existing) => merge(existing, diff),
            None => materialize(diff),
        };
        target.insert(key, merged);
    }
}

/// Builds a tree node from a diff fragment with no prior state. Move
/// descriptors have nothing to move from and degrade accordingly.
pub fn materialize(source: DiffNode) -> Node {
    match source {
        DiffNode::Literal(text) => Node::Literal(text),
        DiffNode::Ref(id) => Node::Ref(id),
        DiffNode::Fragment {
            statics, dynamics, ..
        } => Node::Composite {
            statics,
            dynamics: materialize_dynamics(dynamics),
        },
        DiffNode::Comprehension {
            statics,
            entries,
            count,
            ..
        } => {
            let mut node = merge_comprehension(Node::empty(), entries, count);
            if let Some(statics) = statics {
                node.set_statics(statics);
            }
            node
        }
    }
}

fn materialize_dynamics(source: BTreeMap<crate::node::DynKey, DiffNode>) -> Dynamics {
    source
        .into_iter()
        .map(|(key, diff)| (key, materialize(diff)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────
