//! Render tree node types.
//!
//! The tree is a tagged union with one variant per node shape the wire
//! protocol can describe. Diff messages are decoded into the parallel
//! shapes in [`crate::wire`] and folded into this tree by
//! [`crate::merge`].

use std::collections::BTreeMap;

// ── Statics ───────────────────────────────────────────────────────────────

/// Static fragment source of a composite or comprehension node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statics {
    /// Inline fragment array, e.g. `["<p>", " ", "</p>"]`.
    Inline(Vec<String>),
    /// A bare string; emitted directly, no interleaving.
    Text(String),
    /// Integer reference. Before template substitution this may point into
    /// a per-message template table; afterwards it is a component id.
    /// Negative ids address the pre-merge registry snapshot during a
    /// component merge pass and resolve to nothing at render time.
    Ref(i64),
}

// ── Dynamic-slot keys ─────────────────────────────────────────────────────

/// Dynamic-slot key.
///
/// The derived `Ord` gives the resolution order required for loosely shaped
/// nodes: numeric keys ascending, then named keys lexically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DynKey {
    Index(u64),
    Name(String),
}

impl DynKey {
    /// Parses a wire object key. All-digit keys become indices, everything
    /// else is kept as a named key.
    pub fn parse(raw: &str) -> DynKey {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<u64>() {
                return DynKey::Index(n);
            }
        }
        DynKey::Name(raw.to_owned())
    }
}

/// Ordered mapping from dynamic-slot key to nested node.
pub type Dynamics = BTreeMap<DynKey, Node>;

// ── Node ──────────────────────────────────────────────────────────────────

/// One node of the render tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Opaque string content, emitted verbatim.
    Literal(String),
    /// Indirection through the component registry.
    Ref(i64),
    /// Static fragments interleaved with dynamic slots. `statics: None`
    /// renders as the concatenation of the dynamics in key order.
    Composite {
        statics: Option<Statics>,
        dynamics: Dynamics,
    },
    /// Keyed, ordered list. Every live entry shares `statics`; `count`
    /// bounds iteration, entries at positions `>= count` are retained in
    /// storage but never rendered.
    Comprehension {
        statics: Option<Statics>,
        entries: BTreeMap<u64, Dynamics>,
        count: u64,
    },
}

impl Default for Node {
    fn default() -> Node {
        Node::empty()
    }
}

impl Node {
    /// An empty composite; the tree's state before the initial payload.
    pub fn empty() -> Node {
        Node::Composite {
            statics: None,
            dynamics: Dynamics::new(),
        }
    }

    /// Statics of a composite or comprehension node, if any.
    pub fn statics(&self) -> Option<&Statics> {
        match self {
            Node::Composite { statics, .. } | Node::Comprehension { statics, .. } => {
                statics.as_ref()
            }
            _ => None,
        }
    }

    /// Replaces the statics of a composite or comprehension node. No-op on
    /// leaf nodes.
    pub fn set_statics(&mut self, new: Statics) {
        match self {
            Node::Composite { statics, .. } | Node::Comprehension { statics, .. } => {
                *statics = Some(new);
            }
            _ => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
