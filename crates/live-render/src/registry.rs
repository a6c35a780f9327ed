//! Component registry.
//!
//! Components are independently addressable subtrees keyed by small
//! integer id. A component diff may declare its statics as a reference to
//! another component's statics (template inheritance) instead of resending
//! the fragment array; negative ids address the registry as it stood
//! before the current merge pass, which lets a component's diff be
//! expressed relative to its own prior template. References are chased
//! eagerly during the pass so that nothing negative survives into the
//! long-lived registry. Entries are never deleted for the life of the
//! session.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::trace;

use crate::merge::merge;
use crate::node::{Node, Statics};
use crate::templates;
use crate::wire::DiffNode;

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    entries: IndexMap<i64, Node>,
}

impl ComponentRegistry {
    pub fn new() -> ComponentRegistry {
        ComponentRegistry::default()
    }

    /// The stored node for `id`; `None` renders as `""`, never an error.
    pub fn get(&self, id: i64) -> Option<&Node> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies a message's component table as one merge pass, in ascending
    /// id order. Positive statics references read the registry as it
    /// stands mid-pass (earlier upserts of the same pass are visible);
    /// negative references read the pre-merge snapshot of `-id`.
    pub fn upsert_all(&mut self, diffs: BTreeMap<i64, DiffNode>) {
        if diffs.is_empty() {
            return;
        }
        let snapshot = self.entries.clone();
        let mut cache: HashMap<i64, Option<Statics>> = HashMap::new();
        for (id, mut diff) in diffs {
            templates::substitute(&mut diff, None);
            let target = self
                .entries
                .get(&id)
                .cloned()
                .unwrap_or_else(Node::empty);
            let mut merged = merge(target, diff);
            self.resolve_merged_statics(&mut merged, &snapshot, &mut cache);
            self.entries.insert(id, merged);
        }
    }

    fn resolve_merged_statics(
        &self,
        node: &mut Node,
        snapshot: &IndexMap<i64, Node>,
        cache: &mut HashMap<i64, Option<Statics>>,
    ) {
        let Some(Statics::Ref(reference)) = node.statics() else {
            return;
        };
        let reference = *reference;
        match self.chase(reference, snapshot, cache, &mut HashSet::new()) {
            Some(resolved) => node.set_statics(resolved),
            None => trace!(reference, "statics reference unresolved; left as dead end"),
        }
    }

    /// Follows a statics reference chain to a literal fragment array (or
    /// bare string). Memoized per pass; a revisited id is a cycle and
    /// resolves to nothing.
    fn chase(
        &self,
        reference: i64,
        snapshot: &IndexMap<i64, Node>,
        cache: &mut HashMap<i64, Option<Statics>>,
        visited: &mut HashSet<i64>,
    ) -> Option<Statics> {
        if let Some(hit) = cache.get(&reference) {
            return hit.clone();
        }
        if !visited.insert(reference) {
            trace!(reference, "statics reference cycle; resolving to nothing");
            return None;
        }
        let node = if reference < 0 {
            snapshot.get(&-reference)
        } else {
            self.entries.get(&reference)
        };
        let resolved = match node.and_then(Node::statics) {
            Some(Statics::Ref(next)) => {
                let next = *next;
                self.chase(next, snapshot, cache, visited)
            }
            Some(other) => Some(other.clone()),
            None => None,
        };
        cache.insert(reference, resolved.clone());
        resolved
    }

    /// Render-time chained lookup: statics of component `id`, following
    /// component-to-component references. Cycles and missing entries
    /// resolve to `None`.
    pub fn resolve_statics(&self, id: i64) -> Option<&Statics> {
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                trace!(id, "statics reference cycle at render; resolving empty");
                return None;
            }
            match self.get(current)?.statics()? {
                Statics::Ref(next) => current = *next,
                other => return Some(other),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
