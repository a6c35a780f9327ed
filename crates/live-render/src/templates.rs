//! Template table substitution.
//!
//! A diff message may carry a `p` table of reusable fragment arrays so that
//! repeated static content is sent once and referenced by small integer.
//! Substitution rewrites every in-scope `Statics::Ref` into the concrete
//! fragment array before the fragment reaches the merge engine; tables are
//! consumed in the process. Pure and stateless per call.

use tracing::trace;

use crate::node::Statics;
use crate::wire::{DiffNode, EntryDiff, TemplateTable};

/// Substitutes static-by-index references throughout `diff`.
///
/// A table attached to a fragment applies to its whole subtree, including
/// comprehension entry diffs; an inner table shadows an outer one. Negative
/// references are component-registry addresses and are never substituted.
/// An in-scope reference with no matching row substitutes an empty fragment
/// array, which renders as `""`.
pub fn substitute(diff: &mut DiffNode, inherited: Option<&TemplateTable>) {
    match diff {
        DiffNode::Fragment {
            statics,
            dynamics,
            templates,
        } => {
            let own = templates.take();
            let table = own.as_ref().or(inherited);
            substitute_statics(statics, table);
            for child in dynamics.values_mut() {
                substitute(child, table);
            }
        }
        DiffNode::Comprehension {
            statics,
            entries,
            templates,
            ..
        } => {
            let own = templates.take();
            let table = own.as_ref().or(inherited);
            substitute_statics(statics, table);
            for entry in entries.values_mut() {
                match entry {
                    EntryDiff::Patch(dynamics) | EntryDiff::MoveMerge(_, dynamics) => {
                        for child in dynamics.values_mut() {
                            substitute(child, table);
                        }
                    }
                    EntryDiff::Fill | EntryDiff::Move(_) => {}
                }
            }
        }
        DiffNode::Literal(_) | DiffNode::Ref(_) => {}
    }
}

fn substitute_statics(statics: &mut Option<Statics>, table: Option<&TemplateTable>) {
    let Some(table) = table else { return };
    let Some(Statics::Ref(index)) = statics else {
        return;
    };
    let Ok(index) = u64::try_from(*index) else {
        // Negative: pre-merge registry snapshot address, not a template.
        return;
    };
    let fragments = match table.get(&index) {
        Some(row) => row.clone(),
        None => {
            trace!(index, "template index out of range; substituting empty");
            Vec::new()
        }
    };
    *statics = Some(Statics::Inline(fragments));
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::wire::decode_node;

    fn fragments(node: &DiffNode) -> Option<&Vec<String>> {
        let statics = match node {
            DiffNode::Fragment { statics, .. } | DiffNode::Comprehension { statics, .. } => statics,
            _ => return None,
        };
        match statics {
            Some(Statics::Inline(rows)) => Some(rows),
            _ => None,
        }
    }

    #[test]
    fn substitutes_nested_references() {
        let mut diff = decode_node(&json!({
            "0": {"s": 1, "0": "inner"},
            "s": 0,
            "p": [["<div>", "</div>"], ["<em>", "</em>"]],
        }));
        substitute(&mut diff, None);
        assert_eq!(
            fragments(&diff),
            Some(&vec!["<div>".into(), "</div>".into()])
        );
        let DiffNode::Fragment { dynamics, templates, .. } = &diff else {
            panic!("expected fragment");
        };
        assert!(templates.is_none(), "table must be consumed");
        let child = dynamics.values().next().unwrap();
        assert_eq!(fragments(child), Some(&vec!["<em>".into(), "</em>".into()]));
    }

    #[test]
    fn inner_table_shadows_outer() {
        let mut diff = decode_node(&json!({
            "0": {"s": 0, "p": [["inner-"]]},
            "s": 0,
            "p": [["outer-"]],
        }));
        substitute(&mut diff, None);
        assert_eq!(fragments(&diff), Some(&vec!["outer-".into()]));
        let DiffNode::Fragment { dynamics, .. } = &diff else {
            panic!("expected fragment");
        };
        let child = dynamics.values().next().unwrap();
        assert_eq!(fragments(child), Some(&vec!["inner-".into()]));
    }

    #[test]
    fn out_of_range_reference_becomes_empty() {
        let mut diff = decode_node(&json!({"s": 9, "0": "x", "p": [["only"]]}));
        substitute(&mut diff, None);
        assert_eq!(fragments(&diff), Some(&Vec::new()));
    }

    #[test]
    fn reference_without_table_is_left_alone() {
        let mut diff = decode_node(&json!({"s": 1, "0": "x"}));
        substitute(&mut diff, None);
        let DiffNode::Fragment { statics, .. } = &diff else {
            panic!("expected fragment");
        };
        assert_eq!(statics, &Some(Statics::Ref(1)));
    }

    #[test]
    fn negative_reference_is_never_substituted() {
        let mut diff = decode_node(&json!({"s": -1, "0": "x", "p": [["row"]]}));
        substitute(&mut diff, None);
        let DiffNode::Fragment { statics, .. } = &diff else {
            panic!("expected fragment");
        };
        assert_eq!(statics, &Some(Statics::Ref(-1)));
    }

    #[test]
    fn applies_inside_comprehension_entries() {
        let mut diff = decode_node(&json!({
            "entries": {"0": {"0": {"s": 0, "0": "a"}}, "1": [0, {"0": {"s": 0}}]},
            "count": 2,
            "p": [["<tr>", "</tr>"]],
        }));
        substitute(&mut diff, None);
        let DiffNode::Comprehension { entries, .. } = &diff else {
            panic!("expected comprehension");
        };
        let EntryDiff::Patch(dynamics) = entries.get(&0).unwrap() else {
            panic!("expected patch");
        };
        let child = dynamics.values().next().unwrap();
        assert_eq!(fragments(child), Some(&vec!["<tr>".into(), "</tr>".into()]));
        let EntryDiff::MoveMerge(0, dynamics) = entries.get(&1).unwrap() else {
            panic!("expected move-merge");
        };
        let child = dynamics.values().next().unwrap();
        assert_eq!(fragments(child), Some(&vec!["<tr>".into(), "</tr>".into()]));
    }
}
