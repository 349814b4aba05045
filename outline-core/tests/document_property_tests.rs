//! Property-Based Tests for the In-Memory Document
//!
//! Property: rendering a document with `to_outline` and parsing the result
//! with `from_outline` SHALL reproduce the same tree (ids, values and child
//! order), and every mutation SHALL bump the version.

use outline_core::{Document, InMemoryDocument, NodeId};
use proptest::prelude::*;

// ============================================================================
// ARBITRATORS
// ============================================================================

/// Depth of each line relative to the previous one: a line may go at most
/// one level deeper than its predecessor.
fn arb_shape() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..20).prop_map(|steps| {
        let mut depths = Vec::with_capacity(steps.len());
        let mut previous = 0usize;
        for (i, step) in steps.into_iter().enumerate() {
            let depth = if i == 0 { 0 } else { step.min(previous + 1) };
            depths.push(depth);
            previous = depth;
        }
        depths
    })
}

fn arb_outline() -> impl Strategy<Value = String> {
    arb_shape().prop_flat_map(|depths| {
        let n = depths.len();
        (Just(depths), prop::collection::vec("[a-z0-9:,. ]{0,12}", n))
    })
    .prop_map(|(depths, values)| {
        let mut outline = String::new();
        for (i, (depth, value)) in depths.iter().zip(values).enumerate() {
            outline.push_str(&"  ".repeat(*depth));
            outline.push_str(&format!("- [n{}] {}\n", i, value.trim()));
        }
        outline
    })
}

fn snapshot(doc: &InMemoryDocument) -> Vec<(NodeId, String, Vec<NodeId>)> {
    let mut out = Vec::new();
    let mut stack = vec![doc.root_id()];
    while let Some(id) = stack.pop() {
        if let Some(node) = doc.get_node(&id) {
            stack.extend(node.children.iter().rev().cloned());
            out.push((node.id, node.value, node.children));
        }
    }
    out
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn prop_outline_text_round_trips(outline in arb_outline()) {
        let doc = InMemoryDocument::from_outline(&outline).expect("generated outline parses");
        let reparsed = InMemoryDocument::from_outline(&doc.to_outline()).expect("rendered outline parses");

        prop_assert_eq!(snapshot(&doc), snapshot(&reparsed));
        prop_assert_eq!(doc.len(), reparsed.len());
    }

    #[test]
    fn prop_mutations_bump_version(outline in arb_outline(), value in "[a-z]{1,8}") {
        let mut doc = InMemoryDocument::from_outline(&outline).expect("generated outline parses");
        prop_assert_eq!(doc.version(), 0);

        let root = doc.root_id();
        let created = doc.create_node(&value);
        let after_create = doc.version();
        prop_assert!(after_create > 0);
        prop_assert_eq!(doc.parent_of(&created), None);

        doc.insert_child(&root, 0, &created).expect("insert under root");
        let after_insert = doc.version();
        prop_assert!(after_insert > after_create);
        prop_assert_eq!(doc.parent_of(&created), Some(root.clone()));

        doc.remove_child(&root, &created).expect("remove from root");
        prop_assert!(doc.version() > after_insert);
        prop_assert_eq!(doc.parent_of(&created), None);
    }

    #[test]
    fn prop_nodes_cannot_move_below_themselves(outline in arb_outline()) {
        let mut doc = InMemoryDocument::from_outline(&outline).expect("generated outline parses");
        let first = NodeId::from("n0");
        let version = doc.version();

        prop_assert!(doc.insert_child(&first, 0, &first).is_err());
        prop_assert_eq!(doc.version(), version);
    }
}
