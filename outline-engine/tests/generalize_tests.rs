//! Integration Tests for Formula Generalization
//!
//! Property: applying a learned pattern inserts one formula per matching
//! site, and applying it again after a rebuild inserts nothing.

#[path = "support/functions.rs"]
mod support;

use outline_core::{Document, GeneralizeError, NodeId, OutlineError, ValueType};
use outline_dsl::Expr;
use outline_engine::{repeat_formula, ExtractionRule, OutputPosition, Pattern};
use support::{evaluate, fixture, scope};

const TRIP: &str = "\
- [A] position: 1,1
- [B] position: 2,2
- [C] {Distance(from: #[A], to: #[B])}
- [D] position: 3,3
- [B2] position: 4,4
";

fn child_values(doc: &dyn Document, parent: &str) -> Vec<String> {
    doc.get_node(&NodeId::new(parent))
        .unwrap()
        .children
        .iter()
        .map(|id| doc.get_node(id).unwrap().value)
        .collect()
}

#[tokio::test]
async fn test_learns_anchor_and_sibling_rule() {
    let f = fixture(TRIP);
    evaluate(&f.tree).await;

    let pattern = Pattern::from_example(&scope(&f.tree, "C")).unwrap();
    assert_eq!(pattern.function, "Distance");
    assert_eq!(pattern.anchor.name, "to");
    assert_eq!(pattern.anchor.value_type, ValueType::Location);
    assert_eq!(pattern.anchor.output_position, OutputPosition::Below);
    assert_eq!(
        pattern.arguments,
        vec![
            (Some("from".to_string()), ExtractionRule::PrevSibling(ValueType::Location)),
            (Some("to".to_string()), ExtractionRule::Anchor),
        ]
    );
}

#[tokio::test]
async fn test_repeat_formula_end_to_end() {
    let mut f = fixture(TRIP);
    evaluate(&f.tree).await;

    let inserted = repeat_formula(&scope(&f.tree, "C"), &mut f.doc).unwrap();
    let texts: Vec<&str> = inserted.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "{Distance(from: #[B], to: #[D])}",
            "{Distance(from: #[D], to: #[B2])}",
        ]
    );
    assert_eq!(inserted[1].anchor, NodeId::new("B2"));

    assert_eq!(
        child_values(&f.doc, "root"),
        vec![
            "position: 1,1",
            "position: 2,2",
            "{Distance(from: #[A], to: #[B])}",
            "position: 3,3",
            "{Distance(from: #[B], to: #[D])}",
            "position: 4,4",
            "{Distance(from: #[D], to: #[B2])}",
        ]
    );

    // Second pass over the rebuilt tree finds every formula in place.
    let root = f.tree.root();
    f.tree.rebuild(&root, &f.doc).unwrap();
    evaluate(&f.tree).await;

    let again = repeat_formula(&scope(&f.tree, "C"), &mut f.doc).unwrap();
    assert!(again.is_empty());
    assert_eq!(child_values(&f.doc, "root").len(), 7);
}

#[tokio::test]
async fn test_child_output_uses_closest_ancestor() {
    let mut f = fixture(
        "- [home] position: 0,0\n  - [s1] position: 1,1\n    - [f] {Distance(from: #[home], to: #[s1])}\n  - [s2] position: 2,2\n",
    );
    evaluate(&f.tree).await;

    let pattern = Pattern::from_example(&scope(&f.tree, "f")).unwrap();
    assert_eq!(pattern.anchor.output_position, OutputPosition::Child);
    assert_eq!(
        pattern.arguments[0].1,
        ExtractionRule::ClosestAncestor(ValueType::Location)
    );

    let inserted = pattern.apply(&f.tree, &mut f.doc).unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].parent, NodeId::new("s2"));
    assert_eq!(inserted[0].text, "{Distance(from: #[home], to: #[s2])}");
}

#[tokio::test]
async fn test_interfering_sibling_keeps_literal_reference() {
    let f = fixture(
        "- [A] position: 1,1\n- [M] position: 5,5\n- [B] position: 2,2\n- [C] {Distance(from: #[A], to: #[B])}\n",
    );
    evaluate(&f.tree).await;

    let pattern = Pattern::from_example(&scope(&f.tree, "C")).unwrap();
    assert_eq!(
        pattern.arguments[0].1,
        ExtractionRule::Literal(Expr::id_ref("A"))
    );
}

#[tokio::test]
async fn test_no_adjacent_anchor_declines() {
    let mut f = fixture(
        "- [A] position: 1,1\n- [x] spacer\n- [C] {Distance(from: #[A], to: #[A])}\n",
    );
    evaluate(&f.tree).await;
    let before = child_values(&f.doc, "root");

    let err = repeat_formula(&scope(&f.tree, "C"), &mut f.doc).unwrap_err();
    assert!(matches!(
        err,
        OutlineError::Generalize(GeneralizeError::NoAnchor { .. })
    ));
    assert_eq!(child_values(&f.doc, "root"), before);
}

#[tokio::test]
async fn test_untyped_reference_is_not_an_anchor() {
    let mut f = fixture("- [A] just words\n- [C] {Distance(from: #[A], to: #[A])}\n");
    evaluate(&f.tree).await;

    assert!(repeat_formula(&scope(&f.tree, "C"), &mut f.doc).is_err());
}

#[tokio::test]
async fn test_non_formula_is_rejected() {
    let mut f = fixture("- [k] total: {Distance(from: #[A], to: #[B])}\n- [t] plain text\n");
    evaluate(&f.tree).await;

    for node in ["k", "t"] {
        let err = repeat_formula(&scope(&f.tree, node), &mut f.doc).unwrap_err();
        assert!(matches!(
            err,
            OutlineError::Generalize(GeneralizeError::NotAFormula { .. })
        ));
    }
}
