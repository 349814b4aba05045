//! Formula generalization ("repeat formula")
//!
//! Learns a [`Pattern`] from one example formula scope and applies it to
//! every structurally similar place in the document.
//!
//! ```text
//! - [a] position: 1,1
//! - [b] position: 2,2
//! - [c] {Distance(from: #[a], to: #[b])}     <- example; anchor `to`, below #[b]
//! - [d] position: 3,3
//! - {Distance(from: #[b], to: #[d])}          <- inserted
//! ```

use crate::scope::ScopeHandle;
use crate::tree::ScopeTree;
use outline_core::{Document, GeneralizeError, NodeId, OutlineResult, ValueType};
use outline_dsl::{parse_bullet_or_literal, pretty_print_expr, Argument, Expr, ExprKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// TYPES
// ============================================================================

/// Where a synthesized formula goes relative to the scope that matched the
/// anchor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPosition {
    /// Previous sibling of the match (the example's anchor is its next sibling).
    Above,
    /// Next sibling of the match (the example's anchor is its previous sibling).
    Below,
    /// Last child of the match (the example's anchor is its parent).
    Child,
}

/// How one argument is filled in at a new site.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionRule {
    /// The matching scope itself.
    Anchor,
    /// Nearest ancestor of the site with a value of this type.
    ClosestAncestor(ValueType),
    /// First previous sibling of the site with a value of this type.
    PrevSibling(ValueType),
    /// First next sibling of the site with a value of this type.
    NextSibling(ValueType),
    /// Copied from the example unchanged.
    Literal(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorArgument {
    /// Argument name, or the declared parameter name for positional ones.
    pub name: String,
    pub value_type: ValueType,
    pub output_position: OutputPosition,
}

/// A learned formula shape. Built from one example, used for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub function: String,
    pub anchor: AnchorArgument,
    /// One rule per example argument, keeping names and order.
    pub arguments: Vec<(Option<String>, ExtractionRule)>,
    /// Node of the example formula.
    pub example: NodeId,
}

/// A node created by [`Pattern::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedNode {
    pub node_id: NodeId,
    pub parent: NodeId,
    pub index: usize,
    pub text: String,
    /// The scope's node that matched the anchor type.
    pub anchor: NodeId,
}

// ============================================================================
// LEARNING
// ============================================================================

impl Pattern {
    /// Learn a pattern from a scope whose bullet is a single function call.
    ///
    /// # Returns
    /// * `GeneralizeError::NotAFormula` - the bullet is not exactly one call
    /// * `GeneralizeError::NoAnchor` - no `#[id]` argument is a typed scope
    ///   adjacent to the formula (previous or next sibling, or parent)
    pub fn from_example(scope: &ScopeHandle) -> OutlineResult<Self> {
        let tree = scope.tree();
        let node = scope.node_id().unwrap_or_else(|| NodeId::new(""));
        // Relationships are read at the formula's natural position.
        let site = if scope.is_transclusion() {
            tree.scope_for_node(&node).unwrap_or_else(|| scope.clone())
        } else {
            scope.clone()
        };

        let bullet = site
            .bullet()
            .ok_or_else(|| GeneralizeError::NotAFormula { node: node.clone() })?;
        let call = bullet
            .single_function_call()
            .ok_or_else(|| GeneralizeError::NotAFormula { node: node.clone() })?;
        let (function, args) = call
            .as_function_call()
            .ok_or_else(|| GeneralizeError::NotAFormula { node: node.clone() })?;

        let declared = tree
            .registry()
            .get(function)
            .map(|f| f.parameters())
            .unwrap_or_default();
        let declared_type = |arg: &Argument, index: usize| {
            match &arg.name {
                Some(name) => declared.iter().find(|p| &p.name == name),
                None => declared.get(index),
            }
            .map(|p| (p.name.clone(), p.value_type))
        };

        // (1) anchor
        let mut anchor = None;
        for (index, arg) in args.iter().enumerate() {
            let ExprKind::IdentifierRef(target) = &arg.value.kind else {
                continue;
            };
            let Some(referenced) = tree.scope_for_node(target) else {
                continue;
            };
            let Some(actual) = referenced.value_type() else {
                continue;
            };
            let (name, required) = declared_type(arg, index)
                .unwrap_or_else(|| (arg.name.clone().unwrap_or_else(|| index.to_string()), actual));
            if actual != required {
                continue;
            }
            if let Some(position) = position_of_anchor(&site, &referenced) {
                anchor = Some((
                    index,
                    referenced,
                    AnchorArgument {
                        name,
                        value_type: required,
                        output_position: position,
                    },
                ));
                break;
            }
        }
        let Some((anchor_index, anchor_scope, anchor)) = anchor else {
            return Err(GeneralizeError::NoAnchor {
                function: function.to_string(),
                node,
            }
            .into());
        };

        // (2) rules for the other arguments
        let arguments = args
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                let rule = if index == anchor_index {
                    ExtractionRule::Anchor
                } else {
                    rule_for(tree, &anchor_scope, arg)
                };
                (arg.name.clone(), rule)
            })
            .collect();

        Ok(Self {
            function: function.to_string(),
            anchor,
            arguments,
            example: node,
        })
    }
}

/// Output position implied by where the referenced scope sits relative to
/// the formula, if it is adjacent at all.
fn position_of_anchor(formula: &ScopeHandle, referenced: &ScopeHandle) -> Option<OutputPosition> {
    if formula.parent().as_ref() == Some(referenced) {
        return Some(OutputPosition::Child);
    }
    if formula.parent() != referenced.parent() {
        return None;
    }
    let f = formula.index_in_parent()?;
    let r = referenced.index_in_parent()?;
    if r + 1 == f {
        Some(OutputPosition::Below)
    } else if f + 1 == r {
        Some(OutputPosition::Above)
    } else {
        None
    }
}

/// Generalize one non-anchor argument relative to the anchor, or keep it
/// literal when the relationship is not clean.
fn rule_for(tree: &ScopeTree, anchor: &ScopeHandle, arg: &Argument) -> ExtractionRule {
    let literal = ExtractionRule::Literal(arg.value.without_spans());
    let ExprKind::IdentifierRef(target) = &arg.value.kind else {
        return literal;
    };
    let Some(referenced) = tree.scope_for_node(target) else {
        return literal;
    };
    let Some(value_type) = referenced.value_type() else {
        return literal;
    };

    // Ancestor with nothing of the same type in between.
    let mut current = anchor.parent();
    while let Some(ancestor) = current {
        if ancestor == referenced {
            return ExtractionRule::ClosestAncestor(value_type);
        }
        if ancestor.value_type() == Some(value_type) {
            break;
        }
        current = ancestor.parent();
    }

    if anchor.parent() != referenced.parent() || anchor.parent().is_none() {
        return literal;
    }
    let (Some(a), Some(r), Some(parent)) = (
        anchor.index_in_parent(),
        referenced.index_in_parent(),
        anchor.parent(),
    ) else {
        return literal;
    };
    if r == a {
        return literal;
    }
    let siblings = parent.children();
    let (low, high) = if r < a { (r, a) } else { (a, r) };
    let interfering = siblings[low + 1..high]
        .iter()
        .any(|s| s.value_type() == Some(value_type));
    if interfering {
        return literal;
    }
    if r < a {
        ExtractionRule::PrevSibling(value_type)
    } else {
        ExtractionRule::NextSibling(value_type)
    }
}

// ============================================================================
// APPLYING
// ============================================================================

impl Pattern {
    /// Insert the formula at every scope of the anchor type where all rules
    /// resolve and no equivalent formula already sits at the output site.
    /// Transcluded subtrees are skipped.
    pub fn apply(&self, tree: &ScopeTree, document: &mut dyn Document) -> OutlineResult<Vec<InsertedNode>> {
        let mut sites = Vec::new();
        tree.root().traverse_scope(
            |scope, _: &()| {
                if !scope.is_placeholder()
                    && scope.value_type() == Some(self.anchor.value_type)
                    && scope.node_id().as_ref() != Some(&self.example)
                {
                    sites.push(scope.clone());
                }
            },
            (),
            false,
        );

        let mut inserted = Vec::new();
        for site in sites {
            let Some(formula) = self.synthesize(&site) else {
                continue;
            };
            let Some(site_node) = site.node_id() else {
                continue;
            };
            let Some((parent, index)) = output_slot(document, &site_node, self.anchor.output_position)
            else {
                continue;
            };
            if has_equivalent(document, &parent, &formula) {
                tracing::trace!(site = %site_node, "Equivalent formula already present");
                continue;
            }

            let text = format!("{{{}}}", pretty_print_expr(&formula));
            let node_id = document.create_node(&text);
            document.insert_child(&parent, index, &node_id)?;
            tracing::info!(
                node = %node_id,
                parent = %parent,
                index,
                function = %self.function,
                "Inserted generalized formula"
            );
            inserted.push(InsertedNode {
                node_id,
                parent,
                index,
                text,
                anchor: site_node,
            });
        }
        Ok(inserted)
    }

    /// Concrete call for one site, or None if some rule finds nothing.
    fn synthesize(&self, site: &ScopeHandle) -> Option<Expr> {
        let mut args = Vec::with_capacity(self.arguments.len());
        for (name, rule) in &self.arguments {
            let value = match rule {
                ExtractionRule::Anchor => Expr::id_ref(site.node_id()?),
                ExtractionRule::ClosestAncestor(t) => {
                    let mut current = site.parent();
                    loop {
                        let ancestor = current?;
                        if ancestor.value_type() == Some(*t) {
                            break Expr::id_ref(ancestor.node_id()?);
                        }
                        current = ancestor.parent();
                    }
                }
                ExtractionRule::PrevSibling(t) => {
                    let siblings = site.parent()?.children();
                    let index = site.index_in_parent()?;
                    let found = siblings[..index]
                        .iter()
                        .rev()
                        .find(|s| s.value_type() == Some(*t))?;
                    Expr::id_ref(found.node_id()?)
                }
                ExtractionRule::NextSibling(t) => {
                    let siblings = site.parent()?.children();
                    let index = site.index_in_parent()?;
                    let found = siblings[index + 1..]
                        .iter()
                        .find(|s| s.value_type() == Some(*t))?;
                    Expr::id_ref(found.node_id()?)
                }
                ExtractionRule::Literal(expr) => expr.clone(),
            };
            args.push(Argument {
                name: name.clone(),
                value,
                span: Default::default(),
            });
        }
        Some(Expr::call(self.function.clone(), args))
    }
}

/// Parent and insertion index in the current document.
fn output_slot(document: &dyn Document, site: &NodeId, position: OutputPosition) -> Option<(NodeId, usize)> {
    if position == OutputPosition::Child {
        let node = document.get_node(site)?;
        return Some((site.clone(), node.children.len()));
    }
    let parent = document.parent_of(site)?;
    let index = document
        .get_node(&parent)?
        .children
        .iter()
        .position(|c| c == site)?;
    match position {
        OutputPosition::Above => Some((parent, index)),
        _ => Some((parent, index + 1)),
    }
}

/// Same function, same positional arguments in order, same named
/// arguments in any order. Spans and formatting are ignored.
#[derive(Debug, PartialEq)]
struct FormulaShape {
    function: String,
    positional: Vec<Expr>,
    named: BTreeMap<String, Expr>,
}

impl FormulaShape {
    fn of(expr: &Expr) -> Option<Self> {
        let (function, args) = expr.as_function_call()?;
        let mut shape = Self {
            function: function.to_string(),
            positional: Vec::new(),
            named: BTreeMap::new(),
        };
        for arg in args {
            let value = arg.value.without_spans();
            match &arg.name {
                Some(name) => {
                    shape.named.entry(name.clone()).or_insert(value);
                }
                None => shape.positional.push(value),
            }
        }
        Some(shape)
    }
}

/// True if a child of `parent` already holds an equivalent formula.
fn has_equivalent(document: &dyn Document, parent: &NodeId, formula: &Expr) -> bool {
    let Some(wanted) = FormulaShape::of(formula) else {
        return false;
    };
    let Some(parent) = document.get_node(parent) else {
        return false;
    };
    parent.children.iter().any(|child| {
        document
            .get_node(child)
            .map(|node| parse_bullet_or_literal(&node.value))
            .and_then(|bullet| bullet.single_function_call().and_then(FormulaShape::of))
            .is_some_and(|shape| shape == wanted)
    })
}

/// Learn a pattern from `scope` and apply it to its whole tree.
pub fn repeat_formula(scope: &ScopeHandle, document: &mut dyn Document) -> OutlineResult<Vec<InsertedNode>> {
    let pattern = Pattern::from_example(scope)?;
    tracing::debug!(
        function = %pattern.function,
        anchor = %pattern.anchor.name,
        position = ?pattern.anchor.output_position,
        "Learned formula pattern"
    );
    pattern.apply(scope.tree(), document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_dsl::parse_inline_expr;

    fn shape(source: &str) -> FormulaShape {
        let expr = parse_inline_expr(source).unwrap();
        let ExprKind::InlineExpr(inner) = expr.kind else {
            panic!("expected inline expression");
        };
        FormulaShape::of(&inner).unwrap()
    }

    #[test]
    fn test_shape_ignores_named_order_and_spacing() {
        assert_eq!(
            shape("{Distance(from: #[a], to: #[b])}"),
            shape("{Distance( to:#[b] , from: #[a] )}")
        );
    }

    #[test]
    fn test_shape_keeps_positional_order() {
        assert_ne!(shape("{Distance(#[a], #[b])}"), shape("{Distance(#[b], #[a])}"));
        assert_ne!(shape("{Distance(#[a], #[b])}"), shape("{Days(#[a], #[b])}"));
    }

    #[test]
    fn test_shape_is_not_fooled_by_literal_text() {
        let mut doc = outline_core::InMemoryDocument::from_outline(
            "- [p] parent\n  - [n] note: {Distance(from: #[a], to: #[b])} was wrong\n",
        )
        .unwrap();
        let formula = Expr::call(
            "Distance",
            vec![
                Argument::named("from", Expr::id_ref("a")),
                Argument::named("to", Expr::id_ref("b")),
            ],
        );
        assert!(!has_equivalent(&doc, &NodeId::new("p"), &formula));

        doc.add_child_with_id(
            &NodeId::new("p"),
            NodeId::new("f"),
            "{Distance(to: #[b], from: #[a])}",
        )
        .unwrap();
        assert!(has_equivalent(&doc, &NodeId::new("p"), &formula));
    }

    #[test]
    fn test_output_slot_positions() {
        let doc = outline_core::InMemoryDocument::from_outline("- [a] x\n- [b] y\n  - [c] z\n").unwrap();
        let root = NodeId::new("root");
        assert_eq!(
            output_slot(&doc, &NodeId::new("b"), OutputPosition::Above),
            Some((root.clone(), 1))
        );
        assert_eq!(
            output_slot(&doc, &NodeId::new("b"), OutputPosition::Below),
            Some((root, 2))
        );
        assert_eq!(
            output_slot(&doc, &NodeId::new("b"), OutputPosition::Child),
            Some((NodeId::new("b"), 1))
        );
    }
}
