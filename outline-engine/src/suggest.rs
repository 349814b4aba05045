//! Suggestion engine
//!
//! Collects the typed values around a scope (the scope itself, its
//! ancestors, its siblings and the subtrees below them) as [`Parameter`]s
//! ranked by structural distance, then asks every registered function to
//! turn them into formula suggestions.

use crate::scope::ScopeHandle;
use outline_core::{SuggestionConfig, Value, ValueType};
use outline_dsl::{pretty_print_expr, Argument, Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// TYPES
// ============================================================================

/// How a parameter's source scope relates to the scope being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// The scope itself or something below it.
    #[serde(rename = "self")]
    SelfScope,
    Prev,
    Next,
    Parent,
}

/// A typed value found near a scope. Built per request, never stored.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub relationship: Relationship,
    /// Parent hops, sibling offset, plus depth inside a subtree.
    pub distance: usize,
    pub value_type: ValueType,
    pub value: Value,
    /// `#[id]` reference to the source node.
    pub source_expression: String,
    pub source_scope: ScopeHandle,
}

/// A formula the UI can insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub function: String,
    /// Bullet text including braces, e.g. `{Days(from: #[a], to: #[b])}`.
    pub expression: String,
    /// Lower is better; None for autocomplete fallbacks.
    pub rank: Option<usize>,
}

impl Suggestion {
    /// Suggestion for `function(args...)` with the given rank.
    pub fn call(function: &str, args: Vec<Argument>, rank: Option<usize>) -> Self {
        let expr = Expr::call(function, args);
        Self {
            function: function.to_string(),
            expression: format!("{{{}}}", pretty_print_expr(&expr)),
            rank,
        }
    }

    /// Fallback with every declared argument left empty: `{Fn(a:, b:)}`.
    pub fn template(function: &str, arg_names: &[&str]) -> Self {
        let args = arg_names
            .iter()
            .map(|name| Argument::named(*name, Expr::undefined()))
            .collect();
        Self::call(function, args, None)
    }
}

// ============================================================================
// PARAMETER COLLECTION
// ============================================================================

/// Typed values around `scope`, deduplicated by source expression with
/// the smallest distance kept. Sorted by distance.
pub fn collect_parameters(scope: &ScopeHandle) -> Vec<Parameter> {
    let config = scope.tree().config().suggestion.clone();
    let mut collector = Collector {
        config: &config,
        found: Vec::new(),
        index: HashMap::new(),
    };

    // (a) the scope and what it owns
    collector.subtree(scope, Relationship::SelfScope, 0, 0);

    // (b) ancestors
    let mut hops = 0;
    let mut current = scope.parent();
    while let Some(ancestor) = current {
        hops += 1;
        if hops > config.max_ancestor_depth {
            break;
        }
        collector.add(&ancestor, Relationship::Parent, hops);
        for (_, transcluded) in ancestor.transcluded_scopes() {
            collector.subtree(&transcluded, Relationship::Parent, hops + 1, 1);
        }
        current = ancestor.parent();
    }

    // (c) siblings outward from the scope's own index
    if let (Some(parent), Some(index)) = (scope.parent(), scope.index_in_parent()) {
        let siblings = parent.children();
        for offset in 1..=config.max_sibling_distance {
            if let Some(prev) = index.checked_sub(offset).and_then(|i| siblings.get(i)) {
                collector.subtree(prev, Relationship::Prev, offset, 0);
            }
            if let Some(next) = siblings.get(index + offset) {
                collector.subtree(next, Relationship::Next, offset, 0);
            }
        }
    }

    let mut found = collector.found;
    found.sort_by_key(|p| p.distance);
    found
}

struct Collector<'a> {
    config: &'a SuggestionConfig,
    found: Vec<Parameter>,
    /// source expression → index in `found`
    index: HashMap<String, usize>,
}

impl Collector<'_> {
    fn add(&mut self, scope: &ScopeHandle, relationship: Relationship, distance: usize) {
        if scope.is_placeholder() {
            return;
        }
        let (Some(node), Some(value)) = (scope.node_id(), scope.typed_value()) else {
            return;
        };
        let Some(value_type) = value.value_type().filter(|t| *t != ValueType::Text) else {
            return;
        };

        let source_expression = format!("#[{}]", node);
        let parameter = Parameter {
            relationship,
            distance,
            value_type,
            value,
            source_expression: source_expression.clone(),
            source_scope: scope.clone(),
        };
        match self.index.get(&source_expression) {
            Some(&i) if self.found[i].distance <= distance => {}
            Some(&i) => self.found[i] = parameter,
            None => {
                self.index.insert(source_expression, self.found.len());
                self.found.push(parameter);
            }
        }
    }

    /// The scope, then its children and transclusions down to the
    /// configured depth. Distance grows by one per level.
    fn subtree(&mut self, scope: &ScopeHandle, relationship: Relationship, distance: usize, depth: usize) {
        self.add(scope, relationship, distance);
        if depth >= self.config.max_subtree_depth {
            return;
        }
        for child in scope.children() {
            self.subtree(&child, relationship, distance + 1, depth + 1);
        }
        for (_, transcluded) in scope.transcluded_scopes() {
            self.subtree(&transcluded, relationship, distance + 1, depth + 1);
        }
    }
}

// ============================================================================
// HELPERS FOR FUNCTION IMPLEMENTATIONS
// ============================================================================

pub fn parameters_of_type(
    parameters: &[Parameter],
    value_type: ValueType,
) -> impl Iterator<Item = &Parameter> {
    parameters.iter().filter(move |p| p.value_type == value_type)
}

/// One suggestion per parameter of `value_type`: `{Fn(arg: #[x])}`,
/// ranked by the parameter's distance.
pub fn single(function: &str, arg: &str, value_type: ValueType, parameters: &[Parameter]) -> Vec<Suggestion> {
    parameters_of_type(parameters, value_type)
        .map(|p| {
            Suggestion::call(
                function,
                vec![Argument::named(arg, source_expr(p))],
                Some(p.distance),
            )
        })
        .collect()
}

/// One suggestion per pair of distinct parameters, ranked by the sum of
/// their distances. When both slots share a type, each unordered pair is
/// offered once, ordered by document position.
pub fn pairwise(
    function: &str,
    first: (&str, ValueType),
    second: (&str, ValueType),
    parameters: &[Parameter],
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    let same_type = first.1 == second.1;

    for (i, a) in parameters.iter().enumerate() {
        if a.value_type != first.1 {
            continue;
        }
        for (j, b) in parameters.iter().enumerate() {
            if b.value_type != second.1 || i == j {
                continue;
            }
            if same_type && !precedes(a, b) {
                continue;
            }
            suggestions.push(Suggestion::call(
                function,
                vec![
                    Argument::named(first.0, source_expr(a)),
                    Argument::named(second.0, source_expr(b)),
                ],
                Some(a.distance + b.distance),
            ));
        }
    }
    suggestions
}

fn source_expr(parameter: &Parameter) -> Expr {
    match parameter.source_scope.node_id() {
        Some(node) => Expr::id_ref(node),
        None => Expr::undefined(),
    }
}

/// Document order of two parameter sources.
fn precedes(a: &Parameter, b: &Parameter) -> bool {
    document_path(&a.source_scope) < document_path(&b.source_scope)
}

fn document_path(scope: &ScopeHandle) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        path.push(s.index_in_parent().unwrap_or(usize::MAX));
        current = s.parent();
    }
    path.reverse();
    path
}

// ============================================================================
// RANKED SUGGESTIONS
// ============================================================================

/// Suggestions from every registered function, best first. Unranked
/// autocomplete fallbacks come last in registration order.
pub fn get_suggested_functions(scope: &ScopeHandle) -> Vec<Suggestion> {
    let parameters = collect_parameters(scope);
    tracing::trace!(scope = %scope.id(), parameters = parameters.len(), "Collected parameters");

    let mut suggestions: Vec<Suggestion> = Vec::new();
    for function in scope.tree().registry().iter() {
        suggestions.extend(function.suggestions(&parameters));
        if let Some(fallback) = function.autocomplete() {
            suggestions.push(Suggestion { rank: None, ..fallback });
        }
    }

    let mut seen = std::collections::HashSet::new();
    suggestions.retain(|s| seen.insert(s.expression.clone()));
    suggestions.sort_by_key(|s| (s.rank.is_none(), s.rank));
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_template() {
        let s = Suggestion::template("Weather", &["date", "location"]);
        assert_eq!(s.expression, "{Weather(date:, location:)}");
        assert_eq!(s.rank, None);
    }

    #[test]
    fn test_suggestion_call_formats_references() {
        let s = Suggestion::call(
            "Days",
            vec![
                Argument::named("from", Expr::id_ref("a")),
                Argument::named("to", Expr::id_ref("b")),
            ],
            Some(3),
        );
        assert_eq!(s.expression, "{Days(from: #[a], to: #[b])}");
    }
}
