//! Outline Test Utilities
//!
//! Shared test infrastructure for the outline workspace:
//! - Proptest generators for expressions, bullets, literal values and
//!   whole outlines
//! - Fixtures for building and settling scope trees
//! - Assertions for evaluated values
//!
//! Crates that `outline-engine` itself depends on cannot use this crate
//! without a dev-dependency cycle; their tests keep local helpers.

pub use outline_core::{EngineConfig, InMemoryDocument, LatLng, NodeId, Value};
pub use outline_engine::{FunctionRegistry, ScopeHandle, ScopeTree};

use std::sync::Once;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to warnings from the outline crates so
/// provider failures show up next to the failing test.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("outline=warn,warn"));
        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for outline literals and documents.

    use super::*;
    use chrono::NaiveDate;
    use outline_core::BinaryOp;
    use outline_dsl::{Argument, Bullet, BulletKey, Expr, Span};
    use proptest::prelude::*;

    // === Literal Generators ===

    /// Coordinates rounded to four decimals so their text form parses back
    /// to the same value.
    pub fn arb_location() -> impl Strategy<Value = LatLng> {
        (-899_999i32..=899_999, -1_799_999i32..=1_799_999)
            .prop_map(|(lat, lng)| LatLng::new(f64::from(lat) / 1e4, f64::from(lng) / 1e4))
    }

    /// A date in 2020..2030.
    pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (2020i32..2030, 1u32..=12, 1u32..=28)
            .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }

    /// Whole amounts that survive text formatting exactly.
    pub fn arb_amount() -> impl Strategy<Value = f64> {
        (0u32..100_000).prop_map(f64::from)
    }

    /// IATA-style flight number, e.g. `LH123`.
    pub fn arb_flight_number() -> impl Strategy<Value = String> {
        "[A-Z]{2}[0-9]{1,4}"
    }

    /// A literal that classifies to a typed value, paired with that value.
    pub fn arb_typed_literal() -> impl Strategy<Value = (String, Value)> {
        prop_oneof![
            arb_location().prop_map(|l| (location_text(l), Value::Location(l))),
            arb_date().prop_map(|d| (d.format("%Y-%m-%d").to_string(), Value::Date(d))),
            arb_amount().prop_map(|n| (format!("{}", n), Value::Number(n))),
            arb_flight_number().prop_map(|f| (f.clone(), Value::FlightNumber(f))),
        ]
    }

    // === AST Generators ===

    /// Node id as accepted inside `#[...]`.
    pub fn arb_node_id() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_][a-zA-Z0-9_/-]{0,10}"
    }

    /// Lowercase name of one to three words, usable as a key or reference.
    pub fn arb_name() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z][a-z0-9_]{0,4}", 1..4).prop_map(|w| w.join(" "))
    }

    fn arb_leaf() -> impl Strategy<Value = Expr> {
        prop_oneof![
            (0u16..500).prop_map(|n| Expr::number(f64::from(n))),
            arb_node_id().prop_map(Expr::id_ref),
            arb_name().prop_map(Expr::name),
            (arb_node_id(), "[a-z]{1,5}").prop_map(|(id, f)| Expr::field(Expr::id_ref(id), f)),
            "[a-z ]{0,6}".prop_map(Expr::string),
        ]
    }

    fn arb_op() -> impl Strategy<Value = BinaryOp> {
        prop_oneof![
            Just(BinaryOp::Add),
            Just(BinaryOp::Sub),
            Just(BinaryOp::Mul),
            Just(BinaryOp::Div),
        ]
    }

    /// Expressions nesting calls and arithmetic up to a few levels deep.
    /// Call arguments mix positional, named and missing values.
    pub fn arb_expr() -> impl Strategy<Value = Expr> {
        arb_leaf().prop_recursive(3, 24, 4, |inner| {
            let arg = prop_oneof![
                inner.clone().prop_map(Argument::positional),
                (arb_name(), inner.clone()).prop_map(|(k, v)| Argument::named(k, v)),
                arb_name().prop_map(|k| Argument::named(k, Expr::undefined())),
            ];
            prop_oneof![
                ("[A-Z][a-z]{1,8}", prop::collection::vec(arg, 0..4))
                    .prop_map(|(name, args)| Expr::call(name, args)),
                (arb_op(), inner.clone(), inner)
                    .prop_map(|(op, lhs, rhs)| Expr::binary(op, lhs, rhs)),
            ]
        })
    }

    /// A bullet with an optional key, one inline expression and an
    /// optional literal tail.
    pub fn arb_bullet() -> impl Strategy<Value = Bullet> {
        (
            prop::option::of(arb_name()),
            arb_expr(),
            prop::option::of("[a-z]{1,8}"),
        )
            .prop_map(|(key, expr, tail)| {
                let mut parts = vec![Expr::inline(expr)];
                if let Some(word) = tail {
                    parts.push(Expr::string(format!(" {}", word)));
                }
                Bullet {
                    key: key.map(|name| BulletKey {
                        name,
                        span: Span::default(),
                    }),
                    parts,
                    span: Span::default(),
                }
            })
    }

    // === Outline Generators ===

    /// A trip outline: a `trip` bullet whose children are stops, each with
    /// a `position` and a `date` property. Node ids are `stop0`, `pos0`,
    /// `date0` and so on.
    pub fn arb_trip_outline() -> impl Strategy<Value = String> {
        prop::collection::vec((arb_location(), arb_date()), 1..6)
            .prop_map(|stops| fixtures::trip_outline(&stops))
    }

    /// A flat list of numeric bullets under one parent, with their total.
    pub fn arb_number_list() -> impl Strategy<Value = (String, f64)> {
        prop::collection::vec(arb_amount(), 1..8).prop_map(|amounts| {
            let mut outline = String::from("- [list] {Sum()}\n");
            for (i, n) in amounts.iter().enumerate() {
                outline.push_str(&format!("  - [n{}] {}\n", i, n));
            }
            (outline, amounts.iter().sum())
        })
    }

    pub(crate) fn location_text(l: LatLng) -> String {
        format!("{:.4},{:.4}", l.lat, l.lng)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built documents and tree helpers.

    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;

    /// Two named places and a trip that refers to them by transclusion.
    pub const TRIP: &str = "\
- [paris] position: 48.8566,2.3522
- [berlin] position: 52.5200,13.4050
- [trip] Trip
  - [leg] {Distance(from: #[paris], to: #[berlin])}
  - [start] 2026-05-01
  - [end] 2026-05-08
";

    /// Render stops as an outline; see [`super::generators::arb_trip_outline`].
    pub fn trip_outline(stops: &[(LatLng, NaiveDate)]) -> String {
        let mut outline = String::from("- [trip] Trip\n");
        for (i, (location, date)) in stops.iter().enumerate() {
            outline.push_str(&format!("  - [stop{}] Stop {}\n", i, i));
            outline.push_str(&format!(
                "    - [pos{}] position: {}\n",
                i,
                super::generators::location_text(*location)
            ));
            outline.push_str(&format!("    - [date{}] date: {}\n", i, date.format("%Y-%m-%d")));
        }
        outline
    }

    /// Parse an outline, panicking with the parse error on failure.
    #[track_caller]
    pub fn document(outline: &str) -> InMemoryDocument {
        InMemoryDocument::from_outline(outline)
            .unwrap_or_else(|e| panic!("invalid outline: {}\n{}", e, outline))
    }

    /// Build a tree over `outline` with default configuration.
    #[track_caller]
    pub fn tree(outline: &str, registry: FunctionRegistry) -> (InMemoryDocument, ScopeTree) {
        let doc = document(outline);
        let tree = ScopeTree::build(&doc, Arc::new(registry), EngineConfig::default());
        (doc, tree)
    }

    /// Evaluate every scope and wait for results and handlers.
    pub async fn evaluate(tree: &ScopeTree) {
        tree.evaluate_all().expect("tokio runtime available");
        settle(tree).await;
    }

    /// Wait for outstanding evaluation, then give the notification
    /// dispatcher a moment to drain.
    pub async fn settle(tree: &ScopeTree) {
        tree.settle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[track_caller]
    pub fn scope(tree: &ScopeTree, node: &str) -> ScopeHandle {
        tree.scope_for_node(&NodeId::new(node))
            .unwrap_or_else(|| panic!("no scope for node {}", node))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over evaluated values.

    use super::*;

    /// Assert a number within `tolerance` of `expected`.
    #[track_caller]
    pub fn assert_number_near(value: &Value, expected: f64, tolerance: f64) {
        match value.as_number() {
            Some(n) => assert!(
                (n - expected).abs() <= tolerance,
                "Expected {} ± {}, got {}",
                expected,
                tolerance,
                n
            ),
            None => panic!("Expected a number near {}, got: {:?}", expected, value),
        }
    }

    #[track_caller]
    pub fn assert_missing_arguments(value: &Value) {
        assert!(
            value.is_missing_arguments(),
            "Expected MissingArguments, got: {:?}",
            value
        );
    }

    #[track_caller]
    pub fn assert_undefined(value: &Value) {
        assert!(value.is_undefined(), "Expected Undefined, got: {:?}", value);
    }

    /// Assert a record carries `field` equal to `expected`.
    #[track_caller]
    pub fn assert_field(value: &Value, field: &str, expected: &Value) {
        match value {
            Value::Record(_) => assert_eq!(
                &value.field(field),
                expected,
                "Wrong value for field {:?} in {:?}",
                field,
                value
            ),
            other => panic!("Expected a record with field {:?}, got: {:?}", field, other),
        }
    }

    /// Assert a scope published a computation result under `name` and
    /// return the latest one.
    #[track_caller]
    pub fn assert_computation_result(scope: &ScopeHandle, name: &str) -> Value {
        scope
            .computation_results()
            .into_iter()
            .rev()
            .find(|r| r.name == name)
            .map(|r| r.data)
            .unwrap_or_else(|| {
                panic!(
                    "Expected a {:?} computation result on {:?}, got: {:?}",
                    name,
                    scope.node_id(),
                    scope.computation_results()
                )
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================
