//! Evaluation values

use crate::ScopeId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// TYPED SCALARS
// ============================================================================

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &LatLng) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0088;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Type tag used by the suggestion engine and formula generalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Text,
    Number,
    Date,
    Location,
    FlightNumber,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Date => "date",
            ValueType::Location => "location",
            ValueType::FlightNumber => "flight_number",
        };
        f.write_str(name)
    }
}

/// Arithmetic operators of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Binding strength; multiplicative operators bind tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// Result of evaluating an expression or a bullet part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// No value: unresolved names, failed functions, pending scopes.
    #[default]
    Undefined,
    /// Result of calling a function that is not registered.
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Location(LatLng),
    FlightNumber(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
    /// Pointer-like handle to a transcluded scope.
    Scope(ScopeId),
    /// A function was called with a declared argument slot left empty.
    /// Renderers show nothing but must not treat it as an error.
    MissingArguments,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_missing_arguments(&self) -> bool {
        matches!(self, Value::MissingArguments)
    }

    /// True for values that render as "no value".
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null | Value::MissingArguments)
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Number(_) => Some(ValueType::Number),
            Value::Text(_) => Some(ValueType::Text),
            Value::Date(_) => Some(ValueType::Date),
            Value::Location(_) => Some(ValueType::Location),
            Value::FlightNumber(_) => Some(ValueType::FlightNumber),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::FlightNumber(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<LatLng> {
        match self {
            Value::Location(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Option<ScopeId> {
        match self {
            Value::Scope(id) => Some(*id),
            _ => None,
        }
    }

    /// Field of a record-like value. Used by field access on non-scope values.
    pub fn field(&self, name: &str) -> Value {
        match (self, name) {
            (Value::Record(map), _) => map.get(name).cloned().unwrap_or_default(),
            (Value::Location(l), "lat") => Value::Number(l.lat),
            (Value::Location(l), "lng") => Value::Number(l.lng),
            (Value::Date(d), "year") => Value::Number(f64::from(chrono::Datelike::year(d))),
            (Value::Date(d), "month") => Value::Number(f64::from(chrono::Datelike::month(d))),
            (Value::Date(d), "day") => Value::Number(f64::from(chrono::Datelike::day(d))),
            (Value::List(items), "length") => Value::Number(items.len() as f64),
            _ => Value::Undefined,
        }
    }

    /// Apply an arithmetic operator.
    ///
    /// Undefined operands stay undefined; non-numeric mixes produce `NaN`,
    /// except `+` with a text operand, which concatenates.
    pub fn binary(&self, op: BinaryOp, rhs: &Value) -> Value {
        if self.is_nothing() || rhs.is_nothing() {
            return Value::Undefined;
        }
        if let (Some(a), Some(b)) = (self.as_number(), rhs.as_number()) {
            return Value::Number(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            });
        }
        let has_text = matches!(self, Value::Text(_)) || matches!(rhs, Value::Text(_));
        if op == BinaryOp::Add && has_text {
            return Value::Text(format!("{}{}", self.display_text(), rhs.display_text()));
        }
        Value::Number(f64::NAN)
    }

    /// Render for display. "No value" renders as an empty string.
    pub fn display_text(&self) -> String {
        match self {
            Value::Undefined | Value::Null | Value::MissingArguments | Value::Scope(_) => {
                String::new()
            }
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) | Value::FlightNumber(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Location(l) => l.to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::display_text)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Record(map) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.display_text()))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_finite() {
        let rounded = (n * 1000.0).round() / 1000.0;
        format!("{}", rounded)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<LatLng> for Value {
    fn from(l: LatLng) -> Self {
        Value::Location(l)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_arithmetic() {
        let a = Value::Number(6.0);
        let b = Value::Number(3.0);
        assert_eq!(a.binary(BinaryOp::Add, &b), Value::Number(9.0));
        assert_eq!(a.binary(BinaryOp::Sub, &b), Value::Number(3.0));
        assert_eq!(a.binary(BinaryOp::Mul, &b), Value::Number(18.0));
        assert_eq!(a.binary(BinaryOp::Div, &b), Value::Number(2.0));
    }

    #[test]
    fn test_undefined_propagates_through_arithmetic() {
        let a = Value::Number(1.0);
        assert_eq!(a.binary(BinaryOp::Add, &Value::Undefined), Value::Undefined);
        assert_eq!(Value::Null.binary(BinaryOp::Mul, &a), Value::Undefined);
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let a = Value::text("2");
        assert_eq!(a.binary(BinaryOp::Mul, &Value::Number(4.0)), Value::Number(8.0));
    }

    #[test]
    fn test_text_concatenation_and_nan() {
        let a = Value::text("km: ");
        assert_eq!(
            a.binary(BinaryOp::Add, &Value::Number(5.0)),
            Value::text("km: 5")
        );
        match a.binary(BinaryOp::Sub, &Value::Number(5.0)) {
            Value::Number(n) => assert!(n.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn test_display_text() {
        assert_eq!(Value::Undefined.display_text(), "");
        assert_eq!(Value::MissingArguments.display_text(), "");
        assert_eq!(Value::Number(3.0).display_text(), "3");
        assert_eq!(Value::Number(2.5).display_text(), "2.5");
        assert_eq!(Value::Location(LatLng::new(1.0, 2.5)).display_text(), "1,2.5");
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        assert_eq!(Value::Date(date).display_text(), "2024-05-17");
    }

    #[test]
    fn test_value_type_tags() {
        assert_eq!(Value::Number(1.0).value_type(), Some(ValueType::Number));
        assert_eq!(
            Value::Location(LatLng::new(0.0, 0.0)).value_type(),
            Some(ValueType::Location)
        );
        assert_eq!(Value::Undefined.value_type(), None);
        assert_eq!(Value::Scope(ScopeId::new(0, 0)).value_type(), None);
    }

    #[test]
    fn test_field_access_on_values() {
        let loc = Value::Location(LatLng::new(48.1, 11.5));
        assert_eq!(loc.field("lat"), Value::Number(48.1));
        assert_eq!(loc.field("altitude"), Value::Undefined);

        let mut map = BTreeMap::new();
        map.insert("distance".to_string(), Value::Number(12.0));
        assert_eq!(Value::Record(map).field("distance"), Value::Number(12.0));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Berlin -> Munich is roughly 504 km
        let berlin = LatLng::new(52.52, 13.405);
        let munich = LatLng::new(48.1351, 11.582);
        let d = berlin.haversine_km(&munich);
        assert!((d - 504.0).abs() < 5.0, "got {}", d);
        assert!(berlin.haversine_km(&berlin).abs() < 1e-9);
    }
}
