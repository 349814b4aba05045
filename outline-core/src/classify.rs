//! Typed-value recognition for literal text

use crate::{LatLng, Value};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid date regex"));

static LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)$")
        .expect("Invalid location regex")
});

static FLIGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z0-9]{2})\s?(\d{1,4}[A-Z]?)$").expect("Invalid flight number regex")
});

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if !DATE_RE.is_match(text) {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Parse a `lat,lng` coordinate pair with valid ranges.
pub fn parse_location(text: &str) -> Option<LatLng> {
    let caps = LOCATION_RE.captures(text.trim())?;
    let lat: f64 = caps.get(1)?.as_str().parse().ok()?;
    let lng: f64 = caps.get(2)?.as_str().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(LatLng::new(lat, lng))
}

/// Parse an IATA-style flight number such as `LH123` or `U2 4512`.
/// Returns the normalized form without inner whitespace.
pub fn parse_flight_number(text: &str) -> Option<String> {
    let caps = FLIGHT_RE.captures(text.trim())?;
    let airline = caps.get(1)?.as_str();
    // Airline designators need at least one letter.
    if !airline.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(format!("{}{}", airline, caps.get(2)?.as_str()))
}

/// Classify literal text into the most specific value it denotes.
pub fn classify_text(text: &str) -> Value {
    let trimmed = text.trim();
    if let Some(date) = parse_date(trimmed) {
        return Value::Date(date);
    }
    if let Some(loc) = parse_location(trimmed) {
        return Value::Location(loc);
    }
    if let Some(flight) = parse_flight_number(trimmed) {
        return Value::FlightNumber(flight);
    }
    if !trimmed.is_empty() {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }
    }
    Value::Text(text.to_string())
}
