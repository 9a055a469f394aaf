//! Typed relation values and timestamp parsing
//!
//! Comparison relations carry an optional typed literal. Temporal values are
//! normalized to UTC instants for consistent comparison; the lexical form
//! emitted on the wire is the canonical RFC 3339 rendering with millisecond
//! precision.

use crate::error::{ModelError, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed literal carried by a comparison relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum RelationValue {
    /// An xsd:dateTime instant, normalized to UTC.
    DateTime(DateTime<Utc>),
    /// An xsd:double number.
    Number(f64),
    /// A plain or geometry (WKT) literal.
    Text(String),
}

impl RelationValue {
    /// Build a DateTime value from epoch milliseconds.
    pub fn from_epoch_millis(millis: i64) -> Self {
        RelationValue::DateTime(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    /// The XSD datatype IRI of this value's lexical form.
    pub fn datatype(&self) -> &'static str {
        match self {
            RelationValue::DateTime(_) => ldes_vocab::xsd::DATE_TIME,
            RelationValue::Number(_) => ldes_vocab::xsd::DOUBLE,
            RelationValue::Text(_) => ldes_vocab::xsd::STRING,
        }
    }
}

impl fmt::Display for RelationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationValue::DateTime(dt) => {
                write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            RelationValue::Number(n) => write!(f, "{}", n),
            RelationValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parse a member timestamp from its lexical form.
///
/// Accepts RFC 3339 / ISO 8601 date-times (with or without an offset) and
/// bare epoch-millisecond integers. Returns the UTC instant.
pub fn parse_timestamp(lexical: &str) -> Result<DateTime<Utc>> {
    let trimmed = lexical.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Offset-less date-times are treated as UTC
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(millis) = trimmed.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| ModelError::InvalidTimestamp(lexical.to_string()));
    }

    Err(ModelError::InvalidTimestamp(lexical.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_709_296_200_000);
    }

    #[test]
    fn test_parse_with_offset_normalizes_to_utc() {
        let a = parse_timestamp("2024-01-01T05:00:00Z").unwrap();
        let b = parse_timestamp("2024-01-01T00:00:00-05:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_naive_treated_as_utc() {
        let a = parse_timestamp("2024-01-01T00:00:00").unwrap();
        let b = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_epoch_millis() {
        let ts = parse_timestamp("1700000000000").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_parse_garbage_rejected() {
        assert!(parse_timestamp("not-a-time").is_err());
    }

    #[test]
    fn test_lexical_form_is_millis_utc() {
        let v = RelationValue::from_epoch_millis(1_700_000_000_000);
        assert_eq!(v.to_string(), "2023-11-14T22:13:20.000Z");
        assert_eq!(v.datatype(), ldes_vocab::xsd::DATE_TIME);
    }
}
