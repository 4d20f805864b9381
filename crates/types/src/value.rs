//! Raw and coerced field values

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive value as it arrives in a Bronze row
///
/// Deserializes directly from JSON scalars. Arrays and objects are not
/// representable; the ingest layer flattens them before the core sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// True for `null` and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Shape name used in quarantine details
    pub fn shape(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "boolean",
            RawValue::Integer(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Text(_) => "text",
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

/// Expected primitive shape of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Date,
    Timestamp,
    Boolean,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Date => "date",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

/// Coerced value stored on a [`RawRecord`](crate::RawRecord)
///
/// Externally tagged so it round-trips through both JSON and bincode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bool(bool),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
            FieldValue::Bool(_) => FieldKind::Boolean,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Calendar date of a date or timestamp value
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Timestamp(ts) => Some(ts.date_naive()),
            _ => None,
        }
    }

    /// Canonical text rendering, used for natural keys and display attributes
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(v) => v.to_string(),
            FieldValue::Integer(v) => v.to_string(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Timestamp(ts) => ts.to_rfc3339(),
            FieldValue::Bool(v) => v.to_string(),
        }
    }

    /// Convert back to a raw scalar, e.g. for quarantine payloads
    pub fn to_raw(&self) -> RawValue {
        match self {
            FieldValue::Text(s) => RawValue::Text(s.clone()),
            FieldValue::Number(v) => RawValue::Float(*v),
            FieldValue::Integer(v) => RawValue::Integer(*v),
            FieldValue::Bool(v) => RawValue::Bool(*v),
            FieldValue::Date(_) | FieldValue::Timestamp(_) => RawValue::Text(self.render()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_raw_value_from_json_scalars() {
        let row: Vec<RawValue> =
            serde_json::from_str(r#"[null, true, 42, 1.5, "srv-1"]"#).unwrap();
        assert_eq!(
            row,
            vec![
                RawValue::Null,
                RawValue::Bool(true),
                RawValue::Integer(42),
                RawValue::Float(1.5),
                RawValue::Text("srv-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_raw_value_blank() {
        assert!(RawValue::Null.is_blank());
        assert!(RawValue::from("   ").is_blank());
        assert!(!RawValue::from(0i64).is_blank());
    }

    #[test]
    fn test_field_value_views() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 3, 10, 30, 0).unwrap();
        let value = FieldValue::Timestamp(ts);
        assert_eq!(value.as_date(), NaiveDate::from_ymd_opt(2024, 5, 3));
        assert_eq!(value.kind(), FieldKind::Timestamp);
        assert_eq!(FieldValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(FieldValue::Number(7.5).as_i64(), None);
        assert_eq!(
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).render(),
            "2024-01-02"
        );
    }

    #[test]
    fn test_field_value_bincode() {
        let value = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let bytes = bincode::serialize(&value).unwrap();
        let decoded: FieldValue = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, value);
    }
}
