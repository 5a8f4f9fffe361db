use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Serialization format shared by every persisted date column.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Eq for Value {}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Date(d) => d.format(CANONICAL_DATE_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Typed interpretation of a raw CSV field at extract time.
///
/// Empty fields are null. Numeric-looking fields become typed numbers so the
/// store can give their columns numeric affinity; everything else stays a
/// string until a transform step claims it (date reformatting, code mapping).
pub fn infer_cell(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = raw.parse::<i64>() {
        return Some(Value::Integer(parsed));
    }
    if let Ok(parsed) = raw.parse::<f64>() {
        return Some(Value::Float(parsed));
    }
    Some(Value::String(raw.to_string()))
}

/// Parses `value` as a calendar date under `format`.
///
/// Datetime formats are accepted; only the date part is kept. Values that do
/// not conform are an error, never a silent null.
pub fn parse_date_with_format(value: &str, format: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, format)
        .or_else(|_| NaiveDateTime::parse_from_str(value, format).map(|dt| dt.date()))
}
