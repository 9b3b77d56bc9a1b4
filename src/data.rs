use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DATETIME_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single typed cell. Missing values are represented as `None` in a [`Row`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

pub type Row = Vec<Option<Value>>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_STORAGE_FORMAT).to_string(),
        }
    }

    /// Narrows whole floats to integers, the way spreadsheet numbers surface
    /// once loaded into a dataframe.
    pub fn from_number(value: f64) -> Value {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Value::Integer(value as i64)
        } else {
            Value::Float(value)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Types a raw text cell. Blank text is a missing value.
pub fn parse_text_cell(raw: &str) -> Option<Value> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = value.parse::<i64>() {
        return Some(Value::Integer(parsed));
    }
    if let Ok(parsed) = value.parse::<f64>()
        && parsed.is_finite()
    {
        return Some(Value::Float(parsed));
    }
    if value.eq_ignore_ascii_case("true") {
        return Some(Value::Boolean(true));
    }
    if value.eq_ignore_ascii_case("false") {
        return Some(Value::Boolean(false));
    }
    if let Ok(parsed) = parse_naive_datetime(value) {
        return Some(Value::DateTime(parsed));
    }
    if let Ok(parsed) = parse_naive_date(value)
        && let Some(midnight) = parsed.and_hms_opt(0, 0, 0)
    {
        return Some(Value::DateTime(midnight));
    }
    Some(Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
    }

    #[test]
    fn parse_naive_datetime_supports_fractional_seconds() {
        let parsed = parse_naive_datetime("2024-05-06 14:30:00.250").unwrap();
        assert_eq!(
            parsed.format(DATETIME_STORAGE_FORMAT).to_string(),
            "2024-05-06 14:30:00.250"
        );
        assert!(parse_naive_datetime("2024-05-06T14:30").is_ok());
    }

    #[test]
    fn parse_text_cell_types_common_shapes() {
        assert_eq!(parse_text_cell("  "), None);
        assert_eq!(parse_text_cell("42"), Some(Value::Integer(42)));
        assert_eq!(parse_text_cell("4.5"), Some(Value::Float(4.5)));
        assert_eq!(parse_text_cell("TRUE"), Some(Value::Boolean(true)));
        assert!(matches!(
            parse_text_cell("2024-01-02"),
            Some(Value::DateTime(_))
        ));
        assert_eq!(
            parse_text_cell("12 Main St"),
            Some(Value::String("12 Main St".to_string()))
        );
    }

    #[test]
    fn from_number_narrows_whole_floats() {
        assert_eq!(Value::from_number(3.0), Value::Integer(3));
        assert_eq!(Value::from_number(3.25), Value::Float(3.25));
        assert_eq!(Value::from_number(f64::NAN).as_display(), "NaN");
    }
}
