use crate::codec;
use crate::multi_value::MultiValue;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// A metadata value as seen by the optimizer.
///
/// Raw sequences (`Sequence`) are values a caller handed over as an array; they
/// are a single value. Containers (`Multi`) hold the repeated values of a
/// non-unique key and are always stored as one encoded column value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum MetaValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Sequence(Vec<MetaValue>),
    Multi(MultiValue),
}

/// Numeric view of a value, used for classification and loose comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }

    /// Integral floats collapse to integers, mirroring how numeric strings are treated.
    fn from_f64(f: f64) -> Option<Self> {
        if !f.is_finite() {
            return None;
        }
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            Some(Numeric::Int(f as i64))
        } else {
            Some(Numeric::Float(f))
        }
    }
}

/// Parse numeric text (`"42"`, `" -3.5 "`, `"1e3"`). Words such as `inf` or
/// `NaN` are not numbers here.
pub fn parse_numeric(text: &str) -> Option<Numeric> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Numeric::Int(i));
    }
    if !trimmed.bytes().any(|b| b.is_ascii_digit())
        || !trimmed
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().and_then(Numeric::from_f64)
}

impl MetaValue {
    pub fn text(value: impl Into<String>) -> Self {
        MetaValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetaValue::Null)
    }

    /// `Null` and empty text count as "no value" when a previous value is matched.
    pub fn is_blank(&self) -> bool {
        match self {
            MetaValue::Null => true,
            MetaValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, MetaValue::Multi(_))
    }

    /// Elements of a container or of a raw sequence.
    pub fn items(&self) -> Option<&[MetaValue]> {
        match self {
            MetaValue::Multi(multi) => Some(multi.values()),
            MetaValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric interpretation: numbers, booleans and numeric text.
    pub fn numeric(&self) -> Option<Numeric> {
        match self {
            MetaValue::Int(i) => Some(Numeric::Int(*i)),
            MetaValue::Float(f) => Numeric::from_f64(*f),
            MetaValue::Bool(b) => Some(Numeric::Int(i64::from(*b))),
            MetaValue::Text(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// Value equality after decoding.
    ///
    /// Numbers compare numerically (numeric text included), containers and raw
    /// sequences compare element-wise, everything else compares its canonical
    /// text form, so `Null` equals empty text.
    pub fn loose_eq(&self, other: &MetaValue) -> bool {
        match (self.items(), other.items()) {
            (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y)),
            (Some(_), None) | (None, Some(_)) => false,
            (None, None) => match (self.numeric(), other.numeric()) {
                (Some(Numeric::Int(a)), Some(Numeric::Int(b))) => a == b,
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => codec::canonical_text(self) == codec::canonical_text(other),
            },
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::canonical_text(self))
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        MetaValue::Int(i64::from(value))
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Float(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for MetaValue {
    fn from(value: NaiveDate) -> Self {
        MetaValue::Date(value)
    }
}

impl From<NaiveDateTime> for MetaValue {
    fn from(value: NaiveDateTime) -> Self {
        MetaValue::DateTime(value)
    }
}

impl From<Vec<MetaValue>> for MetaValue {
    fn from(value: Vec<MetaValue>) -> Self {
        MetaValue::Sequence(value)
    }
}

impl From<MultiValue> for MetaValue {
    fn from(value: MultiValue) -> Self {
        MetaValue::Multi(value)
    }
}

impl<T: Into<MetaValue>> From<Option<T>> for MetaValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(MetaValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_parsing() {
        assert_eq!(parse_numeric("42"), Some(Numeric::Int(42)));
        assert_eq!(parse_numeric(" -7 "), Some(Numeric::Int(-7)));
        assert_eq!(parse_numeric("5.0"), Some(Numeric::Int(5)));
        assert_eq!(parse_numeric("2.5"), Some(Numeric::Float(2.5)));
        assert_eq!(parse_numeric("1e3"), Some(Numeric::Int(1000)));
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("12abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("2024-01-05"), None);
    }

    #[test]
    fn loose_equality_bridges_storage_round_trips() {
        assert!(MetaValue::Int(5).loose_eq(&MetaValue::text("5")));
        assert!(MetaValue::Float(300.0).loose_eq(&MetaValue::Int(300)));
        assert!(MetaValue::Null.loose_eq(&MetaValue::text("")));
        assert!(MetaValue::text("red").loose_eq(&MetaValue::text("red")));
        assert!(!MetaValue::text("red").loose_eq(&MetaValue::text("Red")));
        assert!(!MetaValue::text("abc").loose_eq(&MetaValue::Int(0)));

        let date = NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date");
        assert!(MetaValue::Date(date).loose_eq(&MetaValue::text("2024-01-05")));

        let a = MetaValue::Sequence(vec![MetaValue::Int(1), MetaValue::text("x")]);
        let b = MetaValue::Sequence(vec![MetaValue::text("1"), MetaValue::text("x")]);
        assert!(a.loose_eq(&b));
        assert!(!a.loose_eq(&MetaValue::text("1")));
    }

    #[test]
    fn blank_values() {
        assert!(MetaValue::Null.is_blank());
        assert!(MetaValue::text("").is_blank());
        assert!(!MetaValue::Int(0).is_blank());
    }
}
