//! Textual encoding of metadata values.
//!
//! Scalars are stored natively by the store; this module covers the textual
//! side: the serialized form used for sizing and for text columns, and the JSON
//! layout of raw sequences (`[...]`) and containers (`{"idx_0": ...}`).
//!
//! Text that would itself decode as structured data is stored JSON-quoted so it
//! reads back as the same text.

use crate::multi_value::{parse_synthetic_key, MultiValue, LEGACY_SENTINEL_KEY, SENTINEL_KEY};
use crate::value::MetaValue;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value as JsonValue};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse text that is exactly `YYYY-MM-DD`.
pub fn parse_date_exact(text: &str) -> Option<NaiveDate> {
    let b = text.as_bytes();
    let shape = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shape {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Parse text that is exactly `YYYY-MM-DD HH:MM:SS`.
pub fn parse_datetime_exact(text: &str) -> Option<NaiveDateTime> {
    let b = text.as_bytes();
    let shape = b.len() == 19
        && b[10] == b' '
        && b[13] == b':'
        && b[16] == b':'
        && parse_date_exact(&text[..10]).is_some()
        && b[11..]
            .iter()
            .enumerate()
            .all(|(i, c)| i == 2 || i == 5 || c.is_ascii_digit());
    if !shape {
        return None;
    }
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).ok()
}

fn format_float(f: f64) -> String {
    format!("{f}")
}

/// JSON form of a value, used inside sequences and containers.
pub fn to_json(value: &MetaValue) -> JsonValue {
    match value {
        MetaValue::Null => JsonValue::Null,
        MetaValue::Bool(b) => JsonValue::Bool(*b),
        MetaValue::Int(i) => JsonValue::Number(Number::from(*i)),
        MetaValue::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        MetaValue::Text(s) => JsonValue::String(s.clone()),
        MetaValue::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
        MetaValue::DateTime(dt) => JsonValue::String(dt.format(DATETIME_FORMAT).to_string()),
        MetaValue::Sequence(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        MetaValue::Multi(multi) => {
            let mut object = Map::with_capacity(multi.len());
            for (key, entry) in multi.entries() {
                object.insert(key, to_json(entry));
            }
            JsonValue::Object(object)
        }
    }
}

fn is_container_object(object: &Map<String, JsonValue>) -> bool {
    object.contains_key(SENTINEL_KEY) || object.contains_key(LEGACY_SENTINEL_KEY)
}

/// Inverse of [`to_json`].
///
/// Objects carrying a sentinel key become containers. Entries are ordered by
/// the index in their key and re-keyed contiguously; keys without an index go
/// last in document order. Other objects are not values of this model and are
/// kept as their JSON text.
pub fn from_json(json: JsonValue) -> MetaValue {
    match json {
        JsonValue::Null => MetaValue::Null,
        JsonValue::Bool(b) => MetaValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => MetaValue::Int(i),
            None => n.as_f64().map_or(MetaValue::Null, MetaValue::Float),
        },
        JsonValue::String(s) => decode_plain_text(s),
        JsonValue::Array(items) => MetaValue::Sequence(items.into_iter().map(from_json).collect()),
        JsonValue::Object(object) if is_container_object(&object) => {
            let mut entries: Vec<(usize, JsonValue)> = object
                .into_iter()
                .map(|(key, v)| (parse_synthetic_key(&key).unwrap_or(usize::MAX), v))
                .collect();
            entries.sort_by_key(|(index, _)| *index);
            MetaValue::Multi(entries.into_iter().map(|(_, v)| from_json(v)).collect())
        }
        JsonValue::Object(object) => MetaValue::Text(JsonValue::Object(object).to_string()),
    }
}

fn decode_plain_text(text: String) -> MetaValue {
    if let Some(dt) = parse_datetime_exact(&text) {
        return MetaValue::DateTime(dt);
    }
    if let Some(d) = parse_date_exact(&text) {
        return MetaValue::Date(d);
    }
    MetaValue::Text(text)
}

/// JSON text that [`decode_text`] would turn into something other than the
/// literal text.
fn looks_structured(text: &str) -> bool {
    let trimmed = text.trim_start();
    if !matches!(trimmed.as_bytes().first(), Some(b'[' | b'{' | b'"')) {
        return false;
    }
    serde_json::from_str::<JsonValue>(text).is_ok()
}

/// Serialized textual form of a value.
///
/// This is what lands in text columns and what the classifier measures.
pub fn serialize(value: &MetaValue) -> String {
    match value {
        MetaValue::Null => String::new(),
        MetaValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        MetaValue::Int(i) => i.to_string(),
        MetaValue::Float(f) => format_float(*f),
        MetaValue::Text(s) if looks_structured(s) => JsonValue::String(s.clone()).to_string(),
        MetaValue::Text(s) => s.clone(),
        MetaValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        MetaValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        MetaValue::Sequence(_) | MetaValue::Multi(_) => to_json(value).to_string(),
    }
}

/// Number of characters of the serialized form.
pub fn serialized_len(value: &MetaValue) -> usize {
    serialize(value).chars().count()
}

/// Human-facing text of a value: like [`serialize`] but without quoting text.
pub fn canonical_text(value: &MetaValue) -> String {
    match value {
        MetaValue::Text(s) => s.clone(),
        other => serialize(other),
    }
}

/// Decode text read from a column.
pub fn decode_text(text: &str) -> MetaValue {
    if looks_structured(text) {
        if let Ok(json) = serde_json::from_str::<JsonValue>(text) {
            return match json {
                JsonValue::String(inner) => MetaValue::Text(inner),
                JsonValue::Object(object) if !is_container_object(&object) => {
                    MetaValue::Text(text.to_string())
                }
                other => from_json(other),
            };
        }
    }
    decode_plain_text(text.to_string())
}
