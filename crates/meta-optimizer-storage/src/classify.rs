//! Column type inference from a single value.

use crate::codec;
use crate::column_type::{ColumnType, MAX_VARCHAR_LENGTH};
use crate::value::{MetaValue, Numeric};

/// Result of classifying one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub column_type: ColumnType,
    /// Characters in the serialized form of the value.
    pub serialized_len: usize,
}

/// Infer the column type a value needs.
///
/// Rules, first match wins:
/// 1. exact `YYYY-MM-DD` → `DATE`
/// 2. exact `YYYY-MM-DD HH:MM:SS` → `DATETIME`
/// 3. non-numeric text or null up to 65535 characters → `VARCHAR(len)`
/// 4. boolean → `TINYINT`
/// 5. non-integral float → `FLOAT`, or `DOUBLE` when single precision loses it
/// 6. integers (numeric text and integral floats included) → smallest integer tier
/// 7. anything longer → `TEXT`
pub fn classify(value: &MetaValue) -> Classification {
    let serialized = codec::serialize(value);
    let serialized_len = serialized.chars().count();
    Classification {
        column_type: classify_serialized(value, &serialized, serialized_len),
        serialized_len,
    }
}

fn classify_serialized(value: &MetaValue, serialized: &str, len: usize) -> ColumnType {
    match value {
        MetaValue::Date(_) => return ColumnType::Date,
        MetaValue::DateTime(_) => return ColumnType::DateTime,
        MetaValue::Text(text) => {
            if codec::parse_date_exact(text).is_some() {
                return ColumnType::Date;
            }
            if codec::parse_datetime_exact(text).is_some() {
                return ColumnType::DateTime;
            }
        }
        _ => {}
    }

    let numeric = match value {
        MetaValue::Bool(_) => return ColumnType::TinyInt,
        MetaValue::Int(_) | MetaValue::Float(_) | MetaValue::Text(_) => value.numeric(),
        _ => None,
    };

    match numeric {
        Some(Numeric::Int(i)) => ColumnType::for_integer(i),
        Some(Numeric::Float(f)) => float_type(f),
        None if len <= MAX_VARCHAR_LENGTH as usize => ColumnType::for_text_length(len),
        None => {
            log::debug!(
                "value of {len} characters exceeds VARCHAR limit, using TEXT ({} bytes)",
                serialized.len()
            );
            ColumnType::Text
        }
    }
}

fn float_type(f: f64) -> ColumnType {
    if f64::from(f as f32) == f {
        ColumnType::Float
    } else {
        ColumnType::Double
    }
}
