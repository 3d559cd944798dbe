//! Packing of repeated values of a non-unique key into one column value.
//!
//! A container is an ordered list; on the wire every entry is addressed by a
//! synthetic key `idx_<n>`. Because the list is a `Vec`, the keys are always
//! contiguous and zero-based no matter how the container was mutated.

use crate::value::MetaValue;
use thiserror::Error;

/// Prefix of the synthetic positional keys.
pub const SYNTHETIC_KEY_PREFIX: &str = "idx_";

/// Prefix used by containers written before the `idx_` scheme.
pub const LEGACY_KEY_PREFIX: &str = "wpmoai";

/// Synthetic key of the first entry; its presence marks an encoded container.
pub const SENTINEL_KEY: &str = "idx_0";

/// Legacy sentinel; containers carrying it are re-keyed on decode.
pub const LEGACY_SENTINEL_KEY: &str = "wpmoai0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("no entry matches the previous value")]
    NotFound,
}

/// Ordered values of a non-unique key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiValue(Vec<MetaValue>);

impl MultiValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = MetaValue>) -> Self {
        Self(values.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[MetaValue] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&MetaValue> {
        self.0.get(index)
    }

    pub fn push(&mut self, value: MetaValue) {
        self.0.push(value);
    }

    /// Entries paired with their synthetic keys, in order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &MetaValue)> {
        self.0.iter().enumerate().map(|(i, v)| (synthetic_key(i), v))
    }

    pub fn into_values(self) -> Vec<MetaValue> {
        self.0
    }

    /// Index of the first entry loosely equal to `needle`.
    pub fn position(&self, needle: &MetaValue) -> Option<usize> {
        self.0.iter().position(|v| v.loose_eq(needle))
    }
}

impl FromIterator<MetaValue> for MultiValue {
    fn from_iter<I: IntoIterator<Item = MetaValue>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

pub fn synthetic_key(index: usize) -> String {
    format!("{SYNTHETIC_KEY_PREFIX}{index}")
}

/// Position encoded in an `idx_<n>` or legacy `wpmoai<n>` key.
pub fn parse_synthetic_key(key: &str) -> Option<usize> {
    let digits = key
        .strip_prefix(SYNTHETIC_KEY_PREFIX)
        .or_else(|| key.strip_prefix(LEGACY_KEY_PREFIX))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Re-key a raw sequence into a container.
///
/// With `check_first_index_only` a sequence is only converted when it has a
/// first element; otherwise every sequence, empty ones included, is converted.
/// Containers and scalars pass through unchanged.
pub fn normalize(value: MetaValue, check_first_index_only: bool) -> MetaValue {
    match value {
        MetaValue::Sequence(items) if !check_first_index_only || !items.is_empty() => {
            MetaValue::Multi(MultiValue(items))
        }
        other => other,
    }
}

/// Prepare a value for storage: a raw sequence is one value, so it becomes the
/// single entry of a container. Everything else is stored as is.
pub fn wrap_raw_sequence(value: MetaValue) -> MetaValue {
    match value {
        MetaValue::Sequence(_) => MetaValue::Multi(MultiValue(vec![value])),
        other => other,
    }
}

/// Add `new_value` after the entries of `existing`.
///
/// A non-container `existing` (including a raw sequence's single value) is
/// first wrapped, so a scalar plus a scalar yields two entries.
pub fn append(existing: MetaValue, new_value: MetaValue) -> MultiValue {
    let mut multi = match existing {
        MetaValue::Multi(multi) => multi,
        other => MultiValue(vec![other]),
    };
    multi.push(new_value);
    multi
}

/// Substitute the first entry loosely equal to `matched` with `new_value`,
/// keeping every other entry in place.
///
/// Raw sequences are searched the same way as containers; a scalar `existing`
/// is treated as a one-entry container.
pub fn replace(
    existing: MetaValue,
    matched: &MetaValue,
    new_value: MetaValue,
) -> Result<MultiValue, ReplaceError> {
    let mut multi = match existing {
        MetaValue::Multi(multi) => multi,
        MetaValue::Sequence(items) => MultiValue(items),
        other => MultiValue(vec![other]),
    };
    let index = multi.position(matched).ok_or(ReplaceError::NotFound)?;
    multi.0[index] = new_value;
    Ok(multi)
}

/// Concatenate two containers.
pub fn concat(existing: MultiValue, more: MultiValue) -> MultiValue {
    let mut values = existing.0;
    values.extend(more.0);
    MultiValue(values)
}
