//! Single-value writes into wide tables.

use crate::meta_type::MetaType;
use crate::multi_value::{self, MultiValue, ReplaceError};
use crate::optimizer::{MetaOptimizer, Result};
use crate::storage::{LegacyMetaStore, WideStore};
use crate::value::MetaValue;

/// One metadata write.
///
/// Defaults mirror a plain update of a unique key: `unique`, not add-only, no
/// previous value, current value checked.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub meta_type: MetaType,
    pub object_id: u64,
    pub key: String,
    pub value: MetaValue,
    pub unique: bool,
    /// The key is being added rather than updated; skips the legacy lookup.
    pub add_meta: bool,
    /// Value to replace for non-unique keys. Blank values count as absent.
    pub prev_value: Option<MetaValue>,
    pub check_current_value: bool,
}

impl WriteRequest {
    pub fn new(
        meta_type: MetaType,
        object_id: u64,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Self {
        Self {
            meta_type,
            object_id,
            key: key.into(),
            value: value.into(),
            unique: true,
            add_meta: false,
            prev_value: None,
            check_current_value: true,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn add_meta(mut self, add_meta: bool) -> Self {
        self.add_meta = add_meta;
        self
    }

    pub fn prev_value(mut self, prev_value: impl Into<MetaValue>) -> Self {
        self.prev_value = Some(prev_value.into());
        self
    }

    pub fn check_current_value(mut self, check: bool) -> Self {
        self.check_current_value = check;
        self
    }

    fn previous(&self) -> Option<&MetaValue> {
        self.prev_value.as_ref().filter(|v| !v.is_blank())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Object id 0 or blank key.
    InvalidRequest,
    /// Update of a key the legacy table does not hold for the object.
    NotApplicable,
    /// A unique key already has a value.
    UniqueConflict,
    /// The previous value given does not match what is stored.
    ValueMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was created; carries its row id.
    Inserted(i64),
    /// Rows touched by the update.
    Updated(usize),
    Rejected(Rejection),
}

impl<S: WideStore + LegacyMetaStore> MetaOptimizer<S> {
    pub fn write(&self, request: WriteRequest) -> Result<WriteOutcome> {
        if request.object_id == 0 || request.key.trim().is_empty() {
            return Ok(WriteOutcome::Rejected(Rejection::InvalidRequest));
        }

        let meta_type = request.meta_type;
        if !request.add_meta
            && !self
                .store
                .legacy_meta_exists(meta_type, request.object_id, &request.key)?
        {
            return Ok(WriteOutcome::Rejected(Rejection::NotApplicable));
        }

        let table = self.table(meta_type);
        let column = self.column_name(meta_type, &request.key);
        // Size the column for the value as stored, not as given.
        let stored = multi_value::wrap_raw_sequence(request.value.clone());
        self.ensure_column(meta_type, &request.key, &stored)?;

        if self.store.find_row(&table, request.object_id)?.is_none() {
            let inserted = self
                .store
                .insert_row(&table, request.object_id, &column, &stored, self.now())?;
            match inserted {
                Some(row_id) => return Ok(WriteOutcome::Inserted(row_id)),
                None => log::warn!(
                    "{meta_type} {} was inserted concurrently, updating instead",
                    request.object_id
                ),
            }
        }

        let value = if request.check_current_value {
            let current = self
                .store
                .read_value(&table, request.object_id, &column)?
                .unwrap_or_default();
            let value = match merge(&request, current) {
                Ok(value) => value,
                Err(rejection) => return Ok(WriteOutcome::Rejected(rejection)),
            };
            self.ensure_column(meta_type, &request.key, &value)?;
            value
        } else {
            stored
        };

        let value = if value.is_blank() { MetaValue::Null } else { value };
        let updated = self
            .store
            .update_value(&table, request.object_id, &column, &value, self.now())?;
        Ok(WriteOutcome::Updated(updated))
    }
}

/// Combine the stored value with the request.
fn merge(request: &WriteRequest, current: MetaValue) -> std::result::Result<MetaValue, Rejection> {
    let value = request.value.clone();

    if request.unique {
        if !current.is_null() {
            return Err(Rejection::UniqueConflict);
        }
        return Ok(multi_value::wrap_raw_sequence(value));
    }

    match request.previous() {
        None if request.add_meta => Ok(merge_added(current, value)),
        Some(previous) if !current.is_null() => match current {
            MetaValue::Multi(_) | MetaValue::Sequence(_) => {
                multi_value::replace(current, previous, value)
                    .map(MetaValue::Multi)
                    .map_err(|ReplaceError::NotFound| Rejection::ValueMismatch)
            }
            scalar if scalar.loose_eq(previous) => Ok(multi_value::wrap_raw_sequence(value)),
            _ => Err(Rejection::ValueMismatch),
        },
        _ => Ok(multi_value::wrap_raw_sequence(value)),
    }
}

/// Add a value next to what is stored for a non-unique key.
fn merge_added(current: MetaValue, value: MetaValue) -> MetaValue {
    match (current, value) {
        (MetaValue::Null, value) => multi_value::wrap_raw_sequence(value),
        (MetaValue::Multi(current), MetaValue::Multi(more)) => {
            MetaValue::Multi(multi_value::concat(current, more))
        }
        (MetaValue::Sequence(items), value) => {
            let existing = MetaValue::Multi(MultiValue::from_values(items));
            MetaValue::Multi(multi_value::append(existing, value))
        }
        (current, value) => MetaValue::Multi(multi_value::append(current, value)),
    }
}
