//! Keeps a wide table's columns able to hold incoming values.

use crate::cache::SchemaCache;
use crate::classify::classify;
use crate::column_type::{ColumnDescriptor, ColumnType};
use crate::meta_type::MetaTable;
use crate::promotion;
use crate::storage::{DdlOutcome, StorageError, WideStore};
use crate::value::MetaValue;
use thiserror::Error;

/// What [`SchemaMutator::ensure_column`] did to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    Unchanged,
    Created(ColumnType),
    Widened { from: ColumnType, to: ColumnType },
}

#[derive(Debug, Error)]
#[error("schema change of {table}.{column} failed: {source}")]
pub struct SchemaMutationError {
    pub table: String,
    pub column: String,
    #[source]
    pub source: StorageError,
}

pub struct SchemaMutator<'a, S: ?Sized> {
    store: &'a S,
    cache: &'a SchemaCache,
}

impl<'a, S: WideStore + ?Sized> SchemaMutator<'a, S> {
    pub fn new(store: &'a S, cache: &'a SchemaCache) -> Self {
        Self { store, cache }
    }

    /// Make sure `column` exists in `table` with a type able to hold `value`.
    ///
    /// Existence and declared type are always read live. A column created by a
    /// concurrent writer is treated as present and checked for widening.
    pub fn ensure_column(
        &self,
        table: &MetaTable,
        column: &str,
        value: &MetaValue,
    ) -> Result<ColumnChange, SchemaMutationError> {
        self.ensure_column_inner(table, column, value)
            .map_err(|source| SchemaMutationError {
                table: table.name.clone(),
                column: column.to_string(),
                source,
            })
    }

    fn ensure_column_inner(
        &self,
        table: &MetaTable,
        column: &str,
        value: &MetaValue,
    ) -> Result<ColumnChange, StorageError> {
        let classification = classify(value);

        if !self.cache.column_exists(self.store, table, column, false)? {
            let descriptor = ColumnDescriptor::new(column, classification.column_type.clone());
            match self.store.add_column(table, &descriptor)? {
                DdlOutcome::Applied => {
                    self.cache.invalidate(table);
                    return Ok(ColumnChange::Created(descriptor.column_type));
                }
                DdlOutcome::AlreadyPresent => {
                    log::warn!("column {column} of {} appeared concurrently", table.name);
                }
            }
        }

        let Some(current) = self.store.column_type(table, column)? else {
            return Err(StorageError::MissingColumn {
                table: table.name.clone(),
                column: column.to_string(),
            });
        };

        let mut target = promotion::resolve(&current, &classification.column_type);
        if target.is_wide_string()
            && !promotion::fits_declared_size(&current, classification.serialized_len)
        {
            let stored = self.store.max_value_length(table, column)?;
            target = promotion::size_wide_string(classification.serialized_len, stored);
        }

        if target == current {
            log::debug!(
                "column {column} of {} already holds {}",
                table.name,
                classification.column_type
            );
            return Ok(ColumnChange::Unchanged);
        }

        let descriptor = ColumnDescriptor::new(column, target.clone());
        match self.store.alter_column(table, &descriptor)? {
            DdlOutcome::Applied => {
                self.cache.invalidate(table);
                Ok(ColumnChange::Widened {
                    from: current,
                    to: target,
                })
            }
            DdlOutcome::AlreadyPresent => Ok(ColumnChange::Unchanged),
        }
    }
}
