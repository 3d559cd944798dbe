use crate::cache::SchemaCache;
use crate::config::OptimizerConfig;
use crate::meta_type::{MetaTable, MetaType, TableNames};
use crate::mutator::{ColumnChange, SchemaMutationError, SchemaMutator};
use crate::naming::ColumnNameTranslator;
use crate::storage::{StorageError, WideStore};
use crate::value::MetaValue;
use chrono::{NaiveDateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error(transparent)]
    SchemaMutation(#[from] SchemaMutationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Entry point for writing and reading flattened metadata.
///
/// Holds the store, a shared [`SchemaCache`] and the naming rules. Cloning the
/// cache `Arc` into several optimizers over the same database keeps their
/// column listings coherent.
pub struct MetaOptimizer<S> {
    pub(crate) store: S,
    pub(crate) cache: Arc<SchemaCache>,
    pub(crate) config: OptimizerConfig,
    pub(crate) names: TableNames,
    pub(crate) translator: ColumnNameTranslator,
}

impl<S: WideStore> MetaOptimizer<S> {
    pub fn new(store: S, config: OptimizerConfig) -> Self {
        let cache = Arc::new(SchemaCache::new(config.cache()));
        Self::with_cache(store, config, cache)
    }

    /// Table names come from the store; configured names that differ are
    /// ignored with a warning.
    pub fn with_cache(store: S, config: OptimizerConfig, cache: Arc<SchemaCache>) -> Self {
        let names = store.names().clone();
        if names != config.table_names() {
            log::warn!(
                "configured tables {}*{} differ from the store's {}*{}, using the store's",
                config.table_prefix,
                config.wide_table_suffix,
                names.prefix,
                names.wide_suffix
            );
        }
        Self {
            names,
            translator: config.translator(),
            store,
            cache,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn translator(&self) -> &ColumnNameTranslator {
        &self.translator
    }

    pub fn table(&self, meta_type: MetaType) -> MetaTable {
        self.names.wide_table(meta_type)
    }

    /// Storage name of a metadata key.
    pub fn column_name(&self, meta_type: MetaType, key: &str) -> String {
        self.translator.to_column(meta_type, key)
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    /// Make sure the column of `key` can hold `value`.
    pub fn ensure_column(
        &self,
        meta_type: MetaType,
        key: &str,
        value: &MetaValue,
    ) -> Result<ColumnChange> {
        let table = self.table(meta_type);
        let column = self.column_name(meta_type, key);
        Ok(SchemaMutator::new(&self.store, &self.cache).ensure_column(&table, &column, value)?)
    }

    /// Decoded value of one key, `None` when the object or the key has none.
    pub fn get_meta(
        &self,
        meta_type: MetaType,
        object_id: u64,
        key: &str,
    ) -> Result<Option<MetaValue>> {
        let table = self.table(meta_type);
        let column = self.column_name(meta_type, key);
        match self.store.read_value(&table, object_id, &column) {
            Ok(value) => Ok(value.filter(|v| !v.is_null())),
            Err(StorageError::MissingColumn { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// All non-null values of an object keyed by their metadata keys.
    pub fn get_row(
        &self,
        meta_type: MetaType,
        object_id: u64,
    ) -> Result<Option<Vec<(String, MetaValue)>>> {
        let table = self.table(meta_type);
        let row = self.store.read_row(&table, object_id)?;
        Ok(row.map(|cells| {
            cells
                .into_iter()
                .map(|(column, value)| (self.translator.to_key(meta_type, &column), value))
                .collect()
        }))
    }

    /// Remove the object's row; returns the number of rows removed.
    pub fn delete_object(&self, meta_type: MetaType, object_id: u64) -> Result<usize> {
        let deleted = self.store.delete_row(&self.table(meta_type), object_id)?;
        if deleted > 0 {
            log::debug!("deleted {meta_type} {object_id} from wide table");
        }
        Ok(deleted)
    }

    /// Clear one key of an object; the column itself stays.
    pub fn delete_meta(&self, meta_type: MetaType, object_id: u64, key: &str) -> Result<usize> {
        let table = self.table(meta_type);
        let column = self.column_name(meta_type, key);
        if !self.cache.column_exists(&self.store, &table, &column, false)? {
            return Ok(0);
        }
        Ok(self
            .store
            .update_value(&table, object_id, &column, &MetaValue::Null, self.now())?)
    }

    /// Drop all rows and dynamic columns of one meta type.
    pub fn reset_table(&self, meta_type: MetaType) -> Result<()> {
        let table = self.table(meta_type);
        self.cache.invalidate(&table);
        self.store.reset_table(&table)?;
        // A listing loaded while the table was rebuilt is stale.
        self.cache.invalidate(&table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::upsert::{WriteOutcome, WriteRequest};
    use pretty_assertions::assert_eq;

    fn optimizer() -> MetaOptimizer<Storage> {
        MetaOptimizer::new(
            Storage::open_in_memory().expect("open storage"),
            OptimizerConfig::default(),
        )
    }

    fn add(opt: &MetaOptimizer<Storage>, id: u64, key: &str, value: impl Into<MetaValue>) {
        let outcome = opt
            .write(WriteRequest::new(MetaType::Post, id, key, value).add_meta(true))
            .expect("write");
        assert!(!matches!(outcome, WriteOutcome::Rejected(_)), "{outcome:?}");
    }

    #[test]
    fn rows_read_back_under_original_keys() {
        let opt = optimizer();
        add(&opt, 1, "color", "red");
        add(&opt, 1, "meta_id", 5);

        let mut row = opt.get_row(MetaType::Post, 1).expect("row").expect("present");
        row.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            row,
            vec![
                ("color".to_string(), MetaValue::text("red")),
                ("meta_id".to_string(), MetaValue::Int(5)),
            ]
        );
        assert_eq!(
            opt.get_meta(MetaType::Post, 1, "meta_id").expect("get"),
            Some(MetaValue::Int(5))
        );
        assert_eq!(opt.get_meta(MetaType::Post, 1, "missing").expect("get"), None);
        assert_eq!(opt.get_meta(MetaType::Post, 2, "color").expect("get"), None);
    }

    #[test]
    fn deletes_clear_values_and_rows() {
        let opt = optimizer();
        add(&opt, 1, "color", "red");
        add(&opt, 1, "size", 3);

        assert_eq!(opt.delete_meta(MetaType::Post, 1, "color").expect("delete meta"), 1);
        assert_eq!(opt.get_meta(MetaType::Post, 1, "color").expect("get"), None);
        assert_eq!(opt.delete_meta(MetaType::Post, 1, "never").expect("delete meta"), 0);

        assert_eq!(opt.delete_object(MetaType::Post, 1).expect("delete row"), 1);
        assert_eq!(opt.get_row(MetaType::Post, 1).expect("row"), None);
    }

    #[test]
    fn table_names_follow_the_store() {
        let store = Storage::open_in_memory_with(TableNames::new("blog_", "_flat")).expect("open");
        let config = OptimizerConfig {
            table_prefix: "other_".to_string(),
            ..OptimizerConfig::default()
        };
        let opt = MetaOptimizer::new(store, config);

        assert_eq!(opt.table(MetaType::Post).name, "blog_postmeta_flat");
        add(&opt, 1, "color", "red");
        assert_eq!(
            opt.get_meta(MetaType::Post, 1, "color").expect("get"),
            Some(MetaValue::text("red"))
        );
    }

    #[test]
    fn reset_forgets_columns() {
        let opt = optimizer();
        add(&opt, 1, "color", "red");
        let table = opt.table(MetaType::Post);
        assert_eq!(opt.cache().columns(opt.store(), &table, true).expect("columns"), vec!["color"]);

        opt.reset_table(MetaType::Post).expect("reset");
        assert!(opt.cache().columns(opt.store(), &table, true).expect("columns").is_empty());
        assert_eq!(opt.get_row(MetaType::Post, 1).expect("row"), None);
    }
}
