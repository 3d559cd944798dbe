use crate::cache::SchemaCacheConfig;
use crate::meta_type::{MetaType, TableNames};
use crate::naming::{ColumnNameTranslator, DEFAULT_RESERVED_SUFFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Settings of a [`crate::MetaOptimizer`]. Every field has a default, so a
/// partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerConfig {
    pub table_prefix: String,
    pub wide_table_suffix: String,
    pub reserved_suffix: String,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub import_batch_size: usize,
    /// Keys never copied into wide tables, on top of the built-in lists.
    pub ignored_keys: BTreeMap<MetaType, Vec<String>>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            table_prefix: "wp_".to_string(),
            wide_table_suffix: "_wpmo".to_string(),
            reserved_suffix: DEFAULT_RESERVED_SUFFIX.to_string(),
            cache_ttl_secs: 3600,
            cache_capacity: 64,
            import_batch_size: 100,
            ignored_keys: BTreeMap::new(),
        }
    }
}

impl OptimizerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn table_names(&self) -> TableNames {
        TableNames::new(&self.table_prefix, &self.wide_table_suffix)
    }

    pub fn translator(&self) -> ColumnNameTranslator {
        ColumnNameTranslator::new(&self.reserved_suffix)
    }

    pub fn cache(&self) -> SchemaCacheConfig {
        SchemaCacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: self.cache_capacity,
        }
    }

    pub fn ignored_keys(&self, meta_type: MetaType) -> &[String] {
        self.ignored_keys.get(&meta_type).map_or(&[], Vec::as_slice)
    }
}
