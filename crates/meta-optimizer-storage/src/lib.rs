//! Flattens key-value object metadata into wide SQLite tables.
//!
//! Each meta type (post, comment, user, term) gets a table with one row per
//! object and one column per metadata key. Columns are created and widened as
//! values arrive. The crate exposes:
//! - value classification and a type promotion lattice
//! - reserved-name translation between keys and columns
//! - an ordered multi-value container for non-unique keys
//! - a TTL/LRU cache of table layouts
//! - single-value upserts, reads and deletes on a [`MetaOptimizer`] service
//! - batched import from the legacy key-value tables, and table reports

mod cache;
pub mod classify;
pub mod codec;
pub mod column_type;
pub mod config;
mod import;
pub mod meta_type;
pub mod multi_value;
mod mutator;
pub mod naming;
mod optimizer;
pub mod policy;
pub mod promotion;
mod report;
mod schema;
pub mod storage;
mod upsert;
pub mod value;

pub use cache::{SchemaCache, SchemaCacheConfig, SchemaCacheStats};
pub use classify::{classify, Classification};
pub use column_type::{ColumnDescriptor, ColumnType, TypeFamily};
pub use config::OptimizerConfig;
pub use import::ImportProgress;
pub use meta_type::{MetaTable, MetaType, TableNames, UnknownMetaType};
pub use multi_value::{MultiValue, ReplaceError};
pub use mutator::{ColumnChange, SchemaMutationError, SchemaMutator};
pub use naming::ColumnNameTranslator;
pub use optimizer::{MetaOptimizer, OptimizerError};
pub use policy::{DefaultPolicy, MetaPolicy};
pub use report::{human_file_size, ColumnReport, TableStats};
pub use storage::{
    ColumnInfo, DdlOutcome, LegacyMetaRow, LegacyMetaStore, Storage, StorageError, WideStore,
};
pub use upsert::{Rejection, WriteOutcome, WriteRequest};
pub use value::MetaValue;
