//! Table statistics for status output.

use crate::column_type::ColumnType;
use crate::meta_type::MetaType;
use crate::optimizer::{MetaOptimizer, Result};
use crate::storage::WideStore;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub meta_type: MetaType,
    pub table: String,
    pub rows: u64,
    pub size_bytes: Option<u64>,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnReport {
    pub column: String,
    /// Lowercase declared type, e.g. `varchar(20)`.
    pub column_type: String,
    pub key: String,
    /// The key was renamed to avoid a reserved column name.
    pub translated: bool,
}

impl<S: WideStore> MetaOptimizer<S> {
    /// Row count, size and cached column count of one wide table.
    pub fn table_stats(&self, meta_type: MetaType) -> Result<TableStats> {
        let table = self.table(meta_type);
        let columns = self.cache.columns(&self.store, &table, true)?;
        Ok(TableStats {
            meta_type,
            rows: self.store.row_count(&table)?,
            size_bytes: self.store.table_size(&table)?,
            column_count: columns.len(),
            table: table.name,
        })
    }

    /// Dynamic columns sorted by name, with the key each one stores.
    pub fn column_report(&self, meta_type: MetaType) -> Result<Vec<ColumnReport>> {
        let table = self.table(meta_type);
        let mut report: Vec<ColumnReport> = self
            .store
            .column_info(&table)?
            .into_iter()
            .map(|info| {
                let key = self.translator.to_key(meta_type, &info.name);
                ColumnReport {
                    translated: key != info.name,
                    column_type: declared(&info.column_type),
                    column: info.name,
                    key,
                }
            })
            .collect();
        report.sort_by(|a, b| a.column.cmp(&b.column));
        Ok(report)
    }
}

fn declared(column_type: &ColumnType) -> String {
    column_type.to_string().to_ascii_lowercase()
}

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Size in binary units, the unit picked from the number of decimal digits.
///
/// `human_file_size(1500, 2)` is `"1.46 KB"`; plain bytes never show decimals.
pub fn human_file_size(bytes: u64, decimals: usize) -> String {
    let digits = bytes.to_string().len();
    let factor = ((digits - 1) / 3).min(SIZE_UNITS.len() - 1);
    let decimals = if factor == 0 { 0 } else { decimals };
    let scaled = bytes as f64 / 1024f64.powi(factor as i32);
    format!("{scaled:.decimals$} {}", SIZE_UNITS[factor])
}
