//! Mapping between metadata keys and wide-table column names.
//!
//! Keys that collide with housekeeping columns (`meta_id`, `created_at`,
//! `updated_at`, `<type>_id`) are stored under a suffixed name.

use crate::meta_type::MetaType;

pub const DEFAULT_RESERVED_SUFFIX: &str = "_wpmork";

/// Housekeeping columns of every wide table, besides the type's id column.
pub const HOUSEKEEPING_COLUMNS: [&str; 3] = ["meta_id", "created_at", "updated_at"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNameTranslator {
    suffix: String,
}

impl Default for ColumnNameTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_SUFFIX)
    }
}

impl ColumnNameTranslator {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Housekeeping columns plus the type's own id column.
    pub fn reserved_names(meta_type: MetaType) -> Vec<String> {
        let mut names: Vec<String> = HOUSEKEEPING_COLUMNS.iter().map(|s| s.to_string()).collect();
        names.push(meta_type.id_column());
        names
    }

    /// Column names compare case-insensitively, so `Created_At` is reserved too.
    pub fn is_reserved(meta_type: MetaType, name: &str) -> bool {
        HOUSEKEEPING_COLUMNS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
            || name.eq_ignore_ascii_case(&meta_type.id_column())
    }

    /// Direction-agnostic translation: a suffixed name loses its suffix, a
    /// reserved name gains it, anything else is returned unchanged.
    pub fn translate(&self, meta_type: MetaType, name: &str) -> String {
        if let Some(stripped) = self.strip_suffix(name) {
            stripped.to_string()
        } else if Self::is_reserved(meta_type, name) {
            format!("{name}{}", self.suffix)
        } else {
            name.to_string()
        }
    }

    /// Column name for a metadata key.
    ///
    /// Keys already ending with the suffix are suffixed once more so that
    /// [`Self::to_key`] can always undo exactly one suffix.
    pub fn to_column(&self, meta_type: MetaType, key: &str) -> String {
        if Self::is_reserved(meta_type, key) || self.strip_suffix(key).is_some() {
            format!("{key}{}", self.suffix)
        } else {
            key.to_string()
        }
    }

    /// Metadata key stored under a column name.
    pub fn to_key(&self, _meta_type: MetaType, column: &str) -> String {
        match self.strip_suffix(column) {
            Some(stripped) => stripped.to_string(),
            None => column.to_string(),
        }
    }

    fn strip_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.suffix.is_empty() {
            return None;
        }
        name.strip_suffix(self.suffix.as_str())
    }
}
