use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object kinds whose metadata can be flattened into a wide table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    Post,
    Comment,
    User,
    Term,
}

impl MetaType {
    pub const ALL: [MetaType; 4] = [
        MetaType::Post,
        MetaType::Comment,
        MetaType::User,
        MetaType::Term,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetaType::Post => "post",
            MetaType::Comment => "comment",
            MetaType::User => "user",
            MetaType::Term => "term",
        }
    }

    /// Column holding the object id, both in the legacy EAV table and the wide table.
    pub fn id_column(self) -> String {
        format!("{}_id", self.as_str())
    }

    /// Row identifier column of the legacy EAV table.
    pub fn legacy_row_id_column(self) -> &'static str {
        match self {
            MetaType::User => "umeta_id",
            _ => "meta_id",
        }
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown meta type: {0:?}")]
pub struct UnknownMetaType(pub String);

impl FromStr for MetaType {
    type Err = UnknownMetaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(MetaType::Post),
            "comment" => Ok(MetaType::Comment),
            "user" => Ok(MetaType::User),
            "term" => Ok(MetaType::Term),
            _ => Err(UnknownMetaType(s.to_string())),
        }
    }
}

/// A wide meta table: one row per object, one column per metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaTable {
    pub meta_type: MetaType,
    pub name: String,
    pub id_column: String,
}

/// Naming scheme for legacy and wide tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub prefix: String,
    pub wide_suffix: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            prefix: "wp_".to_string(),
            wide_suffix: "_wpmo".to_string(),
        }
    }
}

impl TableNames {
    pub fn new(prefix: impl Into<String>, wide_suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            wide_suffix: wide_suffix.into(),
        }
    }

    /// `wp_postmeta`, `wp_usermeta`, ...
    pub fn legacy_table(&self, meta_type: MetaType) -> String {
        format!("{}{}meta", self.prefix, meta_type.as_str())
    }

    pub fn wide_table(&self, meta_type: MetaType) -> MetaTable {
        MetaTable {
            meta_type,
            name: format!("{}{}", self.legacy_table(meta_type), self.wide_suffix),
            id_column: meta_type.id_column(),
        }
    }
}
