use crate::config::OptimizerConfig;
use crate::meta_type::MetaType;
use std::collections::{BTreeMap, BTreeSet};

/// Decides which keys are flattened and how repeated values are treated.
pub trait MetaPolicy {
    /// Whether values of `key` belong in the wide table at all.
    fn is_eligible(&self, meta_type: MetaType, key: &str) -> bool;

    /// Whether `key` holds a single value per object.
    fn is_unique(&self, _meta_type: MetaType, _key: &str) -> bool {
        false
    }
}

/// Keys managed elsewhere and never copied.
pub const BUILTIN_IGNORED_KEYS: [(MetaType, &[&str]); 2] = [
    (MetaType::Post, &["_edit_lock", "_edit_last"]),
    (MetaType::User, &["session_tokens", "wp_capabilities"]),
];

/// Built-in ignore lists plus a configurable black list per type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultPolicy {
    black_list: BTreeMap<MetaType, BTreeSet<String>>,
}

impl DefaultPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        let mut policy = Self::new();
        for (meta_type, keys) in &config.ignored_keys {
            for key in keys {
                policy = policy.ignore(*meta_type, key.trim());
            }
        }
        policy
    }

    pub fn ignore(mut self, meta_type: MetaType, key: impl Into<String>) -> Self {
        self.black_list.entry(meta_type).or_default().insert(key.into());
        self
    }

    fn is_builtin_ignored(meta_type: MetaType, key: &str) -> bool {
        BUILTIN_IGNORED_KEYS
            .iter()
            .any(|(t, keys)| *t == meta_type && keys.contains(&key))
    }
}

impl MetaPolicy for DefaultPolicy {
    fn is_eligible(&self, meta_type: MetaType, key: &str) -> bool {
        if key.is_empty() || Self::is_builtin_ignored(meta_type, key) {
            return false;
        }
        !self
            .black_list
            .get(&meta_type)
            .is_some_and(|keys| keys.contains(key))
    }
}
