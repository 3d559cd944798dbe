//! Copying legacy key-value rows into wide tables in batches.

use crate::meta_type::MetaType;
use crate::multi_value::MultiValue;
use crate::optimizer::{MetaOptimizer, Result};
use crate::policy::MetaPolicy;
use crate::storage::{LegacyMetaRow, LegacyMetaStore, WideStore};
use crate::upsert::{WriteOutcome, WriteRequest};
use crate::value::MetaValue;
use serde::Serialize;

/// Where a batch stopped. Feed `last_object_id` back as the next cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub last_object_id: Option<u64>,
    pub objects: usize,
    pub values: usize,
    pub skipped_keys: usize,
    pub remaining: u64,
    pub finished: bool,
}

impl<S: WideStore + LegacyMetaStore> MetaOptimizer<S> {
    /// Import up to `batch` objects whose id is below `before` (all objects
    /// when `None`), highest id first. `batch` of `None` uses the configured
    /// batch size.
    pub fn import_batch(
        &self,
        meta_type: MetaType,
        policy: &dyn MetaPolicy,
        before: Option<u64>,
        batch: Option<usize>,
    ) -> Result<ImportProgress> {
        let batch = batch.unwrap_or(self.config.import_batch_size).max(1);
        let ids = self.store.legacy_object_ids(meta_type, before, batch)?;

        let mut progress = ImportProgress::default();
        for &object_id in &ids {
            let rows = self.store.legacy_meta(meta_type, object_id)?;
            for (key, values) in group_by_key(rows) {
                if !policy.is_eligible(meta_type, &key) {
                    progress.skipped_keys += 1;
                    continue;
                }
                let count = values.len();
                let value = if policy.is_unique(meta_type, &key) {
                    values.into_iter().last().unwrap_or_default()
                } else {
                    collapse(values)
                };

                let request = WriteRequest::new(meta_type, object_id, key, value)
                    .add_meta(true)
                    .check_current_value(false);
                match self.write(request)? {
                    WriteOutcome::Rejected(reason) => {
                        log::debug!("skipped a key of {meta_type} {object_id}: {reason:?}");
                        progress.skipped_keys += 1;
                    }
                    _ => progress.values += count,
                }
            }
            progress.objects += 1;
            progress.last_object_id = Some(object_id);
        }

        let cursor = progress.last_object_id.or(before);
        progress.remaining = match cursor {
            Some(_) if ids.is_empty() => 0,
            cursor => self.store.legacy_object_count(meta_type, cursor)?,
        };
        progress.finished = ids.len() < batch || progress.remaining == 0;

        log::info!(
            "imported {} {meta_type} object(s), {} value(s); {} left",
            progress.objects,
            progress.values,
            progress.remaining
        );
        Ok(progress)
    }
}

/// Values per key, keys in first-seen order.
fn group_by_key(rows: Vec<LegacyMetaRow>) -> Vec<(String, Vec<MetaValue>)> {
    let mut groups: Vec<(String, Vec<MetaValue>)> = Vec::new();
    for row in rows {
        let value = row.value.map(MetaValue::Text).unwrap_or_default();
        match groups.iter_mut().find(|(key, _)| *key == row.key) {
            Some((_, values)) => values.push(value),
            None => groups.push((row.key, vec![value])),
        }
    }
    groups
}

fn collapse(mut values: Vec<MetaValue>) -> MetaValue {
    if values.len() == 1 {
        values.pop().unwrap_or_default()
    } else {
        MetaValue::Multi(MultiValue::from_values(values))
    }
}
