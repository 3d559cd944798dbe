use crate::meta_type::{MetaTable, MetaType};
use crate::storage::{Result as StorageResult, WideStore};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SchemaCacheConfig {
    /// How long a column listing stays valid (default: 1 hour).
    pub ttl: Duration,
    /// Max number of (table, type) listings kept (default: 64).
    pub capacity: usize,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            capacity: 64,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchemaCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub loads: u64,
    pub invalidations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    table: String,
    meta_type: MetaType,
}

impl CacheKey {
    fn of(table: &MetaTable) -> Self {
        Self {
            table: table.name.clone(),
            meta_type: table.meta_type,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    columns: Vec<String>,
    loaded_at: Instant,
}

struct Inner {
    entries: LruCache<CacheKey, CacheEntry>,
    stats: SchemaCacheStats,
}

/// Column listings of wide tables, keyed by (table, meta type).
///
/// Listings exclude housekeeping columns. Cached data is fine for reporting;
/// anything deciding on a structural change must pass `use_cache = false`,
/// which always reads the live table (and refreshes the entry).
pub struct SchemaCache {
    config: SchemaCacheConfig,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(SchemaCacheConfig::default())
    }
}

impl SchemaCache {
    pub fn new(mut config: SchemaCacheConfig) -> Self {
        config.capacity = config.capacity.max(1);
        let cap = NonZeroUsize::new(config.capacity).expect("capacity is non-zero");
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: LruCache::new(cap),
                stats: SchemaCacheStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &SchemaCacheConfig {
        &self.config
    }

    /// Dynamic column names of `table`, in table order.
    pub fn columns<S: WideStore + ?Sized>(
        &self,
        store: &S,
        table: &MetaTable,
        use_cache: bool,
    ) -> StorageResult<Vec<String>> {
        let key = CacheKey::of(table);

        if use_cache {
            let mut inner = self.inner.lock().expect("schema cache mutex poisoned");
            let ttl = self.config.ttl;
            let cached = inner
                .entries
                .get(&key)
                .map(|entry| (entry.loaded_at.elapsed() < ttl).then(|| entry.columns.clone()));
            match cached {
                Some(Some(columns)) => {
                    inner.stats.hits += 1;
                    return Ok(columns);
                }
                Some(None) => {
                    inner.entries.pop(&key);
                    inner.stats.expired += 1;
                }
                None => inner.stats.misses += 1,
            }
        }

        // The store is queried without holding the lock.
        let columns = store.dynamic_columns(table)?;
        log::debug!(
            "loaded {} column(s) of {} ({})",
            columns.len(),
            table.name,
            table.meta_type
        );

        let mut inner = self.inner.lock().expect("schema cache mutex poisoned");
        inner.stats.loads += 1;
        inner.entries.put(
            key,
            CacheEntry {
                columns: columns.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(columns)
    }

    /// Whether `column` exists, ignoring ASCII case like SQLite does.
    /// Uncached unless `use_cache` is set.
    pub fn column_exists<S: WideStore + ?Sized>(
        &self,
        store: &S,
        table: &MetaTable,
        column: &str,
        use_cache: bool,
    ) -> StorageResult<bool> {
        Ok(self.find_column(store, table, column, use_cache)?.is_some())
    }

    /// Stored spelling of `column`, which may differ from it in case.
    pub fn find_column<S: WideStore + ?Sized>(
        &self,
        store: &S,
        table: &MetaTable,
        column: &str,
        use_cache: bool,
    ) -> StorageResult<Option<String>> {
        Ok(self
            .columns(store, table, use_cache)?
            .into_iter()
            .find(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Drop the listing of one table.
    pub fn invalidate(&self, table: &MetaTable) {
        let mut inner = self.inner.lock().expect("schema cache mutex poisoned");
        if inner.entries.pop(&CacheKey::of(table)).is_some() {
            inner.stats.invalidations += 1;
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("schema cache mutex poisoned");
        let dropped = inner.entries.len() as u64;
        inner.entries.clear();
        inner.stats.invalidations += dropped;
    }

    pub fn cached_tables(&self) -> usize {
        self.inner
            .lock()
            .expect("schema cache mutex poisoned")
            .entries
            .len()
    }

    pub fn stats(&self) -> SchemaCacheStats {
        self.inner.lock().expect("schema cache mutex poisoned").stats
    }
}
