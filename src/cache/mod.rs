// Bounded in-memory cache with a durable on-disk mirror.
//
// All map access, counters and mirror writes are serialized through one
// coarse lock, so persisted state never diverges from memory within a
// process. Running two stores against the same directory is unsafe.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{ DateTime, Utc };
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::CacheSettings;
use crate::core::constants::SHUTDOWN_GRACE_SECS;
use crate::core::error::DataResult;
use crate::models::{ CacheEntry, CacheStats, DataCategory, DataQuality, DataSource };

mod maintenance;
mod storage;

use storage::CacheStorage;

#[derive(Debug, Default)]
struct CacheCounters {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    evictions: u64,
    backups: u64,
    last_backup: Option<DateTime<Utc>>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    counters: CacheCounters,
}

#[derive(Default)]
struct MaintenanceState {
    stops: Vec<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

/// In-memory cache with TTL expiration, least-used eviction and a
/// write-through persistent mirror.
pub struct CacheStore {
    settings: CacheSettings,
    inner: Mutex<CacheInner>,
    storage: CacheStorage,
    maintenance: Mutex<MaintenanceState>,
}

impl CacheStore {
    /// Create a store and load the persistent index. Entries that are
    /// already expired are never resurrected.
    pub fn new(settings: CacheSettings) -> DataResult<Self> {
        settings.validate()?;

        let storage = CacheStorage::new(&settings.persistent_dir)?;
        let entries = storage.load_index();
        if !entries.is_empty() {
            log::info!(
                "Loaded {} cache entries from {}",
                entries.len(),
                settings.persistent_dir.display()
            );
        }

        log::info!("🗄️ Cache store initialized - capacity {} entries", settings.max_memory_size);

        Ok(Self {
            settings,
            inner: Mutex::new(CacheInner {
                entries,
                counters: CacheCounters::default(),
            }),
            storage,
            maintenance: Mutex::new(MaintenanceState::default()),
        })
    }

    /// Get a payload. Expired entries count as misses and are dropped
    /// from both tiers on sight.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).map(|(payload, _, _)| payload)
    }

    /// Like [`get`](Self::get) but also returns the entry's provenance.
    pub fn get_entry(&self, key: &str) -> Option<(Value, DataSource, DataQuality)> {
        let inner = &mut *self.inner.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                inner.counters.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.remove(key);
            inner.counters.misses += 1;
            self.storage.remove_entry(key);
            Self::persist_index(&self.storage, &inner.entries);
            return None;
        }

        let result = inner.entries.get_mut(key).map(|entry| {
            entry.access_count += 1;
            entry.last_accessed = Utc::now();
            (entry.payload.clone(), entry.source, entry.quality)
        });

        if result.is_some() {
            inner.counters.hits += 1;
        }
        result
    }

    /// Insert or overwrite an entry, evicting the least-used entry
    /// first when at capacity. The mirror is rewritten synchronously.
    pub fn set(
        &self,
        key: &str,
        payload: Value,
        category: DataCategory,
        ttl_secs: Option<i64>,
        source: DataSource,
        quality: DataQuality,
    ) {
        let entry = CacheEntry::new(key, payload, category, ttl_secs, source, quality);
        let inner = &mut *self.inner.lock();

        if inner.entries.len() >= self.settings.max_memory_size && !inner.entries.contains_key(key) {
            self.evict_least_used(inner);
        }

        inner.entries.insert(key.to_string(), entry);
        inner.counters.sets += 1;

        if let Some(entry) = inner.entries.get(key) {
            if let Err(e) = self.storage.write_entry(entry) {
                log::error!("Failed to persist cache entry {}: {}", key, e);
            }
        }
        Self::persist_index(&self.storage, &inner.entries);
    }

    /// Remove an entry from both tiers. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let inner = &mut *self.inner.lock();

        if inner.entries.remove(key).is_some() {
            inner.counters.deletes += 1;
            self.storage.remove_entry(key);
            Self::persist_index(&self.storage, &inner.entries);
            true
        } else {
            false
        }
    }

    /// Whether a live entry exists. Does not touch access metadata or
    /// the hit/miss counters.
    pub fn exists(&self, key: &str) -> bool {
        let inner = &mut *self.inner.lock();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                return false;
            }
        };

        if expired {
            inner.entries.remove(key);
            self.storage.remove_entry(key);
            Self::persist_index(&self.storage, &inner.entries);
            return false;
        }

        true
    }

    /// Drop everything from memory and disk.
    pub fn clear(&self) {
        let inner = &mut *self.inner.lock();
        inner.entries.clear();
        self.storage.clear_all();
        log::info!("Cache completely cleared");
    }

    /// Snapshot of current in-memory keys, optionally glob-filtered.
    pub fn keys(&self, pattern: Option<&str>) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner.entries.keys().cloned().collect();

        if let Some(pattern) = pattern {
            match glob::Pattern::new(pattern) {
                Ok(matcher) => keys.retain(|key| matcher.matches(key)),
                Err(e) => log::warn!("Invalid key pattern '{}': {}", pattern, e),
            }
        }

        keys
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let counters = &inner.counters;

        let total_requests = counters.hits + counters.misses;
        let hit_rate = if total_requests > 0 {
            (counters.hits as f64) / (total_requests as f64) * 100.0
        } else {
            0.0
        };
        let usage =
            (inner.entries.len() as f64) / (self.settings.max_memory_size as f64) * 100.0;

        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            evictions: counters.evictions,
            backups: counters.backups,
            last_backup: counters.last_backup,
            total_requests,
            hit_rate: (hit_rate * 100.0).round() / 100.0,
            memory_size: inner.entries.len(),
            max_memory_size: self.settings.max_memory_size,
            memory_usage_percent: (usage * 100.0).round() / 100.0,
        }
    }

    /// Spawn the expiry sweep and (if enabled) backup loops. Must be
    /// called from within a tokio runtime. Idempotent.
    pub fn start_maintenance(self: Arc<Self>) {
        let mut state = self.maintenance.lock();
        if !state.tasks.is_empty() {
            return;
        }

        let (cleanup_stop, cleanup_rx) = watch::channel(false);
        let store = Arc::clone(&self);
        state.tasks.push(tokio::spawn(maintenance::cleanup_loop(store, cleanup_rx)));
        state.stops.push(cleanup_stop);

        if self.settings.backup_enabled {
            let (backup_stop, backup_rx) = watch::channel(false);
            let store = Arc::clone(&self);
            state.tasks.push(tokio::spawn(maintenance::backup_loop(store, backup_rx)));
            state.stops.push(backup_stop);
        }

        log::info!("Cache maintenance tasks started");
    }

    /// Stop maintenance (bounded wait for the current iteration) and
    /// write the final persistent state.
    pub async fn shutdown(&self) {
        let (stops, tasks) = {
            let mut state = self.maintenance.lock();
            (std::mem::take(&mut state.stops), std::mem::take(&mut state.tasks))
        };

        for stop in &stops {
            let _ = stop.send(true);
        }

        for task in tasks {
            if tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), task).await.is_err() {
                log::warn!(
                    "Cache maintenance task did not stop within {}s",
                    SHUTDOWN_GRACE_SECS
                );
            }
        }

        self.save_all();
        log::info!("Cache store shut down");
    }

    /// Persist every in-memory entry plus the index.
    fn save_all(&self) {
        let inner = self.inner.lock();
        for entry in inner.entries.values() {
            if let Err(e) = self.storage.write_entry(entry) {
                log::warn!("Failed to persist cache entry {}: {}", entry.key, e);
            }
        }
        Self::persist_index(&self.storage, &inner.entries);
    }

    // Victim is the entry with the minimum access count; ties fall to
    // map iteration order. This is least-used, not least-recent.
    fn evict_least_used(&self, inner: &mut CacheInner) {
        let victim = inner.entries
            .iter()
            .min_by_key(|(_, entry)| entry.access_count)
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            inner.entries.remove(&key);
            inner.counters.evictions += 1;
            self.storage.remove_entry(&key);
            log::debug!("Evicted least-used cache entry: {}", key);
        }
    }

    fn persist_index(storage: &CacheStorage, entries: &HashMap<String, CacheEntry>) {
        if let Err(e) = storage.write_index(entries) {
            log::error!("Failed to write cache index: {}", e);
        }
    }
}
