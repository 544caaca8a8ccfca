// Background upkeep for the cache store: the expiry sweep and the
// backup/rotation loop. Each loop is an independent task stopped
// through its own watch channel so they can be tested and cancelled
// separately.

use std::fs::{ self, File };
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::core::constants::{ BACKUP_FILE_PREFIX, BACKUP_RETENTION };
use crate::core::error::{ DataError, DataResult };

use super::CacheStore;

pub(super) async fn cleanup_loop(store: Arc<CacheStore>, mut stop: watch::Receiver<bool>) {
    let interval = Duration::from_secs(store.settings.cleanup_interval_secs);

    loop {
        tokio::select! {
            _ = sleep(interval) => {
                store.sweep_expired();
            }
            _ = stop.changed() => {
                break;
            }
        }
    }

    log::debug!("Cache cleanup task stopped");
}

pub(super) async fn backup_loop(store: Arc<CacheStore>, mut stop: watch::Receiver<bool>) {
    let interval = Duration::from_secs(store.settings.backup_interval_secs);

    loop {
        tokio::select! {
            _ = sleep(interval) => {
                if let Err(e) = store.run_backup() {
                    log::error!("Cache backup failed: {}", e);
                }
            }
            _ = stop.changed() => {
                break;
            }
        }
    }

    log::debug!("Cache backup task stopped");
}

impl CacheStore {
    /// Drop expired entries from memory, then walk every persisted
    /// entry file and delete the expired ones. The disk scan is
    /// independent of the in-memory map and may touch entries never
    /// loaded in this process lifetime.
    pub(crate) fn sweep_expired(&self) {
        let inner = &mut *self.inner.lock();

        let expired: Vec<String> = inner.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.remove(key);
            inner.counters.deletes += 1;
            self.storage.remove_entry(key);
        }

        if !expired.is_empty() {
            Self::persist_index(&self.storage, &inner.entries);
            log::info!("🧹 Removed {} expired cache entries", expired.len());
        }

        for path in self.storage.entry_files() {
            match self.storage.read_entry(&path) {
                Ok(entry) => {
                    if entry.is_expired() {
                        match fs::remove_file(&path) {
                            Ok(()) => log::debug!("Removed expired cache file {}", path.display()),
                            Err(e) => log::warn!(
                                "Failed to remove expired cache file {}: {}",
                                path.display(),
                                e
                            ),
                        }
                    }
                }
                Err(DataError::CacheCorruption(reason)) => {
                    log::warn!("Deleting corrupted cache file: {}", reason);
                    let _ = fs::remove_file(&path);
                }
                Err(e) => log::warn!("Failed to inspect cache file {}: {}", path.display(), e),
            }
        }
    }

    /// Bundle the persistent directory into a timestamped tar.gz
    /// snapshot, then prune old snapshots down to the retention count.
    pub(crate) fn run_backup(&self) -> DataResult<PathBuf> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = self.storage
            .backup_dir()
            .join(format!("{}{}.tar.gz", BACKUP_FILE_PREFIX, timestamp));

        let file = File::create(&backup_path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut archive = tar::Builder::new(encoder);

        let mut files = self.storage.entry_files();
        let index = self.storage.index_path();
        if index.exists() {
            files.push(index);
        }

        let mut bundled = 0usize;
        for path in files {
            let name = match path.file_name() {
                Some(name) => name.to_os_string(),
                None => continue,
            };
            match archive.append_path_with_name(&path, &name) {
                Ok(()) => bundled += 1,
                Err(e) => log::warn!("Failed to include {} in backup: {}", path.display(), e),
            }
        }

        archive.into_inner()?.finish()?;

        {
            let mut inner = self.inner.lock();
            inner.counters.backups += 1;
            inner.counters.last_backup = Some(Utc::now());
        }

        self.prune_old_backups();
        log::info!("Cache backup created: {} ({} files)", backup_path.display(), bundled);

        Ok(backup_path)
    }

    // Keep only the most recent snapshots by filename ordering.
    fn prune_old_backups(&self) {
        let dir = match fs::read_dir(self.storage.backup_dir()) {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Failed to list backup directory: {}", e);
                return;
            }
        };

        let mut backups: Vec<PathBuf> = dir
            .flatten()
            .map(|item| item.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| {
                        name.starts_with(BACKUP_FILE_PREFIX) && name.ends_with(".tar.gz")
                    })
            })
            .collect();

        if backups.len() <= BACKUP_RETENTION {
            return;
        }

        backups.sort();
        let excess = backups.len() - BACKUP_RETENTION;
        for old in backups.into_iter().take(excess) {
            match fs::remove_file(&old) {
                Ok(()) => log::debug!("Old backup removed: {}", old.display()),
                Err(e) => log::warn!("Failed to remove old backup {}: {}", old.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheSettings;
    use crate::models::{ DataCategory, DataQuality, DataSource };
    use serde_json::json;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> CacheStore {
        CacheStore::new(CacheSettings {
            max_memory_size: 100,
            cleanup_interval_secs: 1,
            persistent_dir: dir.to_path_buf(),
            backup_enabled: true,
            backup_interval_secs: 1,
        }).unwrap()
    }

    #[test]
    fn test_sweep_removes_expired_from_both_tiers() {
        let dir = tempdir().unwrap();
        let cache = store(dir.path());

        cache.set("stale", json!(1), DataCategory::Crypto, Some(-1), DataSource::Binance, DataQuality::Good);
        cache.set("live", json!(2), DataCategory::Crypto, Some(3600), DataSource::Binance, DataQuality::Good);

        cache.sweep_expired();

        assert_eq!(cache.len(), 1);
        assert!(cache.exists("live"));
        assert_eq!(cache.stats().deletes, 1);
        // one live entry file left on disk
        assert_eq!(cache.storage.entry_files().len(), 1);
    }

    #[test]
    fn test_sweep_cleans_disk_entries_unknown_to_memory() {
        let dir = tempdir().unwrap();

        // first store persists an entry that expires right away
        {
            let cache = store(dir.path());
            cache.set("orphan", json!(1), DataCategory::Crypto, Some(-1), DataSource::Binance, DataQuality::Good);
        }

        // second store never loads the expired entry but its sweep
        // still scrubs the file
        let cache = store(dir.path());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.storage.entry_files().len(), 1);

        cache.sweep_expired();
        assert!(cache.storage.entry_files().is_empty());
    }

    #[test]
    fn test_sweep_deletes_corrupted_files() {
        let dir = tempdir().unwrap();
        let cache = store(dir.path());

        fs::write(dir.path().join("deadbeef.json"), "{ not json").unwrap();
        cache.sweep_expired();

        assert!(cache.storage.entry_files().is_empty());
    }

    #[test]
    fn test_backup_creates_snapshot_and_counts() {
        let dir = tempdir().unwrap();
        let cache = store(dir.path());

        cache.set("k", json!(1), DataCategory::Stock, None, DataSource::YahooFinance, DataQuality::Good);

        let path = cache.run_backup().unwrap();
        assert!(path.exists());
        assert!(path.to_str().unwrap().ends_with(".tar.gz"));

        let stats = cache.stats();
        assert_eq!(stats.backups, 1);
        assert!(stats.last_backup.is_some());
    }

    #[test]
    fn test_backup_retention_keeps_five() {
        let dir = tempdir().unwrap();
        let cache = store(dir.path());

        let backup_dir = cache.storage.backup_dir().to_path_buf();
        for day in 1..=7 {
            fs::write(
                backup_dir.join(format!("{}2024010{}_120000.tar.gz", BACKUP_FILE_PREFIX, day)),
                b"stub",
            ).unwrap();
        }

        cache.prune_old_backups();

        let mut remaining: Vec<String> = fs
            ::read_dir(&backup_dir)
            .unwrap()
            .flatten()
            .map(|item| item.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();

        assert_eq!(remaining.len(), 5);
        // the two oldest are gone
        assert!(!remaining.contains(&format!("{}20240101_120000.tar.gz", BACKUP_FILE_PREFIX)));
        assert!(!remaining.contains(&format!("{}20240102_120000.tar.gz", BACKUP_FILE_PREFIX)));
    }

    #[tokio::test]
    async fn test_maintenance_loops_start_and_stop() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(store(dir.path()));

        cache.set("stale", json!(1), DataCategory::Crypto, Some(-1), DataSource::Binance, DataQuality::Good);

        Arc::clone(&cache).start_maintenance();
        sleep(Duration::from_millis(1500)).await;
        cache.shutdown().await;

        assert!(!cache.exists("stale"));
        assert!(cache.stats().backups >= 1);
    }
}
