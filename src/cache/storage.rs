// Persistent mirror for the cache store: one JSON file per entry plus
// a consolidated index. The index is the source of truth on restart.

use std::collections::HashMap;
use std::fs;
use std::path::{ Path, PathBuf };

use sha2::{ Digest, Sha256 };

use crate::core::constants::{ BACKUP_DIR_NAME, INDEX_FILE_NAME };
use crate::core::error::{ DataError, DataResult };
use crate::models::CacheEntry;

#[derive(Debug)]
pub struct CacheStorage {
    dir: PathBuf,
    backup_dir: PathBuf,
}

impl CacheStorage {
    pub fn new(dir: &Path) -> DataResult<Self> {
        fs::create_dir_all(dir)?;
        let backup_dir = dir.join(BACKUP_DIR_NAME);
        fs::create_dir_all(&backup_dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            backup_dir,
        })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    /// File name for a key, stable across processes.
    fn fingerprint(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        digest
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::fingerprint(key)))
    }

    pub fn write_entry(&self, entry: &CacheEntry) -> DataResult<()> {
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(self.entry_path(&entry.key), json)?;
        Ok(())
    }

    pub fn read_entry(&self, path: &Path) -> DataResult<CacheEntry> {
        let content = fs::read_to_string(path)?;
        serde_json
            ::from_str(&content)
            .map_err(|e| DataError::CacheCorruption(format!("{}: {}", path.display(), e)))
    }

    pub fn remove_entry(&self, key: &str) {
        let path = self.entry_path(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove cache file {}: {}", path.display(), e);
            }
        }
    }

    /// Rewrite the full consolidated index. O(entries) per call.
    pub fn write_index(&self, entries: &HashMap<String, CacheEntry>) -> DataResult<()> {
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(self.index_path(), json)?;
        Ok(())
    }

    /// Load the index, skipping expired and malformed records. Never
    /// fails; a broken index just yields an empty cache.
    pub fn load_index(&self) -> HashMap<String, CacheEntry> {
        let path = self.index_path();
        if !path.exists() {
            return HashMap::new();
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::error!("Failed to read cache index {}: {}", path.display(), e);
                return HashMap::new();
            }
        };

        let raw: HashMap<String, serde_json::Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("Cache index is corrupted, starting empty: {}", e);
                return HashMap::new();
            }
        };

        let mut entries = HashMap::new();
        for (key, value) in raw {
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => {
                    if entry.is_expired() {
                        log::debug!("Skipping expired cache entry on load: {}", key);
                    } else {
                        entries.insert(key, entry);
                    }
                }
                Err(e) => log::warn!("Skipping malformed cache entry {}: {}", key, e),
            }
        }

        entries
    }

    /// All persisted per-entry files, index excluded.
    pub fn entry_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let dir = match fs::read_dir(&self.dir) {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Failed to list cache directory {}: {}", self.dir.display(), e);
                return files;
            }
        };

        for item in dir.flatten() {
            let path = item.path();
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            let is_index = path.file_name().map_or(false, |name| name == INDEX_FILE_NAME);
            if path.is_file() && is_json && !is_index {
                files.push(path);
            }
        }

        files
    }

    /// Delete every persisted cache file, index included.
    pub fn clear_all(&self) {
        let mut files = self.entry_files();
        let index = self.index_path();
        if index.exists() {
            files.push(index);
        }

        for path in files {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove cache file {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ DataCategory, DataQuality, DataSource };
    use serde_json::json;
    use tempfile::tempdir;

    fn entry(key: &str, ttl_secs: Option<i64>) -> CacheEntry {
        CacheEntry::new(
            key,
            json!({ "price": 42.0 }),
            DataCategory::Stock,
            ttl_secs,
            DataSource::YahooFinance,
            DataQuality::Good,
        )
    }

    #[test]
    fn test_entry_file_round_trip() {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        let original = entry("stock_PETR4.SA", Some(300));
        storage.write_entry(&original).unwrap();

        let path = storage.entry_path("stock_PETR4.SA");
        assert!(path.exists());

        let loaded = storage.read_entry(&path).unwrap();
        assert_eq!(loaded.key, original.key);
        assert_eq!(loaded.payload, original.payload);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();
        assert_eq!(storage.entry_path("abc"), storage.entry_path("abc"));
        assert_ne!(storage.entry_path("abc"), storage.entry_path("abd"));
    }

    #[test]
    fn test_corrupted_entry_file_is_reported() {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(storage.read_entry(&path), Err(DataError::CacheCorruption(_))));
    }

    #[test]
    fn test_load_index_skips_expired_and_malformed() {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        let live = entry("live", Some(300));
        let stale = entry("stale", Some(-1));

        let mut index = serde_json::Map::new();
        index.insert("live".into(), serde_json::to_value(&live).unwrap());
        index.insert("stale".into(), serde_json::to_value(&stale).unwrap());
        index.insert("broken".into(), json!({ "key": "broken" }));
        fs::write(storage.index_path(), serde_json::to_string(&index).unwrap()).unwrap();

        let loaded = storage.load_index();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("live"));
    }

    #[test]
    fn test_entry_files_excludes_index() {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        storage.write_entry(&entry("a", None)).unwrap();
        storage.write_entry(&entry("b", None)).unwrap();
        storage.write_index(&HashMap::new()).unwrap();

        assert_eq!(storage.entry_files().len(), 2);
    }

    #[test]
    fn test_clear_all_removes_everything() {
        let dir = tempdir().unwrap();
        let storage = CacheStorage::new(dir.path()).unwrap();

        storage.write_entry(&entry("a", None)).unwrap();
        storage.write_index(&HashMap::new()).unwrap();
        storage.clear_all();

        assert!(storage.entry_files().is_empty());
        assert!(!storage.index_path().exists());
    }
}
