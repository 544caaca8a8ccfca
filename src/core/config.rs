use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::PathBuf;

use crate::core::constants::*;
use crate::core::error::{ DataError, DataResult };
use crate::models::DataCategory;

/// Top-level configuration consumed by the data manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    // Cache settings
    pub cache: CacheSettings,

    // Per-category default TTLs
    pub expiration: ExpirationConfig,

    // Fallback settings
    pub fallback: FallbackConfig,

    // Request handling
    pub default_timeout_secs: u64,
    pub retry_count: u32,
    pub max_workers: usize,
    pub multi_fetch_timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            expiration: ExpirationConfig::default(),
            fallback: FallbackConfig::default(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            max_workers: DEFAULT_MAX_WORKERS,
            multi_fetch_timeout_secs: DEFAULT_MULTI_FETCH_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of in-memory entries before eviction kicks in.
    pub max_memory_size: usize,
    pub cleanup_interval_secs: u64,
    pub persistent_dir: PathBuf,
    pub backup_enabled: bool,
    pub backup_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_memory_size: DEFAULT_MAX_MEMORY_SIZE,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            persistent_dir: PathBuf::from("./cache"),
            backup_enabled: true,
            backup_interval_secs: DEFAULT_BACKUP_INTERVAL_SECS,
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> DataResult<()> {
        if self.max_memory_size == 0 {
            return Err(DataError::Config("max_memory_size must be positive".to_string()));
        }

        if self.cleanup_interval_secs == 0 {
            return Err(DataError::Config("cleanup_interval_secs must be positive".to_string()));
        }

        if self.backup_enabled && self.backup_interval_secs == 0 {
            return Err(DataError::Config("backup_interval_secs must be positive".to_string()));
        }

        if self.persistent_dir.as_os_str().is_empty() {
            return Err(DataError::Config("persistent_dir is required".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationConfig {
    pub stock_secs: i64,
    pub crypto_secs: i64,
    pub currency_secs: i64,
    pub commodity_secs: i64,
    pub index_secs: i64,
    pub fund_secs: i64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            stock_secs: STOCK_TTL_SECS,
            crypto_secs: CRYPTO_TTL_SECS,
            currency_secs: CURRENCY_TTL_SECS,
            commodity_secs: COMMODITY_TTL_SECS,
            index_secs: INDEX_TTL_SECS,
            fund_secs: FUND_TTL_SECS,
        }
    }
}

impl ExpirationConfig {
    /// Default TTL for a data category.
    pub fn ttl_for(&self, category: DataCategory) -> i64 {
        match category {
            DataCategory::Stock => self.stock_secs,
            DataCategory::Crypto => self.crypto_secs,
            DataCategory::Currency => self.currency_secs,
            DataCategory::Commodity => self.commodity_secs,
            DataCategory::Index => self.index_secs,
            DataCategory::Fund => self.fund_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub use_simulated_data: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_simulated_data: true,
        }
    }
}

impl DataConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &str) -> DataResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!("Configuration loaded from {}", path);
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> DataResult<()> {
        self.cache.validate()?;

        if self.default_timeout_secs == 0 {
            return Err(DataError::Config("default_timeout_secs must be positive".to_string()));
        }

        if self.max_workers == 0 {
            return Err(DataError::Config("max_workers must be positive".to_string()));
        }

        if self.multi_fetch_timeout_secs == 0 {
            return Err(DataError::Config("multi_fetch_timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = DataConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expiration.ttl_for(DataCategory::Crypto), CRYPTO_TTL_SECS);
        assert_eq!(config.expiration.ttl_for(DataCategory::Fund), FUND_TTL_SECS);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = DataConfig::default();
        config.cache.max_memory_size = 0;
        assert!(matches!(config.validate(), Err(DataError::Config(_))));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut config = DataConfig::default();
        config.max_workers = 0;
        assert!(matches!(config.validate(), Err(DataError::Config(_))));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"cache": {{"max_memory_size": 50, "backup_enabled": false}}, "retry_count": 1}}"#
        )
        .unwrap();

        let config = DataConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.cache.max_memory_size, 50);
        assert!(!config.cache.backup_enabled);
        assert_eq!(config.retry_count, 1);
        assert_eq!(config.default_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
