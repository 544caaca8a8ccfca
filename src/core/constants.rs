// Cache sizing and maintenance
pub const DEFAULT_MAX_MEMORY_SIZE: usize = 1000;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 3600;
pub const BACKUP_RETENTION: usize = 5;
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

// Persistent layout
pub const INDEX_FILE_NAME: &str = "cache_index.json";
pub const BACKUP_DIR_NAME: &str = "backups";
pub const BACKUP_FILE_PREFIX: &str = "cache_backup_";

// Default TTLs per data category (seconds)
pub const STOCK_TTL_SECS: i64 = 300;
pub const CRYPTO_TTL_SECS: i64 = 60;
pub const CURRENCY_TTL_SECS: i64 = 3600;
pub const COMMODITY_TTL_SECS: i64 = 300;
pub const INDEX_TTL_SECS: i64 = 300;
pub const FUND_TTL_SECS: i64 = 86400;

// Simulated fallback data is superseded quickly
pub const FALLBACK_TTL_SECS: i64 = 60;

// Request handling
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_MULTI_FETCH_TIMEOUT_SECS: u64 = 60;
