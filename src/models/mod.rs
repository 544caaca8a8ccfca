// Data models shared by the cache store and the data manager.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod price;

pub use price::{ExchangeRate, PriceData};

use crate::core::constants::{DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT_SECS};

/// Kind of financial data a cached value belongs to.
///
/// Only used to pick default TTLs and for diagnostics; payloads are
/// never interpreted based on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Stock,
    Crypto,
    Currency,
    Commodity,
    Index,
    Fund,
}

impl DataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Stock => "stock",
            DataCategory::Crypto => "crypto",
            DataCategory::Currency => "currency",
            DataCategory::Commodity => "commodity",
            DataCategory::Index => "index",
            DataCategory::Fund => "fund",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream data sources, one variant per concrete collaborator.
///
/// Registration order in the provider registry encodes fallback
/// preference; `Simulated` marks synthetic placeholder data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    Binance,
    ExchangeRateApi,
    AlphaVantage,
    FundScraper,
    Simulated,
    #[default]
    Unknown,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::YahooFinance => "yahoo_finance",
            DataSource::Binance => "binance",
            DataSource::ExchangeRateApi => "exchange_rate_api",
            DataSource::AlphaVantage => "alpha_vantage",
            DataSource::FundScraper => "fund_scraper",
            DataSource::Simulated => "simulated",
            DataSource::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse provenance/confidence tag attached to cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl DataQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Excellent => "excellent",
            DataQuality::Good => "good",
            DataQuality::Fair => "fair",
            DataQuality::Poor => "poor",
            DataQuality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cached value with its provenance and access bookkeeping.
///
/// Owned exclusively by the cache store; callers only ever receive
/// clones of `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub category: DataCategory,
    pub created_at: DateTime<Utc>,
    /// None means the entry never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub source: DataSource,
    pub quality: DataQuality,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        key: &str,
        payload: Value,
        category: DataCategory,
        ttl_secs: Option<i64>,
        source: DataSource,
        quality: DataQuality,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            payload,
            category,
            created_at: now,
            expires_at: ttl_secs.map(|secs| now + chrono::Duration::seconds(secs)),
            source,
            quality,
            access_count: 0,
            last_accessed: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }
}

/// A keyed request resolved by the data manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequest {
    pub key: String,
    pub category: DataCategory,
    /// Ordered source preference; empty means registry order.
    pub sources: Vec<DataSource>,
    pub force_refresh: bool,
    pub timeout_secs: u64,
    pub retry_count: u32,
}

impl DataRequest {
    pub fn new(category: DataCategory, key: &str) -> Self {
        Self {
            key: key.to_string(),
            category,
            sources: Vec::new(),
            force_refresh: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

/// Outcome of a single data manager request.
///
/// Provider-level failures never surface as errors; callers always get
/// a response value, failed or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse {
    pub payload: Option<Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub source_used: Option<DataSource>,
    pub quality: DataQuality,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl DataResponse {
    pub(crate) fn success(
        payload: Value,
        source: DataSource,
        quality: DataQuality,
        elapsed: Duration,
    ) -> Self {
        Self {
            payload: Some(payload),
            success: true,
            error_message: None,
            source_used: Some(source),
            quality,
            response_time_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn failure(message: String, elapsed: Duration) -> Self {
        Self {
            payload: None,
            success: false,
            error_message: Some(message),
            source_used: None,
            quality: DataQuality::Unknown,
            response_time_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }
}

/// Cache store counters plus derived utilization figures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub backups: u64,
    pub last_backup: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub memory_size: usize,
    pub max_memory_size: usize,
    pub memory_usage_percent: f64,
}

/// Data manager counters combined with a cache stats snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub fallbacks_used: u64,
    pub provider_requests: HashMap<DataSource, u64>,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = CacheEntry::new(
            "BTC_price",
            json!(50000.0),
            DataCategory::Crypto,
            None,
            DataSource::Binance,
            DataQuality::Good,
        );
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let live = CacheEntry::new(
            "k",
            json!(1),
            DataCategory::Stock,
            Some(60),
            DataSource::YahooFinance,
            DataQuality::Good,
        );
        assert!(!live.is_expired());

        let stale = CacheEntry::new(
            "k",
            json!(1),
            DataCategory::Stock,
            Some(-1),
            DataSource::YahooFinance,
            DataQuality::Good,
        );
        assert!(stale.is_expired());
    }

    #[test]
    fn test_entry_serde_round_trip() {
        let entry = CacheEntry::new(
            "stock_PETR4.SA",
            json!({"symbol": "PETR4.SA", "price": 38.2}),
            DataCategory::Stock,
            Some(300),
            DataSource::YahooFinance,
            DataQuality::Good,
        );
        let text = serde_json::to_string(&entry).unwrap();
        let parsed: CacheEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.key, entry.key);
        assert_eq!(parsed.payload, entry.payload);
        assert_eq!(parsed.category, DataCategory::Stock);
        assert_eq!(parsed.source, DataSource::YahooFinance);
        assert_eq!(parsed.expires_at, entry.expires_at);
    }

    #[test]
    fn test_enum_wire_format() {
        assert_eq!(
            serde_json::to_string(&DataSource::YahooFinance).unwrap(),
            "\"yahoo_finance\""
        );
        assert_eq!(
            serde_json::to_string(&DataQuality::Poor).unwrap(),
            "\"poor\""
        );
        assert_eq!(
            serde_json::to_string(&DataCategory::Crypto).unwrap(),
            "\"crypto\""
        );
    }
}
