//! Multi-tier financial data cache with provider fallback.
//!
//! Two pieces work together: a bounded, TTL-aware cache store with a
//! durable on-disk mirror and background maintenance, and a
//! [`manager::DataManager`] that resolves keyed requests cache-first,
//! walks an ordered chain of registered providers on a miss, and can
//! serve clearly-flagged simulated placeholders when every upstream
//! source is down.
//!
//! The cache store is internal; applications construct a
//! [`DataManager`], register [`DataProvider`] implementations per
//! [`models::DataCategory`], and go through its `get`/`get_multiple`
//! surface.

mod cache;

pub mod core;
pub mod manager;
pub mod models;
pub mod providers;

pub use crate::core::config::{ CacheSettings, DataConfig, ExpirationConfig, FallbackConfig };
pub use crate::core::error::{ DataError, DataResult };
pub use crate::manager::DataManager;
pub use crate::models::{
    CacheStats,
    DataCategory,
    DataQuality,
    DataRequest,
    DataResponse,
    DataSource,
    ExchangeRate,
    ManagerStats,
    PriceData,
};
pub use crate::providers::{ DataProvider, ProviderRegistry };
