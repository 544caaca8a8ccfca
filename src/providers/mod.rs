// Provider capability contract and the per-category registry.
//
// Concrete providers live outside this crate; they own their network
// I/O, parsing and rate limiting. Registration order per category
// encodes fallback preference.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::core::error::DataResult;
use crate::models::{ DataCategory, DataQuality, DataSource };

/// A single upstream data source: fetch a payload for a key.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Stable identity, used for fallback ordering and stats.
    fn id(&self) -> DataSource;

    /// Quality tag stamped on data this provider returns.
    fn quality(&self) -> DataQuality {
        DataQuality::Good
    }

    async fn fetch(&self, key: &str, category: DataCategory) -> DataResult<Value>;
}

/// Ordered provider lists per data category.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<DataCategory, Vec<Arc<dyn DataProvider>>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to a category's fallback chain.
    pub fn register(&self, category: DataCategory, provider: Arc<dyn DataProvider>) {
        log::info!("Registered provider {} for {}", provider.id(), category);
        self.providers.write().entry(category).or_default().push(provider);
    }

    /// The full chain for a category, in registration order.
    pub fn providers_for(&self, category: DataCategory) -> Vec<Arc<dyn DataProvider>> {
        self.providers.read().get(&category).cloned().unwrap_or_default()
    }

    /// Chain restricted and reordered by an explicit source preference;
    /// an empty preference means registration order.
    pub fn chain_for(
        &self,
        category: DataCategory,
        preferred: &[DataSource],
    ) -> Vec<Arc<dyn DataProvider>> {
        let registered = self.providers_for(category);
        if preferred.is_empty() {
            return registered;
        }

        preferred
            .iter()
            .filter_map(|source| {
                registered
                    .iter()
                    .find(|provider| provider.id() == *source)
                    .cloned()
            })
            .collect()
    }
}
