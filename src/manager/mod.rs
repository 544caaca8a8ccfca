// Central data manager: cache-first lookup, ordered provider fallback,
// synthetic placeholders when every source is down, and bounded
// parallel multi-key fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, Instant };

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{ json, Value };
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::cache::CacheStore;
use crate::core::config::DataConfig;
use crate::core::constants::{ FALLBACK_TTL_SECS, SHUTDOWN_GRACE_SECS };
use crate::core::error::{ DataError, DataResult };
use crate::models::{
    DataCategory,
    DataQuality,
    DataRequest,
    DataResponse,
    DataSource,
    ExchangeRate,
    ManagerStats,
    PriceData,
};
use crate::providers::{ DataProvider, ProviderRegistry };

#[derive(Debug, Default)]
struct ManagerCounters {
    requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    errors: u64,
    fallbacks_used: u64,
    provider_requests: HashMap<DataSource, u64>,
}

/// Orchestrates providers, cache and fallback for keyed data requests.
///
/// Constructed explicitly by the application and passed to consumers;
/// cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct DataManager {
    config: DataConfig,
    cache: Arc<CacheStore>,
    registry: ProviderRegistry,
    semaphore: Arc<Semaphore>,
    stats: Arc<Mutex<ManagerCounters>>,
}

impl DataManager {
    /// Build the manager and its cache store, and start cache
    /// maintenance. Must be called from within a tokio runtime.
    /// Configuration problems are the only hard failure.
    pub fn new(config: DataConfig) -> DataResult<Self> {
        config.validate()?;

        let cache = Arc::new(CacheStore::new(config.cache.clone())?);
        Arc::clone(&cache).start_maintenance();

        let manager = Self {
            semaphore: Arc::new(Semaphore::new(config.max_workers)),
            config,
            cache,
            registry: ProviderRegistry::new(),
            stats: Arc::new(Mutex::new(ManagerCounters::default())),
        };

        log::info!("Data manager initialized");
        Ok(manager)
    }

    /// Append a provider to a category's fallback chain.
    pub fn register_provider(&self, category: DataCategory, provider: Arc<dyn DataProvider>) {
        self.registry.register(category, provider);
    }

    /// Resolve a keyed request: cache first, then the fallback chain.
    pub async fn get(&self, category: DataCategory, key: &str, force_refresh: bool) -> DataResponse {
        let mut request = DataRequest::new(category, key);
        request.force_refresh = force_refresh;
        request.timeout_secs = self.config.default_timeout_secs;
        request.retry_count = self.config.retry_count;
        self.get_with(&request).await
    }

    /// Same as [`get`](Self::get) but honoring the request's source
    /// preference, timeout and retry settings.
    pub async fn get_with(&self, request: &DataRequest) -> DataResponse {
        let started = Instant::now();
        let cache_key = Self::cache_key(request.category, &request.key);

        if !request.force_refresh {
            if let Some((payload, source, quality)) = self.cache.get_entry(&cache_key) {
                self.stats.lock().cache_hits += 1;
                log::debug!("Cache hit for {}", cache_key);
                return DataResponse::success(payload, source, quality, started.elapsed());
            }
        }

        {
            let mut stats = self.stats.lock();
            stats.cache_misses += 1;
            stats.requests += 1;
        }

        self.fetch_from_providers(request, &cache_key, started).await
    }

    /// Fetch several keys of one category through the bounded worker
    /// pool. Individual failures are logged, never fatal; whatever
    /// completes within the overall timeout is returned.
    pub async fn get_multiple(
        &self,
        category: DataCategory,
        keys: &[String],
        force_refresh: bool,
    ) -> HashMap<String, DataResponse> {
        let mut handles = Vec::with_capacity(keys.len());

        for key in keys {
            let manager = self.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let key_owned = key.clone();

            handles.push((
                key.clone(),
                tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return DataResponse::failure(
                                "worker pool closed".to_string(),
                                Duration::ZERO,
                            );
                        }
                    };
                    manager.get(category, &key_owned, force_refresh).await
                }),
            ));
        }

        let deadline =
            tokio::time::Instant::now() +
            Duration::from_secs(self.config.multi_fetch_timeout_secs);
        let mut results = HashMap::new();

        for (key, handle) in handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(response)) => {
                    if !response.success {
                        log::warn!("No data obtained for {}", key);
                    }
                    results.insert(key, response);
                }
                Ok(Err(e)) => log::error!("Fetch task for {} failed: {}", key, e),
                Err(_) => log::error!("Timed out waiting for {}", key),
            }
        }

        results
    }

    /// Manager counters plus a cache stats snapshot.
    pub fn stats(&self) -> ManagerStats {
        let counters = self.stats.lock();
        ManagerStats {
            requests: counters.requests,
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            errors: counters.errors,
            fallbacks_used: counters.fallbacks_used,
            provider_requests: counters.provider_requests.clone(),
            cache: self.cache.stats(),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Wait for in-flight workers, close the pool, shut the cache down.
    pub async fn shutdown(&self) {
        log::info!("Shutting down data manager...");

        let drained = timeout(
            Duration::from_secs(SHUTDOWN_GRACE_SECS),
            self.semaphore.acquire_many(self.config.max_workers as u32),
        ).await;
        match drained {
            Ok(Ok(permits)) => drop(permits),
            Ok(Err(_)) => {}
            Err(_) => log::warn!("Worker pool did not drain within {}s", SHUTDOWN_GRACE_SECS),
        }
        self.semaphore.close();

        self.cache.shutdown().await;
        log::info!("Data manager shut down");
    }

    // -- convenience getters over the generic operations ----------------

    pub async fn get_stock_price(&self, symbol: &str, force_refresh: bool) -> Option<PriceData> {
        let mut request = DataRequest::new(DataCategory::Stock, symbol);
        request.sources = vec![DataSource::YahooFinance];
        request.force_refresh = force_refresh;
        request.timeout_secs = self.config.default_timeout_secs;
        request.retry_count = self.config.retry_count;

        let response = self.get_with(&request).await;
        Self::decode_payload(response, symbol)
    }

    pub async fn get_crypto_price(&self, symbol: &str, force_refresh: bool) -> Option<PriceData> {
        let mut request = DataRequest::new(DataCategory::Crypto, symbol);
        request.sources = vec![DataSource::YahooFinance, DataSource::Binance];
        request.force_refresh = force_refresh;
        request.timeout_secs = self.config.default_timeout_secs;
        request.retry_count = self.config.retry_count;

        let response = self.get_with(&request).await;
        Self::decode_payload(response, symbol)
    }

    pub async fn get_exchange_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
        force_refresh: bool,
    ) -> Option<ExchangeRate> {
        let pair = format!("{}_{}", from_currency, to_currency);
        let mut request = DataRequest::new(DataCategory::Currency, &pair);
        request.sources = vec![DataSource::YahooFinance, DataSource::ExchangeRateApi];
        request.force_refresh = force_refresh;
        request.timeout_secs = self.config.default_timeout_secs;
        request.retry_count = self.config.retry_count;

        let response = self.get_with(&request).await;
        Self::decode_payload(response, &pair)
    }

    pub async fn get_fund_data(&self, fund_id: &str, force_refresh: bool) -> Option<Value> {
        let mut request = DataRequest::new(DataCategory::Fund, fund_id);
        request.sources = vec![DataSource::FundScraper];
        request.force_refresh = force_refresh;
        request.timeout_secs = self.config.default_timeout_secs;
        request.retry_count = self.config.retry_count;

        self.get_with(&request).await.payload
    }

    /// Prices for several stock symbols in parallel; symbols that
    /// yield no usable data are skipped.
    pub async fn get_multiple_stocks(
        &self,
        symbols: &[String],
        force_refresh: bool,
    ) -> HashMap<String, PriceData> {
        let responses = self.get_multiple(DataCategory::Stock, symbols, force_refresh).await;

        let mut prices = HashMap::new();
        for (symbol, response) in responses {
            if let Some(price) = Self::decode_payload::<PriceData>(response, &symbol) {
                prices.insert(symbol, price);
            }
        }
        prices
    }

    // -- internals -------------------------------------------------------

    fn cache_key(category: DataCategory, key: &str) -> String {
        format!("{}_{}", category.as_str(), key)
    }

    async fn fetch_from_providers(
        &self,
        request: &DataRequest,
        cache_key: &str,
        started: Instant,
    ) -> DataResponse {
        let providers = self.registry.chain_for(request.category, &request.sources);
        if providers.is_empty() {
            log::warn!("No providers available for {}", request.category);
        }

        for provider in providers {
            let source = provider.id();
            {
                let mut stats = self.stats.lock();
                *stats.provider_requests.entry(source).or_insert(0) += 1;
            }
            log::debug!("Trying {} for {}", source, request.key);

            let attempt = timeout(
                Duration::from_secs(request.timeout_secs),
                provider.fetch(&request.key, request.category),
            ).await;

            match attempt {
                Ok(Ok(payload)) if !payload.is_null() => {
                    let quality = provider.quality();
                    let ttl = self.config.expiration.ttl_for(request.category);
                    self.cache.set(
                        cache_key,
                        payload.clone(),
                        request.category,
                        Some(ttl),
                        source,
                        quality,
                    );
                    log::debug!(
                        "{} answered for {} in {}ms",
                        source,
                        request.key,
                        started.elapsed().as_millis()
                    );
                    return DataResponse::success(payload, source, quality, started.elapsed());
                }
                Ok(Ok(_)) => {
                    log::warn!("{} returned an empty payload for {}", source, request.key);
                }
                Ok(Err(e)) => {
                    log::warn!("{} failed for {}: {}", source, request.key, e);
                }
                Err(_) => {
                    log::warn!(
                        "{} timed out after {}s for {}",
                        source,
                        request.timeout_secs,
                        request.key
                    );
                }
            }
        }

        log::error!("All providers failed for {}", request.key);
        self.try_fallback(request, cache_key, started)
    }

    fn try_fallback(
        &self,
        request: &DataRequest,
        cache_key: &str,
        started: Instant,
    ) -> DataResponse {
        if self.config.fallback.enabled && self.config.fallback.use_simulated_data {
            if let Some(payload) = simulated_payload(request.category, &request.key) {
                log::info!("Using simulated data for {}", request.key);
                self.cache.set(
                    cache_key,
                    payload.clone(),
                    request.category,
                    Some(FALLBACK_TTL_SECS),
                    DataSource::Simulated,
                    DataQuality::Poor,
                );
                self.stats.lock().fallbacks_used += 1;
                return DataResponse::success(
                    payload,
                    DataSource::Simulated,
                    DataQuality::Poor,
                    started.elapsed(),
                );
            }
        }

        self.stats.lock().errors += 1;
        DataResponse::failure(
            DataError::AllProvidersFailed { key: request.key.clone() }.to_string(),
            started.elapsed(),
        )
    }

    fn decode_payload<T: DeserializeOwned>(response: DataResponse, key: &str) -> Option<T> {
        let payload = response.payload?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Unexpected payload shape for {}: {}", key, e);
                None
            }
        }
    }
}

/// Placeholder payload for categories where a rough number is better
/// than nothing. Other categories get no synthetic data.
fn simulated_payload(category: DataCategory, key: &str) -> Option<Value> {
    let (price, currency) = match category {
        DataCategory::Stock => (50.0, "BRL"),
        DataCategory::Crypto => (50000.0, "USD"),
        _ => {
            return None;
        }
    };

    Some(
        json!({
            "symbol": key,
            "price": price,
            "currency": currency,
            "source": DataSource::Simulated,
            "quality": DataQuality::Poor,
            "timestamp": Utc::now(),
            "metadata": { "simulated": true },
        })
    )
}
