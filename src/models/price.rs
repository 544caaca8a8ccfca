// Typed payload shapes for the convenience getters. The cache itself
// stores opaque JSON values; these are the shapes well-behaved price
// providers produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DataQuality, DataSource};

fn default_currency() -> String {
    "USD".to_string()
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Price snapshot for a single asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub symbol: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: DataSource,
    #[serde(default)]
    pub quality: DataQuality,

    #[serde(default)]
    pub change_24h: Option<f64>,
    #[serde(default)]
    pub change_percent_24h: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub open_price: Option<f64>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Conversion rate between two currencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    #[serde(default = "default_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: DataSource,
    #[serde(default)]
    pub quality: DataQuality,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
