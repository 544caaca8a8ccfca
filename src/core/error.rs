use thiserror::Error;

use crate::models::DataSource;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Configuration error: {0}")] Config(String),

    #[error("Cache error: {0}")] Cache(String),

    #[error("Corrupted cache record: {0}")] CacheCorruption(String),

    #[error("Provider {provider} failed: {reason}")] Provider {
        provider: DataSource,
        reason: String,
    },

    #[error("Provider {provider} returned an empty payload")] EmptyPayload {
        provider: DataSource,
    },

    #[error("Timeout error: operation timed out after {seconds} seconds")] Timeout {
        seconds: u64,
    },

    #[error("All providers failed for {key}")] AllProvidersFailed {
        key: String,
    },

    #[error("Serialization error: {0}")] Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),
}

impl DataError {
    /// Whether the fallback chain should keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DataError::Provider { .. } => true,
            DataError::EmptyPayload { .. } => true,
            DataError::Timeout { .. } => true,
            DataError::CacheCorruption(_) => true,
            DataError::Cache(_) => true,
            _ => false,
        }
    }
}

pub type DataResult<T> = Result<T, DataError>;
