pub mod config;
pub mod constants;
pub mod error;

pub use config::{ CacheSettings, DataConfig, ExpirationConfig, FallbackConfig };
pub use error::{ DataError, DataResult };
