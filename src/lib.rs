//! Tidemark: a crawl provider feeding a two-phase search index
//!
//! This crate implements the crawl side of a host indexing pipeline: a
//! breadth-first web crawler that fetches every eligible page exactly once,
//! a durable seen-URL ledger, and a genesis/stable index build protocol in
//! which a completed staging index is atomically promoted to serving.

pub mod config;
pub mod crawler;
pub mod index;
pub mod output;
pub mod provider;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tidemark operations
#[derive(Debug, Error)]
pub enum TidemarkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Promotion error: {0}")]
    Promotion(#[from] index::PromotionError),

    #[error("Provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid link pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Tidemark operations
pub type Result<T> = std::result::Result<T, TidemarkError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{AppConfig, CrawlConfig};
pub use provider::{CrawlerProvider, DataProvider, DispatchType, RuntimeContext};
pub use state::{ProviderState, RunState, SeenStatus};
pub use url::{normalize_for_crawl, LinkFilter};
