//! Data provider module
//!
//! The provider is the adapter the host pipeline drives. It validates the
//! runtime context, owns the lifecycle state machine and resets the crawl
//! ledger on warm-up and on every shutdown path.

mod context;
mod lifecycle;

pub use context::{DispatchType, RuntimeContext, PATH_KEY};
pub use lifecycle::{CrawlerProvider, DataProvider, RunReport};

use crate::crawler::CrawlError;
use crate::index::{IndexError, PromotionError};
use crate::state::ProviderState;
use crate::storage::StorageError;
use crate::ConfigError;
use thiserror::Error;

/// Errors raised by the provider lifecycle
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Runtime options validation failed: {0}")]
    RuntimeValidation(String),

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: ProviderState,
        to: ProviderState,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Promotion error: {0}")]
    Promotion(#[from] PromotionError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
