//! Configuration module for Tidemark
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and building the validated [`CrawlConfig`] a crawl run uses.
//!
//! # Example
//!
//! ```no_run
//! use tidemark::config::load_config;
//! use std::path::Path;
//!
//! let loaded = load_config(Path::new("tidemark.toml")).unwrap();
//! println!("Crawler will use max depth: {}", loaded.crawl.max_link_depth);
//! ```

mod crawl;
mod parser;
mod types;
mod validation;

// Re-export types
pub use crawl::CrawlConfig;
pub use types::{
    AppConfig, CrawlOptions, FetchConfig, IndexConfig, LedgerPolicy, ProviderConfig,
    CORE_INVALID_LINKS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config, LoadedConfig};
pub(crate) use validation::validate_name;
