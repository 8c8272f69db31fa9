//! URL handling module for Tidemark
//!
//! This module provides crawl-key normalization, host scoping, link pattern
//! compilation and the link eligibility filter.

mod filter;
mod host;
mod normalize;
mod pattern;

// Re-export main functions
pub use filter::{LinkFilter, Rejection};
pub use host::{extract_host, host_in_scope};
pub use normalize::{normalize_for_crawl, normalize_parsed};
pub use pattern::compile_pattern;
