//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - Frontier queueing and crawl-limit accounting
//! - Overall crawl coordination

mod backoff;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use backoff::ExponentialBackoff;
pub use coordinator::{Coordinator, CrawlError, RunOutcome};
pub use fetcher::{build_http_client, FetchError, FetchedDocument, Fetcher};
pub use parser::{parse_document, parse_html, ParsedPage};
pub use scheduler::{CrawlBudget, Frontier, FrontierEntry};
