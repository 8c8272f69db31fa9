//! Output module for reporting crawl and index state
//!
//! This module handles:
//! - Collecting ledger statistics (accepted, rejected, queued URLs)
//! - Summarizing index generations
//! - Printing both for the `stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, CrawlStatistics};
