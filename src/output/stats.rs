//! Statistics from the crawl ledger and the index
//!
//! This module provides functionality for extracting and displaying
//! ledger and index statistics for the `stats` command.

use crate::index::{IndexBackend, IndexStats};
use crate::state::SeenStatus;
use crate::storage::{RunRecord, Storage};
use crate::TidemarkError;
use std::collections::HashMap;

/// How many recent runs are listed
const RECENT_RUNS: usize = 5;

/// Ledger and index statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Context the ledger rows belong to
    pub context: String,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,

    /// URLs accepted in the current ledger
    pub accepted: u64,

    /// URLs rejected in the current ledger
    pub rejected: u64,

    /// URLs still queued
    pub frontier: u64,

    /// Memoized filter rejections
    pub filter_rejections: u64,

    /// Rejected URLs grouped by reason
    pub rejection_summary: HashMap<String, u64>,

    /// Index summary, when the index database exists
    pub index: Option<IndexStats>,
}

/// Loads statistics from the ledger and, optionally, the index
///
/// # Arguments
///
/// * `context` - Context name the ledger is scoped to
/// * `storage` - The ledger to query
/// * `index` - The index backend, if one exists
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(TidemarkError)` - Failed to query statistics
pub fn load_statistics(
    context: &str,
    storage: &dyn Storage,
    index: Option<&dyn IndexBackend>,
) -> Result<CrawlStatistics, TidemarkError> {
    let index = match index {
        Some(index) => Some(index.stats()?),
        None => None,
    };

    Ok(CrawlStatistics {
        context: context.to_string(),
        recent_runs: storage.list_runs(RECENT_RUNS)?,
        accepted: storage.count_seen(SeenStatus::Accepted)?,
        rejected: storage.count_seen(SeenStatus::Rejected)?,
        frontier: storage.count_frontier()?,
        filter_rejections: storage.count_filter_rejections()?,
        rejection_summary: storage.get_rejection_summary()?,
        index,
    })
}

/// Duration of a finished run in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_ref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Tidemark Statistics ({}) ===\n", stats.context);

    println!("Ledger:");
    println!("  Accepted URLs: {}", stats.accepted);
    println!("  Rejected URLs: {}", stats.rejected);
    println!("  Queued in frontier: {}", stats.frontier);
    println!("  Memoized filter rejections: {}", stats.filter_rejections);
    println!();

    if !stats.rejection_summary.is_empty() {
        println!("Rejections by Reason:");
        let mut reasons: Vec<_> = stats.rejection_summary.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let total = stats.rejected.max(1);
        for (reason, count) in reasons {
            let percentage = (*count as f64 / total as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", reason, count, percentage);
        }
        println!();
    }

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            let duration = run_duration_seconds(run)
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  #{} {} {} [{}] accepted={} rejected={} failed={} duration={}",
                run.id,
                run.dispatch_type,
                run.entry_url,
                run.status.to_db_string(),
                run.counts.accepted,
                run.counts.rejected,
                run.counts.failed,
                duration
            );
        }
        println!();
    }

    match &stats.index {
        Some(index) => {
            println!("Index:");
            match index.stable_generation {
                Some(id) => println!(
                    "  Stable generation: {} ({} documents)",
                    id, index.stable_documents
                ),
                None => println!("  Stable generation: none"),
            }
            println!("  Building: {}", index.building);
            println!("  Finalized (awaiting promotion): {}", index.finalized);
            println!("  Retired: {}", index.retired);
            println!("  Discarded: {}", index.discarded);
        }
        None => println!("Index: not created yet"),
    }
}
