//! Storage traits and error types
//!
//! This module defines the trait interface for ledger backends and
//! associated error types.

use crate::state::SeenStatus;
use crate::storage::{FailureRecord, FrontierRecord, RunCounts, RunRecord, RunStatus, SeenRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Ledger lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Dedup ledger of URLs already decided on, plus the filter-rejection memo
///
/// Implementations are scoped to one context: two stores over the same
/// database with different contexts never observe each other's rows.
pub trait SeenStore {
    /// Checks whether a URL has been recorded with any status
    fn is_seen(&self, url: &str) -> StorageResult<bool>;

    /// Gets the ledger entry for a URL
    fn seen_record(&self, url: &str) -> StorageResult<Option<SeenRecord>>;

    /// Records a URL with the given status
    ///
    /// The first mark for a URL wins; later marks are ignored.
    ///
    /// # Returns
    ///
    /// `true` if this call created the entry, `false` if it already existed
    fn mark_seen(
        &mut self,
        url: &str,
        status: SeenStatus,
        reason: Option<&str>,
    ) -> StorageResult<bool>;

    /// Clears the seen ledger and the persisted frontier
    ///
    /// Idempotent: resetting an empty store succeeds and changes nothing.
    fn reset(&mut self) -> StorageResult<()>;

    /// Gets the memoized rejection reason for a candidate link
    fn cached_rejection(&self, url: &str) -> StorageResult<Option<String>>;

    /// Memoizes a filter rejection so the candidate is not re-evaluated
    fn record_rejection(&mut self, url: &str, reason: &str) -> StorageResult<()>;

    /// Clears the filter-rejection memo. Idempotent.
    fn reset_filter_store(&mut self) -> StorageResult<()>;
}

/// Full ledger: seen store plus run history, frontier and failure tracking
pub trait Storage: SeenStore {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `dispatch_type` - INSERT or UPDATE, as recorded text
    /// * `entry_url` - URL the crawl starts from
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(
        &mut self,
        dispatch_type: &str,
        entry_url: &str,
        config_hash: &str,
    ) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of this context
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Gets up to `limit` most recent runs of this context, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Closes a run with a terminal status and its final counters
    fn finish_run(&mut self, run_id: i64, status: RunStatus, counts: RunCounts)
        -> StorageResult<()>;

    /// Marks every `running` run of this context as reset
    fn reset_running_runs(&mut self) -> StorageResult<usize>;

    // ===== Frontier Management =====

    /// Appends an entry to the persisted frontier
    ///
    /// # Returns
    ///
    /// `false` if the URL was already queued
    fn push_frontier(&mut self, entry: &FrontierRecord) -> StorageResult<bool>;

    /// Flags a queued URL as being fetched
    fn mark_in_flight(&mut self, url: &str) -> StorageResult<()>;

    /// Removes a processed URL from the frontier
    fn remove_from_frontier(&mut self, url: &str) -> StorageResult<()>;

    /// Entries that were handed to a fetcher and never settled
    fn in_flight_frontier(&self) -> StorageResult<Vec<FrontierRecord>>;

    /// Loads the frontier in FIFO order, re-queueing in-flight entries
    fn load_frontier(&mut self) -> StorageResult<Vec<FrontierRecord>>;

    // ===== Failure Tracking =====

    /// Records a fetch failure that was demoted to a rejection
    fn record_failure(
        &mut self,
        run_id: i64,
        url: &str,
        kind: &str,
        error: &str,
        attempts: u32,
    ) -> StorageResult<()>;

    /// Gets all failures recorded for a run
    fn get_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;

    // ===== Statistics =====

    /// Counts ledger entries with a status
    fn count_seen(&self, status: SeenStatus) -> StorageResult<u64>;

    /// Counts queued frontier entries
    fn count_frontier(&self) -> StorageResult<u64>;

    /// Counts memoized filter rejections
    fn count_filter_rejections(&self) -> StorageResult<u64>;

    /// Gets rejected entries grouped by reason
    fn get_rejection_summary(&self) -> StorageResult<HashMap<String, u64>>;
}
