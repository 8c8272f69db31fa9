//! Storage module for the crawl ledger
//!
//! This module handles all ledger database operations, including:
//! - SQLite database initialization and schema management
//! - The seen-URL dedup ledger and the filter-rejection memo
//! - Frontier persistence for crash resume
//! - Run history and fetch failure tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{SeenStore, Storage, StorageError, StorageResult};

use crate::state::SeenStatus;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Ledger handle shared between the provider and the crawl coordinator
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (or creates) the ledger for a context
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
/// * `context` - Context name scoping every row
pub fn open_storage(path: &Path, context: &str) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path, context)
}

/// Locks a shared ledger, mapping a poisoned lock to a storage error
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

/// Represents a seen-URL ledger entry
#[derive(Debug, Clone)]
pub struct SeenRecord {
    pub url: String,
    pub status: SeenStatus,
    pub reason: Option<String>,
    pub marked_at: String,
}

/// Represents a persisted frontier entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierRecord {
    pub url: String,
    pub depth: u32,
    pub origin: Option<String>,
}

/// Represents a recorded fetch failure
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub run_id: i64,
    pub url: String,
    pub kind: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub context: String,
    pub dispatch_type: String,
    pub entry_url: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub counts: RunCounts,
}

/// Final counters stored on a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    /// Interrupted run whose ledger was cleared instead of resumed
    Reset,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Reset => "reset",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}
