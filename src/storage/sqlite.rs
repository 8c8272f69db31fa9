//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ledger traits.

use crate::state::SeenStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SeenStore, Storage, StorageError, StorageResult};
use crate::storage::{FailureRecord, FrontierRecord, RunCounts, RunRecord, RunStatus, SeenRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, context, dispatch_type, entry_url, config_hash, status,
     started_at, finished_at, accepted_count, rejected_count, failed_count";

/// SQLite ledger backend, scoped to one context
pub struct SqliteStorage {
    conn: Connection,
    context: String,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `context` - Context name every query is scoped to
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path, context: &str) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            context: context.to_string(),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory(context: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            context: context.to_string(),
        })
    }
}

fn frontier_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierRecord> {
    Ok(FrontierRecord {
        url: row.get(0)?,
        depth: row.get(1)?,
        origin: row.get(2)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        context: row.get(1)?,
        dispatch_type: row.get(2)?,
        entry_url: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Aborted),
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        counts: RunCounts {
            accepted: row.get::<_, i64>(8)? as u64,
            rejected: row.get::<_, i64>(9)? as u64,
            failed: row.get::<_, i64>(10)? as u64,
        },
    })
}

impl SeenStore for SqliteStorage {
    fn is_seen(&self, url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM seen_urls WHERE context = ?1 AND url = ?2",
                params![self.context, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn seen_record(&self, url: &str) -> StorageResult<Option<SeenRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT url, status, reason, marked_at FROM seen_urls
                 WHERE context = ?1 AND url = ?2",
                params![self.context, url],
                |row| {
                    let status: String = row.get(1)?;
                    Ok((row.get(0)?, status, row.get(2)?, row.get(3)?))
                },
            )
            .optional()?;

        record
            .map(|(url, status, reason, marked_at)| {
                let status = SeenStatus::from_db_string(&status).ok_or_else(|| {
                    StorageError::Database(format!("Unknown seen status '{}'", status))
                })?;
                Ok(SeenRecord {
                    url,
                    status,
                    reason,
                    marked_at,
                })
            })
            .transpose()
    }

    fn mark_seen(
        &mut self,
        url: &str,
        status: SeenStatus,
        reason: Option<&str>,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO seen_urls (context, url, status, reason, marked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.context, url, status.to_db_string(), reason, now],
        )?;
        Ok(inserted == 1)
    }

    fn reset(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM seen_urls WHERE context = ?1",
            params![self.context],
        )?;
        tx.execute("DELETE FROM frontier WHERE context = ?1", params![self.context])?;
        tx.commit()?;
        Ok(())
    }

    fn cached_rejection(&self, url: &str) -> StorageResult<Option<String>> {
        let reason = self
            .conn
            .query_row(
                "SELECT reason FROM filter_rejections WHERE context = ?1 AND url = ?2",
                params![self.context, url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(reason)
    }

    fn record_rejection(&mut self, url: &str, reason: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO filter_rejections (context, url, reason, rejected_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.context, url, reason, now],
        )?;
        Ok(())
    }

    fn reset_filter_store(&mut self) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM filter_rejections WHERE context = ?1",
            params![self.context],
        )?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        dispatch_type: &str,
        entry_url: &str,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (context, dispatch_type, entry_url, config_hash, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.context,
                dispatch_type,
                entry_url,
                config_hash,
                RunStatus::Running.to_db_string(),
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM runs WHERE context = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![self.context],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs WHERE context = ?1 ORDER BY id DESC LIMIT ?2",
            RUN_COLUMNS
        ))?;

        let runs = stmt
            .query_map(params![self.context, limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: RunCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, accepted_count = ?3,
             rejected_count = ?4, failed_count = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                counts.accepted as i64,
                counts.rejected as i64,
                counts.failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn reset_running_runs(&mut self) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE context = ?3 AND status = ?4",
            params![
                RunStatus::Reset.to_db_string(),
                now,
                self.context,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    // ===== Frontier Management =====

    fn push_frontier(&mut self, entry: &FrontierRecord) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO frontier (context, url, depth, origin) VALUES (?1, ?2, ?3, ?4)",
            params![self.context, entry.url, entry.depth, entry.origin],
        )?;
        Ok(inserted == 1)
    }

    fn mark_in_flight(&mut self, url: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET in_flight = 1 WHERE context = ?1 AND url = ?2",
            params![self.context, url],
        )?;
        Ok(())
    }

    fn remove_from_frontier(&mut self, url: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM frontier WHERE context = ?1 AND url = ?2",
            params![self.context, url],
        )?;
        Ok(())
    }

    fn in_flight_frontier(&self) -> StorageResult<Vec<FrontierRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, depth, origin FROM frontier
             WHERE context = ?1 AND in_flight = 1 ORDER BY seq",
        )?;

        let entries = stmt
            .query_map(params![self.context], frontier_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn load_frontier(&mut self) -> StorageResult<Vec<FrontierRecord>> {
        let requeued = self.conn.execute(
            "UPDATE frontier SET in_flight = 0 WHERE context = ?1 AND in_flight = 1",
            params![self.context],
        )?;
        if requeued > 0 {
            tracing::info!("Re-queued {} URLs that were in flight", requeued);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT url, depth, origin FROM frontier WHERE context = ?1 ORDER BY seq")?;

        let entries = stmt
            .query_map(params![self.context], frontier_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    // ===== Failure Tracking =====

    fn record_failure(
        &mut self,
        run_id: i64,
        url: &str,
        kind: &str,
        error: &str,
        attempts: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO fetch_failures (run_id, url, kind, error, attempts, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, url, kind, error, attempts, now],
        )?;
        Ok(())
    }

    fn get_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, url, kind, error, attempts, failed_at FROM fetch_failures
             WHERE run_id = ?1 ORDER BY id",
        )?;

        let failures = stmt
            .query_map(params![run_id], |row| {
                Ok(FailureRecord {
                    run_id: row.get(0)?,
                    url: row.get(1)?,
                    kind: row.get(2)?,
                    error: row.get(3)?,
                    attempts: row.get(4)?,
                    failed_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(failures)
    }

    // ===== Statistics =====

    fn count_seen(&self, status: SeenStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM seen_urls WHERE context = ?1 AND status = ?2",
            params![self.context, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_frontier(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE context = ?1",
            params![self.context],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_filter_rejections(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM filter_rejections WHERE context = ?1",
            params![self.context],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_rejection_summary(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(reason, 'unknown'), COUNT(*) FROM seen_urls
             WHERE context = ?1 AND status = ?2 GROUP BY 1",
        )?;

        let rows = stmt.query_map(
            params![self.context, SeenStatus::Rejected.to_db_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;

        let mut summary = HashMap::new();
        for row in rows {
            let (reason, count) = row?;
            summary.insert(reason, count as u64);
        }

        Ok(summary)
    }
}
