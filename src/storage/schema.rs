//! Database schema definitions for the crawl ledger
//!
//! Every table except `runs` history is keyed by the provider context, so
//! several contexts can share one ledger file without seeing each other.

/// SQL schema for the ledger database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    context TEXT NOT NULL,
    dispatch_type TEXT NOT NULL,
    entry_url TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    accepted_count INTEGER NOT NULL DEFAULT 0,
    rejected_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_context ON runs(context, id);

-- Dedup ledger: one row per URL decided on in the current run
CREATE TABLE IF NOT EXISTS seen_urls (
    context TEXT NOT NULL,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    reason TEXT,
    marked_at TEXT NOT NULL,
    PRIMARY KEY (context, url)
);

CREATE INDEX IF NOT EXISTS idx_seen_status ON seen_urls(context, status);

-- Memoized filter rejections, keyed by the candidate link as discovered
CREATE TABLE IF NOT EXISTS filter_rejections (
    context TEXT NOT NULL,
    url TEXT NOT NULL,
    reason TEXT NOT NULL,
    rejected_at TEXT NOT NULL,
    PRIMARY KEY (context, url)
);

-- Crawl frontier queue, FIFO by seq
CREATE TABLE IF NOT EXISTS frontier (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    context TEXT NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    origin TEXT,
    in_flight INTEGER NOT NULL DEFAULT 0,
    UNIQUE (context, url)
);

CREATE INDEX IF NOT EXISTS idx_frontier_context ON frontier(context, seq);

-- Fetch failures demoted to rejections
CREATE TABLE IF NOT EXISTS fetch_failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    error TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    failed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fetch_failures_run ON fetch_failures(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "runs",
            "seen_urls",
            "filter_rejections",
            "frontier",
            "fetch_failures",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
