//! Database schema for the search index
//!
//! One database per index name. Each crawl builds a generation; the
//! `stable` pointer names the generation currently serving reads.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    state TEXT NOT NULL,
    label TEXT NOT NULL,
    document_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    finalized_at TEXT,
    promoted_at TEXT,
    retired_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_generations_state ON generations(state, id);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    generation_id INTEGER NOT NULL REFERENCES generations(id),
    url TEXT NOT NULL,
    mime TEXT NOT NULL,
    size INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    title TEXT,
    text TEXT NOT NULL,
    content BLOB NOT NULL,
    indexed_at TEXT NOT NULL,
    UNIQUE (generation_id, url)
);

CREATE INDEX IF NOT EXISTS idx_documents_generation ON documents(generation_id);

-- Named pointers into generations; 'stable' is the serving index
CREATE TABLE IF NOT EXISTS index_pointers (
    name TEXT PRIMARY KEY,
    generation_id INTEGER NOT NULL REFERENCES generations(id)
);
"#;

pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
