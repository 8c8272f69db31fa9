//! SQLite index backend
//!
//! Generations share one database. Reads of the stable index go through the
//! `index_pointers` row in a single statement, so a reader sees either the
//! generation before a promotion or the one after it, never a mix.

use crate::index::schema::initialize_schema;
use crate::index::traits::{IndexBackend, IndexError, IndexResult, PromotionError};
use crate::index::{
    index_path, GenerationRecord, GenerationState, IndexDocument, IndexStats, PromotionReport,
    RecoveredPage, StoredDocument,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

const STABLE_POINTER: &str = "stable";

const GENERATION_COLUMNS: &str =
    "id, state, label, document_count, created_at, finalized_at, promoted_at, retired_at";

/// SQLite implementation of [`IndexBackend`]
pub struct SqliteIndex {
    conn: Connection,
    name: String,
}

impl SqliteIndex {
    /// Opens (or creates) the index `database_name` inside `directory`
    pub fn open(directory: &Path, database_name: &str) -> IndexResult<Self> {
        std::fs::create_dir_all(directory)?;
        Self::open_path(&index_path(directory, database_name), database_name)
    }

    /// Opens an index database at an explicit path
    pub fn open_path(path: &Path, name: &str) -> IndexResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            name: name.to_string(),
        })
    }

    /// Creates an in-memory index (for testing)
    #[cfg(test)]
    pub fn new_in_memory(name: &str) -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            name: name.to_string(),
        })
    }

    /// Gets a generation by ID
    pub fn get_generation(&self, id: i64) -> IndexResult<GenerationRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM generations WHERE id = ?1", GENERATION_COLUMNS),
                params![id],
                generation_from_row,
            )
            .optional()?
            .ok_or(IndexError::GenerationNotFound(id))
    }

    /// Counts documents stored for a generation
    pub fn count_documents(&self, generation: i64) -> IndexResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE generation_id = ?1",
            params![generation],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Reads back the page stored for `url` in `generation`, if any
    pub fn recovered_page(&self, generation: i64, url: &str) -> IndexResult<Option<RecoveredPage>> {
        let page = self
            .conn
            .query_row(
                "SELECT url, mime, depth, content FROM documents
                 WHERE generation_id = ?1 AND url = ?2",
                params![generation, url],
                |row| {
                    Ok(RecoveredPage {
                        url: row.get(0)?,
                        mime: row.get(1)?,
                        depth: row.get(2)?,
                        content: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(page)
    }

    fn expect_state(&self, id: i64, expected: GenerationState) -> IndexResult<()> {
        let generation = self.get_generation(id)?;
        if generation.state != expected {
            return Err(IndexError::InvalidGeneration {
                id,
                state: generation.state.to_string(),
                expected: expected.to_db_string(),
            });
        }
        Ok(())
    }
}

fn generation_from_row(row: &Row<'_>) -> rusqlite::Result<GenerationRecord> {
    let state: String = row.get(1)?;
    Ok(GenerationRecord {
        id: row.get(0)?,
        state: GenerationState::from_db_string(&state).unwrap_or(GenerationState::Discarded),
        label: row.get(2)?,
        document_count: row.get::<_, i64>(3)? as u64,
        created_at: row.get(4)?,
        finalized_at: row.get(5)?,
        promoted_at: row.get(6)?,
        retired_at: row.get(7)?,
    })
}

/// Moves a generation to `retired` or `discarded` and purges its documents
fn drop_generation(tx: &Transaction<'_>, id: i64, state: GenerationState) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE generations SET state = ?1, retired_at = ?2 WHERE id = ?3",
        params![state.to_db_string(), Utc::now().to_rfc3339(), id],
    )?;
    tx.execute("DELETE FROM documents WHERE generation_id = ?1", params![id])?;
    Ok(())
}

impl IndexBackend for SqliteIndex {
    fn open_genesis(&mut self, label: &str, resume: bool) -> IndexResult<i64> {
        let tx = self.conn.transaction()?;

        let building: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT id FROM generations WHERE state = ?1 ORDER BY id DESC")?;
            let ids = stmt
                .query_map(params![GenerationState::Building.to_db_string()], |row| {
                    row.get(0)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        if resume {
            if let Some(&newest) = building.first() {
                for &stale in &building[1..] {
                    drop_generation(&tx, stale, GenerationState::Discarded)?;
                }
                tx.commit()?;
                tracing::info!("Resuming genesis generation {} of '{}'", newest, self.name);
                return Ok(newest);
            }
        }

        for &stale in &building {
            drop_generation(&tx, stale, GenerationState::Discarded)?;
        }

        tx.execute(
            "INSERT INTO generations (state, label, created_at) VALUES (?1, ?2, ?3)",
            params![
                GenerationState::Building.to_db_string(),
                label,
                Utc::now().to_rfc3339()
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!("Opened genesis generation {} of '{}'", id, self.name);
        Ok(id)
    }

    fn append(&mut self, generation: i64, document: &IndexDocument) -> IndexResult<()> {
        let now = Utc::now().to_rfc3339();
        let written = self.conn.execute(
            "INSERT OR REPLACE INTO documents
             (generation_id, url, mime, size, depth, title, text, content, indexed_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
             WHERE EXISTS (SELECT 1 FROM generations WHERE id = ?1 AND state = ?10)",
            params![
                generation,
                document.url,
                document.mime,
                document.size as i64,
                document.depth,
                document.title,
                document.text,
                document.content,
                now,
                GenerationState::Building.to_db_string()
            ],
        )?;

        if written == 0 {
            self.expect_state(generation, GenerationState::Building)?;
        }
        Ok(())
    }

    fn finalize(&mut self, generation: i64) -> IndexResult<()> {
        self.expect_state(generation, GenerationState::Building)?;

        let count = self.count_documents(generation)?;
        self.conn.execute(
            "UPDATE generations SET state = ?1, document_count = ?2, finalized_at = ?3
             WHERE id = ?4",
            params![
                GenerationState::Finalized.to_db_string(),
                count as i64,
                Utc::now().to_rfc3339(),
                generation
            ],
        )?;

        tracing::info!(
            "Finalized genesis generation {} of '{}' with {} documents",
            generation,
            self.name,
            count
        );
        Ok(())
    }

    fn discard(&mut self, generation: i64) -> IndexResult<()> {
        let record = self.get_generation(generation)?;
        match record.state {
            GenerationState::Building | GenerationState::Finalized => {}
            GenerationState::Discarded => return Ok(()),
            other => {
                return Err(IndexError::InvalidGeneration {
                    id: generation,
                    state: other.to_string(),
                    expected: "building or finalized",
                })
            }
        }

        let tx = self.conn.transaction()?;
        drop_generation(&tx, generation, GenerationState::Discarded)?;
        tx.commit()?;

        tracing::warn!("Discarded genesis generation {} of '{}'", generation, self.name);
        Ok(())
    }

    fn promote(&mut self) -> Result<PromotionReport, PromotionError> {
        let tx = self.conn.transaction()?;

        let finalized: Vec<(i64, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT id, document_count FROM generations WHERE state = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map(params![GenerationState::Finalized.to_db_string()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let Some(&(promoted, document_count)) = finalized.first() else {
            return Err(PromotionError::NoGenesis(self.name.clone()));
        };

        let retired: Option<i64> = tx
            .query_row(
                "SELECT generation_id FROM index_pointers WHERE name = ?1",
                params![STABLE_POINTER],
                |row| row.get(0),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE generations SET state = ?1, promoted_at = ?2 WHERE id = ?3",
            params![GenerationState::Stable.to_db_string(), now, promoted],
        )?;
        tx.execute(
            "INSERT INTO index_pointers (name, generation_id) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET generation_id = excluded.generation_id",
            params![STABLE_POINTER, promoted],
        )?;

        if let Some(old) = retired {
            drop_generation(&tx, old, GenerationState::Retired)?;
        }

        let superseded: Vec<i64> = finalized[1..].iter().map(|(id, _)| *id).collect();
        for &id in &superseded {
            drop_generation(&tx, id, GenerationState::Discarded)?;
        }

        tx.commit()?;

        tracing::info!(
            "Promoted generation {} of '{}' to stable ({} documents)",
            promoted,
            self.name,
            document_count
        );

        Ok(PromotionReport {
            promoted,
            retired,
            superseded,
            document_count: document_count as u64,
        })
    }

    fn stable_generation(&self) -> IndexResult<Option<GenerationRecord>> {
        let generation = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM generations
                     WHERE id = (SELECT generation_id FROM index_pointers WHERE name = ?1)",
                    GENERATION_COLUMNS
                ),
                params![STABLE_POINTER],
                generation_from_row,
            )
            .optional()?;
        Ok(generation)
    }

    fn read_stable(&self) -> IndexResult<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.generation_id, d.url, d.mime, d.size, d.depth, d.title, d.text
             FROM documents d
             JOIN index_pointers p ON p.generation_id = d.generation_id
             WHERE p.name = ?1
             ORDER BY d.id",
        )?;

        let documents = stmt
            .query_map(params![STABLE_POINTER], |row| {
                Ok(StoredDocument {
                    generation_id: row.get(0)?,
                    url: row.get(1)?,
                    mime: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                    depth: row.get(4)?,
                    title: row.get(5)?,
                    text: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn list_generations(&self) -> IndexResult<Vec<GenerationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM generations ORDER BY id DESC",
            GENERATION_COLUMNS
        ))?;

        let generations = stmt
            .query_map([], generation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(generations)
    }

    fn stats(&self) -> IndexResult<IndexStats> {
        let mut stats = IndexStats::default();

        for generation in self.list_generations()? {
            match generation.state {
                GenerationState::Building => stats.building += 1,
                GenerationState::Finalized => stats.finalized += 1,
                GenerationState::Stable => {
                    stats.stable_generation = Some(generation.id);
                    stats.stable_documents = generation.document_count;
                }
                GenerationState::Retired => stats.retired += 1,
                GenerationState::Discarded => stats.discarded += 1,
            }
        }

        Ok(stats)
    }
}
