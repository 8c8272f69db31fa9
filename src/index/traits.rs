//! Index backend trait and error types

use crate::index::{GenerationRecord, IndexDocument, IndexStats, PromotionReport, StoredDocument};
use thiserror::Error;

/// Errors raised while building or reading an index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generation {id} is {state}, expected {expected}")]
    InvalidGeneration {
        id: i64,
        state: String,
        expected: &'static str,
    },

    #[error("Generation not found: {0}")]
    GenerationNotFound(i64),

    #[error("Index writer is no longer running")]
    WriterClosed,
}

/// Errors raised by genesis-to-stable promotion
///
/// On any of these the stable pointer is unchanged.
#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("No finalized genesis index for '{0}'")]
    NoGenesis(String),

    #[error("Invalid database name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<rusqlite::Error> for PromotionError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Index(IndexError::Sqlite(e))
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Storage behind the genesis/stable index protocol
///
/// A generation moves `building -> finalized -> stable -> retired`, or to
/// `discarded` from `building`/`finalized`. Only one writer appends to a
/// building generation; readers only ever see the stable one.
pub trait IndexBackend: Send {
    /// Opens the genesis generation for a new run
    ///
    /// With `resume`, an existing building generation is reused; otherwise
    /// leftover building generations are discarded and a fresh one created.
    fn open_genesis(&mut self, label: &str, resume: bool) -> IndexResult<i64>;

    /// Appends a document to a building generation
    fn append(&mut self, generation: i64, document: &IndexDocument) -> IndexResult<()>;

    /// Seals a building generation so it can be promoted
    fn finalize(&mut self, generation: i64) -> IndexResult<()>;

    /// Drops a building or finalized generation and its documents
    fn discard(&mut self, generation: i64) -> IndexResult<()>;

    /// Swaps the stable pointer to the newest finalized generation
    fn promote(&mut self) -> Result<PromotionReport, PromotionError>;

    /// Gets the generation the stable pointer names
    fn stable_generation(&self) -> IndexResult<Option<GenerationRecord>>;

    /// Reads every document of the stable generation in one snapshot
    fn read_stable(&self) -> IndexResult<Vec<StoredDocument>>;

    /// Gets generations, newest first
    fn list_generations(&self) -> IndexResult<Vec<GenerationRecord>>;

    /// Summarizes the index
    fn stats(&self) -> IndexResult<IndexStats>;
}
