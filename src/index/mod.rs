//! Search index module
//!
//! This module implements the two-phase index build:
//! - A genesis generation is filled by a single writer during a crawl
//! - A completed run finalizes it
//! - Promotion atomically swaps the stable pointer to it
//!
//! The index storage is a SQLite database per index name, living at
//! `<directory>/<database_name>.sqlite`.

mod emitter;
mod promotion;
mod schema;
mod sqlite;
mod traits;

pub use emitter::{DocumentEmitter, GenesisOutcome};
pub use promotion::promote;
pub use sqlite::SqliteIndex;
pub use traits::{IndexBackend, IndexError, IndexResult, PromotionError};

use crate::crawler::{FetchedDocument, ParsedPage};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extension of index databases
pub const INDEX_EXTENSION: &str = "sqlite";

/// Path of the database holding index `database_name`
pub fn index_path(directory: &Path, database_name: &str) -> PathBuf {
    directory.join(format!("{}.{}", database_name, INDEX_EXTENSION))
}

/// Lifecycle state of an index generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationState {
    Building,
    Finalized,
    Stable,
    Retired,
    Discarded,
}

impl GenerationState {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Finalized => "finalized",
            Self::Stable => "stable",
            Self::Retired => "retired",
            Self::Discarded => "discarded",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "building" => Some(Self::Building),
            "finalized" => Some(Self::Finalized),
            "stable" => Some(Self::Stable),
            "retired" => Some(Self::Retired),
            "discarded" => Some(Self::Discarded),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Represents an index generation
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub id: i64,
    pub state: GenerationState,
    pub label: String,
    pub document_count: u64,
    pub created_at: String,
    pub finalized_at: Option<String>,
    pub promoted_at: Option<String>,
    pub retired_at: Option<String>,
}

/// Document record handed to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    pub url: String,
    pub mime: String,
    pub size: u64,
    pub depth: u32,
    pub title: Option<String>,
    pub text: String,
    pub content: Vec<u8>,
}

impl IndexDocument {
    /// Builds the index record for an accepted page
    pub fn from_fetched(document: FetchedDocument, parsed: &ParsedPage) -> Self {
        Self {
            url: document.url.to_string(),
            mime: document.mime,
            size: document.size,
            depth: document.depth,
            title: parsed.title.clone(),
            text: parsed.text.clone(),
            content: document.content,
        }
    }
}

/// Document as read back from a generation
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub generation_id: i64,
    pub url: String,
    pub mime: String,
    pub size: u64,
    pub depth: u32,
    pub title: Option<String>,
    pub text: String,
}

/// Accepted page read back from a building generation
#[derive(Debug, Clone)]
pub struct RecoveredPage {
    pub url: String,
    pub mime: String,
    pub depth: u32,
    pub content: Vec<u8>,
}

/// Outcome of a successful promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionReport {
    /// Generation now serving
    pub promoted: i64,
    /// Previously stable generation, now retired
    pub retired: Option<i64>,
    /// Older finalized generations superseded by the promoted one
    pub superseded: Vec<i64>,
    pub document_count: u64,
}

/// Index summary for the stats command
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub stable_generation: Option<i64>,
    pub stable_documents: u64,
    pub building: u64,
    pub finalized: u64,
    pub retired: u64,
    pub discarded: u64,
}
