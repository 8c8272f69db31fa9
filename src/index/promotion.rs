//! Genesis-to-stable promotion

use crate::config::validate_name;
use crate::index::traits::{IndexBackend, PromotionError};
use crate::index::{index_path, PromotionReport, SqliteIndex};
use std::path::Path;

/// Promotes the newest finalized genesis of `database_name` to stable
///
/// Runs as one transaction: the stable pointer moves, the previous stable
/// generation is retired and its documents purged. On any error nothing
/// changes and the genesis stays available for a retry.
///
/// # Errors
///
/// * `PromotionError::InvalidName` - the name cannot be an index database
/// * `PromotionError::NoGenesis` - the index does not exist or holds no
///   finalized genesis
/// * `PromotionError::Index` - the database could not be read or written
pub fn promote(directory: &Path, database_name: &str) -> Result<PromotionReport, PromotionError> {
    validate_name("database-name", database_name)
        .map_err(|e| PromotionError::InvalidName(e.to_string()))?;

    let path = index_path(directory, database_name);
    if !path.exists() {
        return Err(PromotionError::NoGenesis(database_name.to_string()));
    }

    let mut index = SqliteIndex::open_path(&path, database_name)?;
    index.promote()
}
