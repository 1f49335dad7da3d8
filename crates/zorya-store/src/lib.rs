//! Durable bag records, work areas, the claim journal, and packing for Zorya.
//!
//! This crate provides the storage layer: the file-backed `RecordStore` with
//! atomic writes and embedded blake3 checksums, `StoreLayout` and `WorkAreas`
//! for directory structure, the `WriteAheadLog` used to undo interrupted
//! claims, deterministic tar.gz packing (`pack_directory`, `unpack_archive`),
//! record verification, and the `WorkAreaPruner` for orphaned scratch data.

pub mod archive;
pub mod integrity;
pub mod layout;
pub mod prune;
pub mod records;
pub mod wal;

pub use archive::{archive_entries, pack_directory, partial_path, unpack_archive};
pub use integrity::{verify_store_integrity, IntegrityFailure, IntegrityReport};
pub use layout::{StoreLayout, WorkAreas, STORE_FORMAT_VERSION};
pub use prune::{PruneReport, WorkAreaPruner};
pub use records::{validate_identifier, BagRecord, RecordStore};
pub use wal::{RollbackStep, WalEntry, WriteAheadLog};

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives power loss until the parent
/// directory itself has been synced.
pub fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Write `content` to `dest` through a synced temp file in the same directory.
pub(crate) fn write_atomic(dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = dest
        .parent()
        .ok_or_else(|| StoreError::Io(std::io::Error::other("destination has no parent")))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for record '{identifier}': expected {expected}, got {actual}")]
    IntegrityFailure {
        identifier: String,
        expected: String,
        actual: String,
    },
    #[error("bag not found: {0}")]
    RecordNotFound(String),
    #[error("bag '{0}' already exists")]
    DuplicateRecord(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid bag identifier: {0}")]
    InvalidIdentifier(String),
    #[error("archive '{archive}' contains unsafe entry '{entry}'")]
    UnsafeEntry { archive: String, entry: String },
}
