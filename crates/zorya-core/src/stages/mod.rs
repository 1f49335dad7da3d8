//! Stage actions.
//!
//! Each action works on a record the engine has already claimed and mutates
//! only the in-memory copy; the engine persists it together with the end
//! status. Actions are re-entrant: outputs are written under temporary names
//! and renamed into place, and a missing input whose output already exists
//! counts as done.

mod archive;
mod deliver;
mod discover;
mod fetch;
mod package;
mod rights;

use crate::{CoreError, Pipeline};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use zorya_schema::{BagId, Stage};
use zorya_store::{partial_path, BagRecord, RollbackStep, WorkAreas};

pub(crate) fn run(pipeline: &Pipeline, stage: Stage, record: &mut BagRecord) -> Result<(), CoreError> {
    match stage {
        Stage::Fetch => fetch::run(pipeline, record),
        Stage::Discover => discover::run(pipeline, record),
        Stage::Rights => rights::run(pipeline, record),
        Stage::Package => package::run(pipeline, record),
        Stage::Archive => archive::run(pipeline, record),
        Stage::Deliver => deliver::run(pipeline, record),
    }
}

/// Journaled cleanup of scratch output a stage may leave behind when killed.
pub(crate) fn scratch_paths(stage: Stage, areas: &WorkAreas, id: &BagId) -> Vec<RollbackStep> {
    match stage {
        Stage::Discover => vec![RollbackStep::RemoveDir(areas.unpack_path(id))],
        Stage::Package => vec![RollbackStep::RemoveFile(partial_path(
            &areas.package_archive(id),
        ))],
        Stage::Archive => vec![RollbackStep::RemoveFile(partial_path(&areas.archive_path(id)))],
        Stage::Fetch | Stage::Rights | Stage::Deliver => Vec::new(),
    }
}

/// Artifact cleanup for stages whose failed bags are dropped.
pub(crate) fn discard(pipeline: &Pipeline, stage: Stage, record: &BagRecord) -> Result<(), CoreError> {
    match stage {
        Stage::Fetch => fetch::discard(pipeline, record),
        Stage::Discover => discover::discard(pipeline, record),
        _ => Ok(()),
    }
}

fn incomplete(record: &BagRecord, what: impl Into<String>) -> CoreError {
    CoreError::Incomplete(record.identifier.to_string(), what.into())
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Overwrite `path` with `content` and sync it to disk.
fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}
