use super::{incomplete, remove_dir_if_exists};
use crate::validate::bag_root;
use crate::{CoreError, Pipeline};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use zorya_schema::match_expected_name;
use zorya_store::{fsync_dir, unpack_archive, BagRecord};

/// Unpack, validate and adopt a landed archive as `<working>/bags/<id>`.
pub(super) fn run(pipeline: &Pipeline, record: &mut BagRecord) -> Result<(), CoreError> {
    let areas = pipeline.areas();
    let validator = &pipeline.services().validator;
    let id = record.identifier.clone();
    let archive = areas.inbox_path(&record.original_name);
    let bag_dir = areas.bag_path(&id);

    if !archive.is_file() {
        // An earlier run adopted the bag but died before recording it.
        if bag_dir.is_dir() {
            debug!("{id}: archive already consumed, re-reading {}", bag_dir.display());
            let metadata = validator.validate_metadata(&bag_dir)?;
            record.apply(metadata.into_update());
            record.local_path = Some(bag_dir);
            return Ok(());
        }
        return Err(incomplete(
            record,
            format!("inbox archive {} is missing", archive.display()),
        ));
    }

    let format = match_expected_name(&record.original_name)
        .map(|m| m.format)
        .ok_or_else(|| {
            incomplete(
                record,
                format!("'{}' is not a recognised archive name", record.original_name),
            )
        })?;

    remove_dir_if_exists(&bag_dir)?;
    let unpack = areas.unpack_path(&id);
    remove_dir_if_exists(&unpack)?;
    unpack_archive(&archive, format, &unpack)?;

    let root = bag_root(&unpack)?;
    validator.validate_structure(&root)?;
    let metadata = validator.validate_metadata(&root)?;
    debug!(
        "{id}: {} bag under profile {}",
        metadata.origin, metadata.profile_identifier
    );

    fs::rename(&root, &bag_dir)?;
    fsync_dir(&areas.bags_dir())?;
    record.apply(metadata.into_update());
    record.local_path = Some(bag_dir);

    fs::remove_file(&archive)?;
    remove_dir_if_exists(&unpack)?;
    info!("{id}: adopted {}", record.original_name);
    Ok(())
}

/// Drop the extraction and quarantine the bag under `<working>/rejected/`.
///
/// The inbox archive is moved there when it still exists. Once it has been
/// consumed the adopted bag directory is the only copy, so that directory is
/// moved instead.
pub(super) fn discard(pipeline: &Pipeline, record: &BagRecord) -> Result<(), CoreError> {
    let areas = pipeline.areas();
    remove_dir_if_exists(&areas.unpack_path(&record.identifier))?;

    let archive = areas.inbox_path(&record.original_name);
    let bag_dir = areas.bag_path(&record.identifier);
    let source = if archive.is_file() {
        remove_dir_if_exists(&bag_dir)?;
        archive
    } else if bag_dir.is_dir() {
        bag_dir
    } else {
        return Ok(());
    };

    let target = rejected_target(pipeline, record, source.is_dir());
    fs::create_dir_all(areas.rejected_dir())?;
    fs::rename(&source, &target)?;
    fsync_dir(&areas.rejected_dir())?;
    warn!(
        "rejected {} (bag {}), moved {} to {}",
        record.original_name,
        record.identifier,
        source.display(),
        target.display()
    );
    Ok(())
}

/// `<rejected>/<original_name>`, suffixed with the bag id if that name is
/// taken or the quarantined copy is an extracted directory.
fn rejected_target(pipeline: &Pipeline, record: &BagRecord, extracted: bool) -> PathBuf {
    let areas = pipeline.areas();
    let plain = areas.rejected_path(&record.original_name);
    if extracted || plain.exists() {
        areas.rejected_path(&format!("{}.{}", record.original_name, record.identifier))
    } else {
        plain
    }
}
