use super::{incomplete, remove_dir_if_exists, write_synced};
use crate::{CoreError, Pipeline};
use std::fs;
use tracing::{debug, info};
use zorya_schema::{manifest_file_name, PackageManifest};
use zorya_store::{pack_directory, BagRecord};

/// Write the manifest into the bag and pack both into
/// `<working>/packages/<id>/<id>.tar.gz`, with a copy of the manifest beside it.
pub(super) fn run(pipeline: &Pipeline, record: &mut BagRecord) -> Result<(), CoreError> {
    let areas = pipeline.areas();
    let id = record.identifier.clone();
    let bag_dir = areas.bag_path(&id);
    let package_dir = areas.package_path(&id);
    let package_archive = areas.package_archive(&id);
    let manifest_copy = areas.package_manifest(&id);

    if !bag_dir.is_dir() {
        if package_archive.is_file() && manifest_copy.is_file() {
            debug!("{id}: package already assembled");
            record.local_path = Some(package_dir);
            return Ok(());
        }
        return Err(incomplete(
            record,
            format!("payload directory {} is missing", bag_dir.display()),
        ));
    }

    let manifest = PackageManifest {
        identifier: id.clone(),
        origin: record.origin.ok_or_else(|| incomplete(record, "origin not set"))?,
        original_name: record.original_name.clone(),
        rights: record
            .rights_payload
            .clone()
            .ok_or_else(|| incomplete(record, "rights not assigned"))?,
    };
    let json = manifest.to_json_pretty()?;
    write_synced(&bag_dir.join(manifest_file_name(&id)), json.as_bytes())?;

    fs::create_dir_all(&package_dir)?;
    pack_directory(&bag_dir, &id, &package_archive)?;
    write_synced(&manifest_copy, json.as_bytes())?;
    remove_dir_if_exists(&bag_dir)?;

    info!("{id}: packaged as {}", package_archive.display());
    record.local_path = Some(package_dir);
    Ok(())
}
