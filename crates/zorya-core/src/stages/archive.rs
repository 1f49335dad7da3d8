use super::{incomplete, remove_dir_if_exists};
use crate::{CoreError, Pipeline};
use tracing::{debug, info};
use zorya_store::{pack_directory, BagRecord};

/// Pack the package directory into `<destination>/<id>.tar.gz`.
pub(super) fn run(pipeline: &Pipeline, record: &mut BagRecord) -> Result<(), CoreError> {
    let areas = pipeline.areas();
    let id = record.identifier.clone();
    let package_dir = areas.package_path(&id);
    let dest = areas.archive_path(&id);

    if !package_dir.is_dir() {
        if dest.is_file() {
            debug!("{id}: already archived at {}", dest.display());
            record.local_path = Some(dest);
            return Ok(());
        }
        return Err(incomplete(
            record,
            format!("package directory {} is missing", package_dir.display()),
        ));
    }

    pack_directory(&package_dir, &id, &dest)?;
    remove_dir_if_exists(&package_dir)?;
    info!("{id}: archived to {}", dest.display());
    record.local_path = Some(dest);
    Ok(())
}
