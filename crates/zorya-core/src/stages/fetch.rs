use super::{incomplete, remove_file_if_exists};
use crate::{CoreError, Pipeline};
use std::fs;
use tracing::{debug, info};
use zorya_remote::RemoteError;
use zorya_schema::is_expected_name;
use zorya_store::{fsync_dir, partial_path, BagRecord};

/// Land the origin object in the inbox, then delete it at the origin.
pub(super) fn run(pipeline: &Pipeline, record: &mut BagRecord) -> Result<(), CoreError> {
    let name = record.original_name.as_str();
    if !is_expected_name(name) {
        return Err(incomplete(record, format!("'{name}' does not follow the naming convention")));
    }
    let origin = &pipeline.services().origin;
    let inbox = pipeline.areas().inbox();
    let dest = pipeline.areas().inbox_path(name);

    if dest.is_file() {
        debug!("{name} already landed in the inbox");
    } else {
        let partial = partial_path(&dest);
        let bytes = origin.fetch_object(name, &partial)?;
        fs::rename(&partial, &dest)?;
        fsync_dir(inbox)?;
        info!("fetched {name} ({bytes} bytes)");
    }

    match origin.delete_object(name) {
        Ok(()) => debug!("deleted {name} at origin"),
        Err(RemoteError::NotFound(_)) => debug!("{name} already gone from origin"),
        Err(e) => return Err(e.into()),
    }

    record.local_path = Some(dest);
    Ok(())
}

/// The origin copy is never touched on failure; only the partial download goes.
pub(super) fn discard(pipeline: &Pipeline, record: &BagRecord) -> Result<(), CoreError> {
    let dest = pipeline.areas().inbox_path(&record.original_name);
    remove_file_if_exists(&partial_path(&dest))?;
    Ok(())
}
