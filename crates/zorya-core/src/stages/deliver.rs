use super::incomplete;
use crate::{CoreError, Pipeline};
use tracing::info;
use zorya_remote::DeliveryNotice;
use zorya_store::BagRecord;

pub(super) fn run(pipeline: &Pipeline, record: &mut BagRecord) -> Result<(), CoreError> {
    let location = pipeline.areas().archive_path(&record.identifier);
    if !location.is_file() {
        return Err(incomplete(
            record,
            format!("archive {} is missing", location.display()),
        ));
    }
    let origin = record
        .origin
        .ok_or_else(|| incomplete(record, "origin not set"))?;

    let notice = DeliveryNotice {
        package_location: location.display().to_string(),
        origin: origin.as_str().to_owned(),
        identifier: record.identifier.to_string(),
    };
    pipeline.services().delivery.deliver(&notice)?;
    info!("{}: delivery notice sent", record.identifier);
    record.local_path = Some(location);
    Ok(())
}
