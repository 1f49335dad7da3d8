use super::incomplete;
use crate::{CoreError, Pipeline};
use tracing::debug;
use zorya_store::BagRecord;

pub(super) fn run(pipeline: &Pipeline, record: &mut BagRecord) -> Result<(), CoreError> {
    if record.rights_reference.is_empty() {
        return Err(incomplete(record, "no rights identifiers"));
    }
    let range = record
        .date_range
        .ok_or_else(|| incomplete(record, "no date range"))?;

    let payload = pipeline
        .services()
        .rights
        .assign(&record.rights_reference, &range)?;
    debug!("{}: rights payload received", record.identifier);
    record.rights_payload = Some(payload);
    Ok(())
}
