use crate::layout::StoreLayout;
use crate::records::RecordStore;
use crate::wal::WriteAheadLog;
use crate::StoreError;

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub records_checked: usize,
    pub records_passed: usize,
    pub failed: Vec<IntegrityFailure>,
    /// Claims whose run never finished; `zorya recover` rolls them back.
    pub pending_claims: usize,
    /// Records sitting in an in-progress status.
    pub in_progress: Vec<String>,
}

#[derive(Debug)]
pub struct IntegrityFailure {
    pub identifier: String,
    pub reason: String,
}

pub fn verify_store_integrity(layout: &StoreLayout) -> Result<IntegrityReport, StoreError> {
    layout.verify_version()?;
    let records = RecordStore::new(layout.clone());
    let wal = WriteAheadLog::new(layout);

    let all = records.list_with_errors()?;
    let mut report = IntegrityReport {
        records_checked: all.len(),
        pending_claims: wal.list_incomplete()?.len(),
        ..Default::default()
    };

    for result in all {
        match result {
            Ok(record) => {
                report.records_passed += 1;
                if record.status.is_in_progress() {
                    report.in_progress.push(record.identifier.into_inner());
                }
            }
            Err((identifier, StoreError::IntegrityFailure { actual, .. })) => {
                report.failed.push(IntegrityFailure {
                    identifier,
                    reason: format!("record checksum mismatch: got {actual}"),
                });
            }
            Err((identifier, e)) => {
                report.failed.push(IntegrityFailure {
                    identifier,
                    reason: format!("record read error: {e}"),
                });
            }
        }
    }

    Ok(report)
}
