use crate::layout::StoreLayout;
use crate::{write_atomic, StoreError};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use zorya_schema::{BagId, BagStatus, BagUpdate, DateRange, Origin, OriginalName};

/// One bag tracked through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BagRecord {
    pub identifier: BagId,
    pub original_name: OriginalName,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub origin: Option<Origin>,
    pub status: BagStatus,
    #[serde(default)]
    pub rights_reference: Vec<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    /// Body returned by the rights service. `None` until rights are assigned.
    #[serde(default)]
    pub rights_payload: Option<serde_json::Value>,
    #[serde(default)]
    pub profile_identifier: Option<String>,
    /// Insertion order, assigned by [`RecordStore::insert`].
    #[serde(default)]
    pub sequence: u64,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum for integrity verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl BagRecord {
    pub fn new(identifier: BagId, original_name: OriginalName, status: BagStatus) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            identifier,
            original_name,
            local_path: None,
            origin: None,
            status,
            rights_reference: Vec::new(),
            date_range: None,
            rights_payload: None,
            profile_identifier: None,
            sequence: 0,
            created_at: now.clone(),
            updated_at: now,
            checksum: None,
        }
    }

    /// Copy validated metadata into the record.
    pub fn apply(&mut self, update: BagUpdate) {
        self.origin = Some(update.origin);
        self.rights_reference = update.rights_reference;
        self.date_range = Some(update.date_range);
        self.profile_identifier = Some(update.profile_identifier);
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Checksum over the record content, excluding the checksum field itself.
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Identifiers become file names, so they are restricted to `[A-Za-z0-9_-]`.
pub fn validate_identifier(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.len() > 64 {
        return Err(StoreError::InvalidIdentifier(format!(
            "'{id}' must be 1-64 characters"
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(StoreError::InvalidIdentifier(format!(
            "'{id}' must match [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SequenceCounter {
    next: u64,
}

pub struct RecordStore {
    layout: StoreLayout,
}

impl RecordStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Add a new record, assigning the next insertion sequence number.
    pub fn insert(&self, record: &BagRecord) -> Result<BagRecord, StoreError> {
        validate_identifier(&record.identifier)?;

        let lock_path = self.layout.lock_file();
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(format!("{}: {e}", lock_path.display())))?;

        let result = self.insert_locked(record);
        let _ = lock.unlock();
        result
    }

    fn insert_locked(&self, record: &BagRecord) -> Result<BagRecord, StoreError> {
        if self.exists(&record.identifier) {
            return Err(StoreError::DuplicateRecord(record.identifier.to_string()));
        }

        let seq_path = self.layout.sequence_file();
        let mut counter: SequenceCounter = if seq_path.exists() {
            serde_json::from_str(&fs::read_to_string(&seq_path)?)?
        } else {
            SequenceCounter::default()
        };
        counter.next += 1;
        write_atomic(&seq_path, serde_json::to_string(&counter)?.as_bytes())?;

        let mut stored = record.clone();
        stored.sequence = counter.next;
        self.put(&stored)?;
        self.get(&stored.identifier)
    }

    pub fn put(&self, record: &BagRecord) -> Result<(), StoreError> {
        validate_identifier(&record.identifier)?;

        let mut with_checksum = record.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        write_atomic(
            &self.layout.record_path(&record.identifier),
            content.as_bytes(),
        )
    }

    pub fn get(&self, id: &str) -> Result<BagRecord, StoreError> {
        validate_identifier(id)?;
        let path = self.layout.record_path(id);
        if !path.exists() {
            return Err(StoreError::RecordNotFound(id.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let record: BagRecord = serde_json::from_str(&content)?;

        if let Some(ref expected) = record.checksum {
            let actual = record.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    identifier: id.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(record)
    }

    pub fn update_status(&self, id: &str, status: BagStatus) -> Result<BagRecord, StoreError> {
        let mut record = self.get(id)?;
        record.status = status;
        record.touch();
        self.put(&record)?;
        Ok(record)
    }

    pub fn exists(&self, id: &str) -> bool {
        validate_identifier(id).is_ok() && self.layout.record_path(id).exists()
    }

    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        validate_identifier(id)?;
        let path = self.layout.record_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn record_ids(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.records_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if !id.starts_with('.') {
                ids.push(id.to_owned());
            }
        }
        Ok(ids)
    }

    /// All readable records, oldest first. Corrupt entries are skipped with a warning.
    pub fn list(&self) -> Result<Vec<BagRecord>, StoreError> {
        let mut results = Vec::new();
        for id in self.record_ids()? {
            match self.get(&id) {
                Ok(record) => results.push(record),
                Err(e) => {
                    tracing::warn!("skipping corrupted bag record '{id}': {e}");
                }
            }
        }
        results.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(results)
    }

    /// Like `list()`, but returns per-entry `Result`s so callers (e.g.
    /// `verify-store`) can surface individual corruption errors.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(
        &self,
    ) -> Result<Vec<Result<BagRecord, (String, StoreError)>>, StoreError> {
        let mut results = Vec::new();
        for id in self.record_ids()? {
            match self.get(&id) {
                Ok(record) => results.push(Ok(record)),
                Err(e) => results.push(Err((id, e))),
            }
        }
        Ok(results)
    }

    pub fn find_by_status(&self, status: BagStatus) -> Result<Vec<BagRecord>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    /// The oldest record in `status`, by insertion sequence.
    pub fn first_with_status(&self, status: BagStatus) -> Result<Option<BagRecord>, StoreError> {
        Ok(self.list()?.into_iter().find(|r| r.status == status))
    }

    pub fn find_by_original_name(&self, name: &str) -> Result<Option<BagRecord>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|r| r.original_name.as_str() == name))
    }
}
