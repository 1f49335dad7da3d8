use crate::layout::StoreLayout;
use crate::records::RecordStore;
use crate::{write_atomic, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use zorya_schema::{BagStatus, Stage};

/// A single rollback step that undoes part of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RollbackStep {
    /// Remove a directory tree (e.g. an unpack staging directory).
    RemoveDir(PathBuf),
    /// Remove a single file (e.g. a partially written archive).
    RemoveFile(PathBuf),
    /// Put a claimed record back into the status it was claimed from.
    ResetStatus {
        identifier: String,
        target: BagStatus,
    },
    /// Drop a record created by the claim itself.
    RemoveRecord { identifier: String },
}

/// A journal entry for one in-flight stage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub op_id: String,
    pub stage: Stage,
    pub identifier: String,
    pub timestamp: String,
    pub rollback_steps: Vec<RollbackStep>,
}

/// Write-ahead log for crash recovery.
///
/// A stage run writes an entry with its rollback steps before the claim is
/// persisted and removes it once the run has committed or reverted. Entries
/// still present at startup belong to runs that died mid-flight.
pub struct WriteAheadLog {
    layout: StoreLayout,
    wal_dir: PathBuf,
}

impl WriteAheadLog {
    pub fn new(layout: &StoreLayout) -> Self {
        Self {
            wal_dir: layout.wal_dir(),
            layout: layout.clone(),
        }
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        Ok(())
    }

    /// Begin a new entry for `stage` acting on `identifier`. Returns the op_id.
    pub fn begin(
        &self,
        stage: Stage,
        identifier: &str,
        rollback_steps: Vec<RollbackStep>,
    ) -> Result<String, StoreError> {
        let op_id = format!(
            "{}-{stage}-{}",
            chrono::Utc::now().format("%Y%m%d%H%M%S%3f"),
            &blake3::hash(identifier.as_bytes()).to_hex()[..8]
        );
        let entry = WalEntry {
            op_id: op_id.clone(),
            stage,
            identifier: identifier.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            rollback_steps,
        };
        self.write_entry(&entry)?;
        debug!("WAL begin: {stage} for {identifier} (op_id={op_id})");
        Ok(op_id)
    }

    /// Remove an entry once its run has finished either way.
    pub fn commit(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            crate::fsync_dir(&self.wal_dir)?;
            debug!("WAL commit: {op_id}");
        }
        Ok(())
    }

    pub fn list_incomplete(&self) -> Result<Vec<WalEntry>, StoreError> {
        if !self.wal_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.wal_dir)? {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                match fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<WalEntry>(&content) {
                        Ok(entry) => entries.push(entry),
                        Err(e) => {
                            warn!("corrupt WAL entry {}: {e}", path.display());
                            let _ = fs::remove_file(&path);
                        }
                    },
                    Err(e) => {
                        warn!("unreadable WAL entry {}: {e}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    /// Roll back incomplete entries of one stage. The caller must hold that
    /// stage's lock. Returns the number of entries rolled back.
    pub fn recover_stage(&self, stage: Stage) -> Result<usize, StoreError> {
        let entries: Vec<WalEntry> = self
            .list_incomplete()?
            .into_iter()
            .filter(|e| e.stage == stage)
            .collect();
        let count = entries.len();
        for entry in &entries {
            info!(
                "WAL recovery: rolling back {} on {} (op_id={})",
                entry.stage, entry.identifier, entry.op_id
            );
            self.rollback_entry(entry);
            let _ = fs::remove_file(self.entry_path(&entry.op_id));
        }
        if count > 0 {
            info!("WAL recovery complete for {stage}: {count} entries rolled back");
        }
        Ok(count)
    }

    fn rollback_entry(&self, entry: &WalEntry) {
        let records = RecordStore::new(self.layout.clone());
        let claimed = entry.stage.in_progress();
        // A run that died after writing its end status has nothing to undo.
        if let Ok(record) = records.get(&entry.identifier) {
            if record.status == entry.stage.end() {
                debug!(
                    "WAL rollback: {} already {}, dropping entry",
                    entry.identifier, record.status
                );
                return;
            }
        }
        let still_claimed = |id: &str| records.get(id).is_ok_and(|r| r.status == claimed);
        for step in entry.rollback_steps.iter().rev() {
            match step {
                RollbackStep::RemoveDir(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_dir_all(path) {
                            warn!("WAL rollback: failed to remove dir {}: {e}", path.display());
                        } else {
                            debug!("WAL rollback: removed dir {}", path.display());
                        }
                    }
                }
                RollbackStep::RemoveFile(path) => {
                    if path.exists() {
                        if let Err(e) = fs::remove_file(path) {
                            warn!(
                                "WAL rollback: failed to remove file {}: {e}",
                                path.display()
                            );
                        } else {
                            debug!("WAL rollback: removed file {}", path.display());
                        }
                    }
                }
                RollbackStep::ResetStatus { identifier, target } => {
                    if !still_claimed(identifier) {
                        continue;
                    }
                    match records.update_status(identifier, *target) {
                        Ok(_) => debug!("WAL rollback: reset {identifier} to {target}"),
                        Err(e) => warn!("WAL rollback: failed to reset {identifier}: {e}"),
                    }
                }
                RollbackStep::RemoveRecord { identifier } => {
                    if !still_claimed(identifier) {
                        continue;
                    }
                    if let Err(e) = records.remove(identifier) {
                        warn!("WAL rollback: failed to remove record {identifier}: {e}");
                    } else {
                        debug!("WAL rollback: removed record {identifier}");
                    }
                }
            }
        }
    }

    fn entry_path(&self, op_id: &str) -> PathBuf {
        self.wal_dir.join(format!("{op_id}.json"))
    }

    fn write_entry(&self, entry: &WalEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        let content = serde_json::to_string_pretty(entry)?;
        write_atomic(&self.entry_path(&entry.op_id), content.as_bytes())
    }
}
