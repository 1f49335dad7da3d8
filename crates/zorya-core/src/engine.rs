use crate::concurrency::StoreLock;
use crate::config::PipelineConfig;
use crate::lifecycle::validate_transition;
use crate::services::Services;
use crate::stages;
use crate::CoreError;
use std::fs;
use tracing::{debug, info, warn};
use zorya_schema::{is_expected_name, BagId, BagStatus, OriginalName, Stage};
use zorya_store::{
    partial_path, verify_store_integrity, BagRecord, IntegrityReport, PruneReport, RecordStore,
    RollbackStep, StoreLayout, WorkAreaPruner, WorkAreas, WriteAheadLog,
};

/// What to do with a bag whose stage action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Put the record back into the stage's start status.
    Revert,
    /// Drop the record; the stage action cleans up its own artifacts.
    Discard,
}

/// The status triple and user-facing messages of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub stage: Stage,
    /// `None` for intake, which claims work that has no record yet.
    pub start: Option<BagStatus>,
    pub in_progress: BagStatus,
    pub end: BagStatus,
    pub failure: FailurePolicy,
    pub success_message: &'static str,
    pub idle_message: &'static str,
    pub busy_message: &'static str,
}

impl StageSpec {
    pub fn for_stage(stage: Stage) -> Self {
        let (failure, success_message, idle_message, busy_message) = match stage {
            Stage::Fetch => (
                FailurePolicy::Discard,
                "Object fetched from origin.",
                "No new objects at origin.",
                "Fetch already in progress.",
            ),
            Stage::Discover => (
                FailurePolicy::Discard,
                "Bag discovered and validated.",
                "No fetched bags waiting for discovery.",
                "Discovery already in progress.",
            ),
            Stage::Rights => (
                FailurePolicy::Revert,
                "Rights assigned.",
                "No bags waiting for rights assignment.",
                "Rights assignment already in progress.",
            ),
            Stage::Package => (
                FailurePolicy::Revert,
                "Package created.",
                "No bags waiting to be packaged.",
                "Packaging already in progress.",
            ),
            Stage::Archive => (
                FailurePolicy::Revert,
                "Package archived.",
                "No packages waiting to be archived.",
                "Archiving already in progress.",
            ),
            Stage::Deliver => (
                FailurePolicy::Revert,
                "Package delivered.",
                "No packages waiting for delivery.",
                "Delivery already in progress.",
            ),
        };
        Self {
            stage,
            start: stage.start(),
            in_progress: stage.in_progress(),
            end: stage.end(),
            failure,
            success_message,
            idle_message,
            busy_message,
        }
    }
}

/// Result of a stage run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Nothing was eligible.
    Idle,
    /// Another run of the same stage is active or left a claim behind.
    Busy,
    /// One bag moved to the stage's end status.
    Completed(BagId),
}

impl StageOutcome {
    /// The `(message, identifiers)` pair reported to triggers.
    pub fn report(&self, stage: Stage) -> (&'static str, Vec<String>) {
        let spec = StageSpec::for_stage(stage);
        match self {
            StageOutcome::Idle => (spec.idle_message, Vec::new()),
            StageOutcome::Busy => (spec.busy_message, Vec::new()),
            StageOutcome::Completed(id) => (spec.success_message, vec![id.to_string()]),
        }
    }
}

/// Stages rolled back or skipped by [`Pipeline::recover`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub rolled_back: Vec<(Stage, usize)>,
    /// Stages whose lock was held, so their journal was left alone.
    pub skipped: Vec<Stage>,
}

impl RecoveryReport {
    pub fn total(&self) -> usize {
        self.rolled_back.iter().map(|(_, n)| n).sum()
    }
}

/// The stage-transition engine.
///
/// Each call to [`run_stage`](Self::run_stage) claims at most one bag: it
/// takes the stage lock, refuses to start while a claim of the same stage is
/// outstanding, journals rollback steps, flips the record to the in-progress
/// marker, runs the stage action and then either writes the end status or
/// undoes the claim.
pub struct Pipeline {
    layout: StoreLayout,
    areas: WorkAreas,
    records: RecordStore,
    wal: WriteAheadLog,
    services: Services,
    startup_recovery: RecoveryReport,
}

impl Pipeline {
    /// Build the collaborators from `config` and open the store.
    pub fn open(config: &PipelineConfig) -> Result<Self, CoreError> {
        let services = Services::from_config(config)?;
        Self::with_services(config.store_layout(), config.work_areas(), services)
    }

    /// Open the store with explicit collaborators.
    ///
    /// Creates missing directories, checks the store format version, and
    /// rolls back interrupted runs of every stage that is not currently
    /// running.
    pub fn with_services(
        layout: StoreLayout,
        areas: WorkAreas,
        services: Services,
    ) -> Result<Self, CoreError> {
        layout.initialize()?;
        areas.initialize()?;
        let wal = WriteAheadLog::new(&layout);
        wal.initialize()?;

        let mut pipeline = Self {
            records: RecordStore::new(layout.clone()),
            layout,
            areas,
            wal,
            services,
            startup_recovery: RecoveryReport::default(),
        };
        match pipeline.recover() {
            Ok(report) => {
                if report.total() > 0 {
                    info!("recovered {} interrupted stage runs", report.total());
                }
                pipeline.startup_recovery = report;
            }
            Err(e) => warn!("crash recovery failed: {e}"),
        }
        Ok(pipeline)
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn areas(&self) -> &WorkAreas {
        &self.areas
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// What the recovery pass run while opening rolled back.
    pub fn startup_recovery(&self) -> &RecoveryReport {
        &self.startup_recovery
    }

    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    /// Replay the journal of every stage whose lock is free.
    pub fn recover(&self) -> Result<RecoveryReport, CoreError> {
        let mut report = RecoveryReport::default();
        for stage in Stage::ALL {
            match StoreLock::try_acquire(&self.layout.stage_lock(stage))? {
                Some(_lock) => {
                    let n = self.wal.recover_stage(stage)?;
                    if n > 0 {
                        report.rolled_back.push((stage, n));
                    }
                }
                None => {
                    debug!("{stage} lock held; skipping recovery");
                    report.skipped.push(stage);
                }
            }
        }
        Ok(report)
    }

    /// Run one stage once.
    pub fn run_stage(&self, stage: Stage) -> Result<StageOutcome, CoreError> {
        let spec = StageSpec::for_stage(stage);

        let Some(_lock) = StoreLock::try_acquire(&self.layout.stage_lock(stage))? else {
            info!("{stage}: {}", spec.busy_message);
            return Ok(StageOutcome::Busy);
        };

        let stuck = self.records.find_by_status(spec.in_progress)?;
        if let Some(record) = stuck.first() {
            warn!(
                "{stage}: bag {} is still {}; run `zorya recover` if no other process is working on it",
                record.identifier, spec.in_progress
            );
            return Ok(StageOutcome::Busy);
        }

        let claimed = match spec.start {
            None => self.claim_intake(&spec)?,
            Some(start) => self.claim_existing(&spec, start)?,
        };
        let Some((mut record, op_id)) = claimed else {
            debug!("{stage}: {}", spec.idle_message);
            return Ok(StageOutcome::Idle);
        };
        info!("{stage}: claimed bag {} ('{}')", record.identifier, record.original_name);

        let result = stages::run(self, stage, &mut record).and_then(|()| {
            validate_transition(record.status, spec.end)?;
            record.status = spec.end;
            record.touch();
            self.records.put(&record)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                self.wal.commit(&op_id)?;
                info!("{stage}: bag {} is now {}", record.identifier, spec.end);
                Ok(StageOutcome::Completed(record.identifier))
            }
            Err(e) => {
                warn!("{stage}: bag {} failed: {e}", record.identifier);
                self.settle_failure(&spec, &record, &op_id);
                Err(CoreError::Stage {
                    stage,
                    identifier: record.identifier.into_inner(),
                    original_name: record.original_name.into_inner(),
                    source: Box::new(e),
                })
            }
        }
    }

    fn claim_existing(
        &self,
        spec: &StageSpec,
        start: BagStatus,
    ) -> Result<Option<(BagRecord, String)>, CoreError> {
        let Some(record) = self.records.first_with_status(start)? else {
            return Ok(None);
        };
        validate_transition(record.status, spec.in_progress)?;

        let mut steps = vec![RollbackStep::ResetStatus {
            identifier: record.identifier.to_string(),
            target: start,
        }];
        steps.extend(stages::scratch_paths(spec.stage, &self.areas, &record.identifier));
        let op_id = self.wal.begin(spec.stage, &record.identifier, steps)?;

        match self.records.update_status(&record.identifier, spec.in_progress) {
            Ok(claimed) => Ok(Some((claimed, op_id))),
            Err(e) => {
                let _ = self.wal.commit(&op_id);
                Err(e.into())
            }
        }
    }

    fn claim_intake(&self, spec: &StageSpec) -> Result<Option<(BagRecord, String)>, CoreError> {
        let Some(name) = self.next_intake_candidate()? else {
            return Ok(None);
        };
        let record = BagRecord::new(BagId::generate(), name, spec.in_progress);

        let steps = vec![
            RollbackStep::RemoveRecord {
                identifier: record.identifier.to_string(),
            },
            RollbackStep::RemoveFile(partial_path(&self.areas.inbox_path(&record.original_name))),
        ];
        let op_id = self.wal.begin(spec.stage, &record.identifier, steps)?;

        match self.records.insert(&record) {
            Ok(claimed) => Ok(Some((claimed, op_id))),
            Err(e) => {
                let _ = self.wal.commit(&op_id);
                Err(e.into())
            }
        }
    }

    /// Oldest unrecorded archive already landed in the inbox, else the first
    /// origin object that follows the naming convention and is not yet held.
    fn next_intake_candidate(&self) -> Result<Option<OriginalName>, CoreError> {
        let mut landed = Vec::new();
        for entry in fs::read_dir(self.areas.inbox())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_expected_name(name) {
                    landed.push(name.to_owned());
                }
            }
        }
        landed.sort();
        for name in landed {
            if self.records.find_by_original_name(&name)?.is_none() {
                debug!("adopting unrecorded inbox archive {name}");
                return Ok(Some(OriginalName::new(name)));
            }
        }

        for key in self.services.origin.list_objects()? {
            if !is_expected_name(&key) {
                debug!("ignoring origin object {key}: does not follow the naming convention");
                continue;
            }
            if self.records.find_by_original_name(&key)?.is_some() {
                debug!("ignoring origin object {key}: already held");
                continue;
            }
            return Ok(Some(OriginalName::new(key)));
        }
        Ok(None)
    }

    /// Undo a failed claim. The journal entry is kept when undoing fails so
    /// that recovery can finish the job.
    fn settle_failure(&self, spec: &StageSpec, record: &BagRecord, op_id: &str) {
        let undone = match spec.failure {
            FailurePolicy::Revert => match spec.start {
                Some(start) => self
                    .records
                    .update_status(&record.identifier, start)
                    .map(|_| ())
                    .map_err(CoreError::from),
                None => self.records.remove(&record.identifier).map_err(CoreError::from),
            },
            FailurePolicy::Discard => stages::discard(self, spec.stage, record)
                .and_then(|()| self.records.remove(&record.identifier).map_err(CoreError::from)),
        };
        match undone {
            Ok(()) => {
                if let Err(e) = self.wal.commit(op_id) {
                    warn!("{}: failed to commit journal entry {op_id}: {e}", spec.stage);
                }
            }
            Err(e) => warn!(
                "{}: could not undo claim on bag {}, leaving it for recovery: {e}",
                spec.stage, record.identifier
            ),
        }
    }

    /// Remove scratch data no record accounts for. Refuses while any stage runs.
    pub fn prune(
        &self,
        dry_run: bool,
        should_stop: impl Fn() -> bool,
    ) -> Result<PruneReport, CoreError> {
        let mut locks = Vec::new();
        for stage in Stage::ALL {
            match StoreLock::try_acquire(&self.layout.stage_lock(stage))? {
                Some(lock) => locks.push(lock),
                None => return Err(CoreError::StageActive(stage)),
            }
        }
        let pruner = WorkAreaPruner::new(self.layout.clone(), self.areas.clone());
        Ok(pruner.collect_with_cancel(dry_run, should_stop)?)
    }

    pub fn verify(&self) -> Result<IntegrityReport, CoreError> {
        Ok(verify_store_integrity(&self.layout)?)
    }
}
