use crate::layout::{StoreLayout, WorkAreas};
use crate::records::RecordStore;
use crate::StoreError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use zorya_schema::BagStatus;

/// Removes working-area leftovers that no record accounts for.
///
/// Must only run while no stage is active: a live run's scratch data is
/// indistinguishable from an orphan.
pub struct WorkAreaPruner {
    layout: StoreLayout,
    areas: WorkAreas,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub orphaned_paths: Vec<PathBuf>,
    pub stale_partials: Vec<PathBuf>,
    pub removed: usize,
}

impl WorkAreaPruner {
    pub fn new(layout: StoreLayout, areas: WorkAreas) -> Self {
        Self { layout, areas }
    }

    pub fn collect(&self, dry_run: bool) -> Result<PruneReport, StoreError> {
        self.collect_with_cancel(dry_run, || false)
    }

    pub fn collect_with_cancel(
        &self,
        dry_run: bool,
        should_stop: impl Fn() -> bool,
    ) -> Result<PruneReport, StoreError> {
        let statuses: HashMap<String, BagStatus> = RecordStore::new(self.layout.clone())
            .list()?
            .into_iter()
            .map(|r| (r.identifier.into_inner(), r.status))
            .collect();

        let mut report = PruneReport::default();

        // Unpack staging only lives for the duration of a discover run.
        report
            .orphaned_paths
            .extend(children(&self.areas.unpack_dir())?);

        let holds = |name: &str, first: BagStatus, last: BagStatus| {
            statuses
                .get(name)
                .is_some_and(|s| (first..=last).contains(s))
        };
        for path in children(&self.areas.bags_dir())? {
            if !holds(file_name(&path), BagStatus::Discovering, BagStatus::Packaging) {
                report.orphaned_paths.push(path);
            }
        }
        for path in children(&self.areas.packages_dir())? {
            if holds(file_name(&path), BagStatus::Packaging, BagStatus::Archiving) {
                report.stale_partials.extend(partials(&path)?);
            } else {
                report.orphaned_paths.push(path);
            }
        }
        report
            .stale_partials
            .extend(partials(self.areas.inbox())?);
        report
            .stale_partials
            .extend(partials(self.areas.destination())?);

        if !dry_run {
            for path in report.orphaned_paths.iter().chain(&report.stale_partials) {
                if should_stop() {
                    break;
                }
                if path.is_dir() {
                    fs::remove_dir_all(path)?;
                } else {
                    fs::remove_file(path)?;
                }
                report.removed += 1;
            }
        }

        Ok(report)
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn children(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        out.push(entry?.path());
    }
    out.sort();
    Ok(out)
}

fn partials(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    Ok(children(dir)?
        .into_iter()
        .filter(|p| p.is_file() && file_name(p).ends_with(".partial"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::BagRecord;
    use zorya_schema::{BagId, OriginalName};

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: StoreLayout,
        areas: WorkAreas,
    }

    fn setup() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("store"));
        layout.initialize().unwrap();
        let areas = WorkAreas::new(
            dir.path().join("inbox"),
            dir.path().join("working"),
            dir.path().join("out"),
        );
        areas.initialize().unwrap();
        Fixture {
            _dir: dir,
            layout,
            areas,
        }
    }

    fn insert(f: &Fixture, id: &str, status: BagStatus) -> BagId {
        let id = BagId::new(id);
        RecordStore::new(f.layout.clone())
            .insert(&BagRecord::new(
                id.clone(),
                OriginalName::new(format!("{id}.tar")),
                status,
            ))
            .unwrap();
        id
    }

    #[test]
    fn live_bags_and_packages_are_kept() {
        let f = setup();
        let bag = insert(&f, "bag", BagStatus::RightsAssigned);
        let pkg = insert(&f, "pkg", BagStatus::Packaged);
        fs::create_dir_all(f.areas.bag_path(&bag)).unwrap();
        fs::create_dir_all(f.areas.package_path(&pkg)).unwrap();

        let report = WorkAreaPruner::new(f.layout.clone(), f.areas.clone())
            .collect(false)
            .unwrap();
        assert!(report.orphaned_paths.is_empty());
        assert!(f.areas.bag_path(&bag).exists());
        assert!(f.areas.package_path(&pkg).exists());
    }

    #[test]
    fn orphans_and_partials_are_removed() {
        let f = setup();
        let done = insert(&f, "done", BagStatus::Delivered);
        fs::create_dir_all(f.areas.bag_path(&done)).unwrap();
        fs::create_dir_all(f.areas.package_path(&BagId::new("ghost"))).unwrap();
        fs::create_dir_all(f.areas.unpack_path(&BagId::new("crashed"))).unwrap();
        let partial = f.areas.destination().join("x.tar.gz.partial");
        fs::write(&partial, "half").unwrap();
        let unclaimed = f.areas.inbox_path("unclaimed.tar");
        fs::write(&unclaimed, "landed").unwrap();

        let report = WorkAreaPruner::new(f.layout.clone(), f.areas.clone())
            .collect(false)
            .unwrap();
        assert_eq!(report.orphaned_paths.len(), 3);
        assert_eq!(report.stale_partials, vec![partial.clone()]);
        assert_eq!(report.removed, 4);
        assert!(!f.areas.bag_path(&done).exists());
        assert!(!partial.exists());
        assert!(unclaimed.exists(), "inbox archives are never pruned");
    }

    #[test]
    fn dry_run_removes_nothing() {
        let f = setup();
        let orphan = f.areas.bag_path(&BagId::new("ghost"));
        fs::create_dir_all(&orphan).unwrap();

        let report = WorkAreaPruner::new(f.layout.clone(), f.areas.clone())
            .collect(true)
            .unwrap();
        assert_eq!(report.orphaned_paths, vec![orphan.clone()]);
        assert_eq!(report.removed, 0);
        assert!(orphan.exists());
    }

    #[test]
    fn cancel_stops_removal() {
        let f = setup();
        fs::create_dir_all(f.areas.bag_path(&BagId::new("ghost"))).unwrap();

        let report = WorkAreaPruner::new(f.layout.clone(), f.areas.clone())
            .collect_with_cancel(false, || true)
            .unwrap();
        assert_eq!(report.orphaned_paths.len(), 1);
        assert_eq!(report.removed, 0);
    }
}
