use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zorya_schema::{manifest_file_name, package_file_name, BagId, Stage};

/// Current store format version. Incremented on incompatible layout changes.
pub const STORE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout of the record store.
///
/// Holds bag records, the claim journal, per-stage lock files, the insertion
/// counter and the version marker. Subdirectories are created on
/// [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn records_dir(&self) -> PathBuf {
        self.root.join("records")
    }

    #[inline]
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.records_dir().join(format!("{id}.json"))
    }

    #[inline]
    pub fn wal_dir(&self) -> PathBuf {
        self.root.join("wal")
    }

    #[inline]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Lock held for the whole of one run of `stage`.
    #[inline]
    pub fn stage_lock(&self, stage: Stage) -> PathBuf {
        self.locks_dir().join(format!("{stage}.lock"))
    }

    /// Lock serializing record insertion and sequence assignment.
    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(".lock")
    }

    #[inline]
    pub fn sequence_file(&self) -> PathBuf {
        self.root.join("sequence")
    }

    fn version_path(&self) -> PathBuf {
        self.root.join(VERSION_FILE)
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.records_dir())?;
        fs::create_dir_all(self.wal_dir())?;
        fs::create_dir_all(self.locks_dir())?;

        if self.version_path().exists() {
            self.verify_version()?;
        } else {
            let ver = StoreVersion {
                format_version: STORE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            crate::write_atomic(&self.version_path(), content.as_bytes())?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let content = fs::read_to_string(self.version_path())?;
        let ver: StoreVersion = serde_json::from_str(&content)?;

        if ver.format_version != STORE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: STORE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}

/// The three filesystem roots bags travel through.
///
/// - `inbox`: archives landed from the origin, named as first observed.
/// - `working`: unpack staging, validated bags, assembled packages and
///   rejected archives.
/// - `destination`: final archives handed to delivery.
#[derive(Debug, Clone)]
pub struct WorkAreas {
    inbox: PathBuf,
    working: PathBuf,
    destination: PathBuf,
}

impl WorkAreas {
    pub fn new(
        inbox: impl Into<PathBuf>,
        working: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inbox: inbox.into(),
            working: working.into(),
            destination: destination.into(),
        }
    }

    #[inline]
    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    #[inline]
    pub fn working(&self) -> &Path {
        &self.working
    }

    #[inline]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    #[inline]
    pub fn inbox_path(&self, original_name: &str) -> PathBuf {
        self.inbox.join(original_name)
    }

    #[inline]
    pub fn unpack_dir(&self) -> PathBuf {
        self.working.join("unpack")
    }

    /// Scratch directory an archive is extracted into before validation.
    #[inline]
    pub fn unpack_path(&self, id: &BagId) -> PathBuf {
        self.unpack_dir().join(id.as_str())
    }

    #[inline]
    pub fn bags_dir(&self) -> PathBuf {
        self.working.join("bags")
    }

    #[inline]
    pub fn bag_path(&self, id: &BagId) -> PathBuf {
        self.bags_dir().join(id.as_str())
    }

    #[inline]
    pub fn packages_dir(&self) -> PathBuf {
        self.working.join("packages")
    }

    #[inline]
    pub fn package_path(&self, id: &BagId) -> PathBuf {
        self.packages_dir().join(id.as_str())
    }

    #[inline]
    pub fn package_archive(&self, id: &BagId) -> PathBuf {
        self.package_path(id).join(package_file_name(id))
    }

    #[inline]
    pub fn package_manifest(&self, id: &BagId) -> PathBuf {
        self.package_path(id).join(manifest_file_name(id))
    }

    #[inline]
    pub fn rejected_dir(&self) -> PathBuf {
        self.working.join("rejected")
    }

    #[inline]
    pub fn rejected_path(&self, original_name: &str) -> PathBuf {
        self.rejected_dir().join(original_name)
    }

    #[inline]
    pub fn archive_path(&self, id: &BagId) -> PathBuf {
        self.destination.join(package_file_name(id))
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.inbox)?;
        fs::create_dir_all(self.unpack_dir())?;
        fs::create_dir_all(self.bags_dir())?;
        fs::create_dir_all(self.packages_dir())?;
        fs::create_dir_all(self.rejected_dir())?;
        fs::create_dir_all(&self.destination)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/zorya-test");
        assert_eq!(layout.records_dir(), PathBuf::from("/tmp/zorya-test/records"));
        assert_eq!(
            layout.record_path("abc123"),
            PathBuf::from("/tmp/zorya-test/records/abc123.json")
        );
        assert_eq!(layout.wal_dir(), PathBuf::from("/tmp/zorya-test/wal"));
        assert_eq!(
            layout.stage_lock(Stage::Package),
            PathBuf::from("/tmp/zorya-test/locks/package.lock")
        );
    }

    #[test]
    fn work_area_paths_are_correct() {
        let areas = WorkAreas::new("/in", "/work", "/out");
        let id = BagId::new("b1");
        assert_eq!(areas.inbox_path("x.tar"), PathBuf::from("/in/x.tar"));
        assert_eq!(areas.unpack_path(&id), PathBuf::from("/work/unpack/b1"));
        assert_eq!(areas.bag_path(&id), PathBuf::from("/work/bags/b1"));
        assert_eq!(
            areas.package_archive(&id),
            PathBuf::from("/work/packages/b1/b1.tar.gz")
        );
        assert_eq!(
            areas.package_manifest(&id),
            PathBuf::from("/work/packages/b1/b1.json")
        );
        assert_eq!(
            areas.rejected_path("x.tar"),
            PathBuf::from("/work/rejected/x.tar")
        );
        assert_eq!(areas.archive_path(&id), PathBuf::from("/out/b1.tar.gz"));
    }

    #[test]
    fn initialize_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("store"));
        layout.initialize().unwrap();
        assert!(layout.records_dir().is_dir());
        assert!(layout.wal_dir().is_dir());
        assert!(layout.locks_dir().is_dir());

        let areas = WorkAreas::new(
            dir.path().join("inbox"),
            dir.path().join("working"),
            dir.path().join("destination"),
        );
        areas.initialize().unwrap();
        assert!(areas.bags_dir().is_dir());
        assert!(areas.rejected_dir().is_dir());
        assert!(areas.destination().is_dir());
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        layout.verify_version().unwrap();
    }

    #[test]
    fn version_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        fs::write(dir.path().join(VERSION_FILE), r#"{"format_version": 99}"#).unwrap();
        assert!(matches!(
            layout.initialize(),
            Err(StoreError::VersionMismatch { found: 99, .. })
        ));
    }
}
