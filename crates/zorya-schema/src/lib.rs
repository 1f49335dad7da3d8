//! Identifiers, statuses, BagIt metadata and package manifests for Zorya.
//!
//! This crate defines the schema layer: the `BagId` and `OriginalName`
//! newtypes, the ordered `BagStatus` set with its in-progress markers, the
//! origin naming convention (`match_expected_name`), BagIt tag-file parsing
//! (`TagFile`), profile rules (`Profile`), typed bag metadata
//! (`BagMetadata` / `BagUpdate`), and the package manifest (`PackageManifest`).

pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod profile;
pub mod status;
pub mod tagfile;
pub mod types;

pub use manifest::{manifest_file_name, package_file_name, ManifestError, PackageManifest};
pub use metadata::{BagMetadata, BagUpdate, MetadataError};
pub use naming::{is_expected_name, match_expected_name, ArchiveFormat, ExpectedName, TOKEN_LENGTH};
pub use profile::{FieldRule, Profile, ProfileInfo};
pub use status::{BagStatus, Stage, UnknownStage, UnknownStatus};
pub use tagfile::TagFile;
pub use types::{BagId, DateRange, Origin, OriginalName, UnknownOrigin};
