//! The package manifest: `<identifier>.json`, written beside the payload
//! before the bag is packed.

use crate::{BagId, Origin, OriginalName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Fields are declared in sorted order; serde emits them in declaration
/// order and `serde_json::Value` maps are sorted, so output is byte-stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    pub identifier: BagId,
    pub origin: Origin,
    pub original_name: OriginalName,
    pub rights: serde_json::Value,
}

impl PackageManifest {
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut out = serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)?;
        out.push('\n');
        Ok(out)
    }

    pub fn from_json(data: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(data).map_err(ManifestError::Parse)
    }
}

pub fn manifest_file_name(id: &BagId) -> String {
    format!("{id}.json")
}

pub fn package_file_name(id: &BagId) -> String {
    format!("{id}.tar.gz")
}
