//! BagIt profiles: the external rule set a bag's `bag-info.txt` must satisfy.
//!
//! Only the subset of the BagIt Profiles format that Zorya enforces is modelled;
//! unknown keys are ignored so published profiles load unchanged.

use crate::{MetadataError, TagFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    #[serde(rename = "BagIt-Profile-Identifier")]
    pub identifier: String,
    #[serde(rename = "Source-Organization", default)]
    pub source_organization: Option<String>,
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default = "default_repeatable")]
    pub repeatable: bool,
}

fn default_repeatable() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "BagIt-Profile-Info")]
    pub info: ProfileInfo,
    #[serde(rename = "Bag-Info", default)]
    pub bag_info: BTreeMap<String, FieldRule>,
    #[serde(rename = "Manifests-Required", default)]
    pub manifests_required: Vec<String>,
    #[serde(rename = "Tag-Files-Required", default)]
    pub tag_files_required: Vec<String>,
    #[serde(rename = "Accept-BagIt-Version", default)]
    pub accept_bagit_version: Vec<String>,
}

impl Profile {
    pub fn from_json(data: &[u8]) -> Result<Self, MetadataError> {
        serde_json::from_slice(data).map_err(|e| MetadataError::Profile(e.to_string()))
    }

    pub fn identifier(&self) -> &str {
        &self.info.identifier
    }

    fn violation(&self, reason: String) -> MetadataError {
        MetadataError::ProfileViolation {
            profile: self.info.identifier.clone(),
            reason,
        }
    }

    /// Check `bag-info.txt` against the `Bag-Info` rules.
    pub fn check_bag_info(&self, tags: &TagFile) -> Result<(), MetadataError> {
        for (label, rule) in &self.bag_info {
            let values: Vec<&str> = tags.get_all(label).collect();
            if values.is_empty() {
                if rule.required {
                    return Err(self.violation(format!("required field '{label}' is missing")));
                }
                continue;
            }
            if !rule.repeatable && values.len() > 1 {
                return Err(self.violation(format!(
                    "field '{label}' is not repeatable but appears {} times",
                    values.len()
                )));
            }
            if let Some(allowed) = &rule.values {
                if let Some(bad) = values.iter().find(|v| !allowed.iter().any(|a| a == *v)) {
                    return Err(self.violation(format!(
                        "field '{label}' has value '{bad}', allowed: {}",
                        allowed.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn check_bagit_version(&self, version: &str) -> Result<(), MetadataError> {
        if self.accept_bagit_version.is_empty()
            || self.accept_bagit_version.iter().any(|v| v == version)
        {
            Ok(())
        } else {
            Err(self.violation(format!(
                "BagIt version {version} not accepted, expected one of: {}",
                self.accept_bagit_version.join(", ")
            )))
        }
    }

    /// `present` lists the payload manifest algorithms found in the bag.
    pub fn check_manifests(&self, present: &[String]) -> Result<(), MetadataError> {
        for required in &self.manifests_required {
            if !present.iter().any(|p| p.eq_ignore_ascii_case(required)) {
                return Err(self.violation(format!("manifest-{required}.txt is required")));
            }
        }
        Ok(())
    }

    /// `present` reports whether a tag file exists relative to the bag root.
    pub fn check_tag_files(&self, present: impl Fn(&str) -> bool) -> Result<(), MetadataError> {
        match self.tag_files_required.iter().find(|f| !present(f)) {
            Some(missing) => Err(self.violation(format!("tag file '{missing}' is required"))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Profile {
        Profile::from_json(
            br#"{
                "BagIt-Profile-Info": {
                    "BagIt-Profile-Identifier": "https://example.org/zorya.json",
                    "Source-Organization": "Example Archive",
                    "Version": "0.1"
                },
                "Bag-Info": {
                    "Origin": {"required": true, "values": ["legacy_digital", "digitization"], "repeatable": false},
                    "Rights-ID": {"required": true},
                    "Contact-Email": {"required": false}
                },
                "Manifests-Required": ["sha256"],
                "Tag-Files-Required": ["bag-info.txt"],
                "Accept-BagIt-Version": ["0.97", "1.0"],
                "Serialization": "optional"
            }"#,
        )
        .unwrap()
    }

    fn tags(text: &str) -> TagFile {
        TagFile::parse(text).unwrap()
    }

    #[test]
    fn accepts_conforming_bag_info() {
        let p = sample();
        assert!(p
            .check_bag_info(&tags("Origin: digitization\nRights-ID: 1 2\n"))
            .is_ok());
    }

    #[test]
    fn reports_missing_required_field() {
        let err = sample()
            .check_bag_info(&tags("Origin: digitization\n"))
            .unwrap_err();
        assert!(err.to_string().contains("Rights-ID"));
    }

    #[test]
    fn reports_disallowed_value() {
        let err = sample()
            .check_bag_info(&tags("Origin: elsewhere\nRights-ID: 1\n"))
            .unwrap_err();
        assert!(err.to_string().contains("elsewhere"));
    }

    #[test]
    fn reports_repeated_non_repeatable_field() {
        let err = sample()
            .check_bag_info(&tags("Origin: digitization\nOrigin: digitization\nRights-ID: 1\n"))
            .unwrap_err();
        assert!(err.to_string().contains("not repeatable"));
    }

    #[test]
    fn version_and_manifest_rules() {
        let p = sample();
        assert!(p.check_bagit_version("1.0").is_ok());
        assert!(p.check_bagit_version("0.96").is_err());
        assert!(p.check_manifests(&["sha256".to_owned()]).is_ok());
        assert!(p.check_manifests(&["sha512".to_owned()]).is_err());
        assert!(p.check_tag_files(|f| f == "bag-info.txt").is_ok());
        assert!(p.check_tag_files(|_| false).is_err());
    }
}
