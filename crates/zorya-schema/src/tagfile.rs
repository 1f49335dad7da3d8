//! BagIt tag files (`bagit.txt`, `bag-info.txt`).
//!
//! Each element is `Label: value`. A line starting with whitespace continues
//! the previous value. Labels may repeat; order is preserved.

use crate::MetadataError;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFile {
    entries: Vec<(String, String)>,
}

impl TagFile {
    pub fn parse(input: &str) -> Result<Self, MetadataError> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let mut entries: Vec<(String, String)> = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                let Some((_, value)) = entries.last_mut() else {
                    return Err(MetadataError::TagSyntax {
                        line: idx + 1,
                        reason: "continuation line before any label".to_owned(),
                    });
                };
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
            let Some((label, value)) = line.split_once(':') else {
                return Err(MetadataError::TagSyntax {
                    line: idx + 1,
                    reason: format!("expected 'Label: value', got '{line}'"),
                });
            };
            let label = label.trim();
            if label.is_empty() {
                return Err(MetadataError::TagSyntax {
                    line: idx + 1,
                    reason: "empty label".to_owned(),
                });
            }
            entries.push((label.to_owned(), value.trim().to_owned()));
        }
        Ok(Self { entries })
    }

    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        let content = fs::read_to_string(path).map_err(|e| MetadataError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// First value for `label`, compared case-insensitively.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.entries.push((label.into(), value.into()));
    }

    /// Render back to tag-file text, one element per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (label, value) in &self.entries {
            out.push_str(label);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}
