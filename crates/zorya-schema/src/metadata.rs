use crate::{DateRange, Origin, TagFile};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIELD_PROFILE: &str = "BagIt-Profile-Identifier";
pub const FIELD_ORIGIN: &str = "Origin";
pub const FIELD_RIGHTS_ID: &str = "Rights-ID";
pub const FIELD_START_DATE: &str = "Start-Date";
pub const FIELD_END_DATE: &str = "End-Date";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tag file syntax error at line {line}: {reason}")]
    TagSyntax { line: usize, reason: String },
    #[error("required field '{0}' is missing from bag-info.txt")]
    MissingField(&'static str),
    #[error("invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid profile document: {0}")]
    Profile(String),
    #[error("bag does not satisfy profile '{profile}': {reason}")]
    ProfileViolation { profile: String, reason: String },
}

/// Descriptive metadata extracted from a validated `bag-info.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagMetadata {
    pub profile_identifier: String,
    pub origin: Origin,
    pub rights_ids: Vec<String>,
    pub date_range: DateRange,
}

/// Typed field update produced from [`BagMetadata`] and applied to a bag record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagUpdate {
    pub origin: Origin,
    pub rights_reference: Vec<String>,
    pub date_range: DateRange,
    pub profile_identifier: String,
}

fn required<'a>(tags: &'a TagFile, field: &'static str) -> Result<&'a str, MetadataError> {
    match tags.get(field) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim()),
        _ => Err(MetadataError::MissingField(field)),
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, MetadataError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| MetadataError::InvalidValue {
        field,
        value: value.to_owned(),
        reason: format!("expected YYYY-MM-DD ({e})"),
    })
}

impl BagMetadata {
    pub fn from_tags(tags: &TagFile) -> Result<Self, MetadataError> {
        let profile_identifier = required(tags, FIELD_PROFILE)?.to_owned();

        let origin_raw = required(tags, FIELD_ORIGIN)?;
        let origin = origin_raw
            .parse::<Origin>()
            .map_err(|e| MetadataError::InvalidValue {
                field: FIELD_ORIGIN,
                value: origin_raw.to_owned(),
                reason: e.to_string(),
            })?;

        let rights_ids: Vec<String> = required(tags, FIELD_RIGHTS_ID)?
            .split_whitespace()
            .map(str::to_owned)
            .collect();

        let end = parse_date(FIELD_END_DATE, required(tags, FIELD_END_DATE)?)?;
        let start = match tags.get(FIELD_START_DATE) {
            Some(v) if !v.trim().is_empty() => Some(parse_date(FIELD_START_DATE, v)?),
            _ => None,
        };
        let date_range = DateRange::new(start, end).ok_or_else(|| MetadataError::InvalidValue {
            field: FIELD_START_DATE,
            value: tags.get(FIELD_START_DATE).unwrap_or_default().to_owned(),
            reason: format!("start date falls after End-Date {end}"),
        })?;

        Ok(Self {
            profile_identifier,
            origin,
            rights_ids,
            date_range,
        })
    }

    pub fn into_update(self) -> BagUpdate {
        BagUpdate {
            origin: self.origin,
            rights_reference: self.rights_ids,
            date_range: self.date_range,
            profile_identifier: self.profile_identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAG_INFO: &str = "BagIt-Profile-Identifier: https://example.org/zorya.json\n\
                            Source-Organization: Example Archive\n\
                            Origin: digitization\n\
                            Rights-ID: 12 47\n\
                            Start-Date: 1950-01-01\n\
                            End-Date: 1969-12-31\n";

    #[test]
    fn extracts_typed_fields() {
        let meta = BagMetadata::from_tags(&TagFile::parse(BAG_INFO).unwrap()).unwrap();
        assert_eq!(meta.origin, Origin::Digitization);
        assert_eq!(meta.rights_ids, vec!["12", "47"]);
        assert_eq!(meta.date_range.start, NaiveDate::from_ymd_opt(1950, 1, 1));
        assert_eq!(
            meta.date_range.end,
            NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()
        );
    }

    #[test]
    fn start_date_is_optional() {
        let text = BAG_INFO.replace("Start-Date: 1950-01-01\n", "");
        let meta = BagMetadata::from_tags(&TagFile::parse(&text).unwrap()).unwrap();
        assert!(meta.date_range.start.is_none());
    }

    #[test]
    fn missing_end_date_is_reported() {
        let text = BAG_INFO.replace("End-Date: 1969-12-31\n", "");
        let err = BagMetadata::from_tags(&TagFile::parse(&text).unwrap()).unwrap_err();
        assert!(matches!(err, MetadataError::MissingField(FIELD_END_DATE)));
    }

    #[test]
    fn bad_values_name_the_field() {
        let text = BAG_INFO.replace("Origin: digitization", "Origin: aurora");
        let err = BagMetadata::from_tags(&TagFile::parse(&text).unwrap()).unwrap_err();
        assert!(err.to_string().contains("Origin"));

        let text = BAG_INFO.replace("End-Date: 1969-12-31", "End-Date: 31/12/1969");
        let err = BagMetadata::from_tags(&TagFile::parse(&text).unwrap()).unwrap_err();
        assert!(err.to_string().contains("End-Date"));
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let text = BAG_INFO.replace("Start-Date: 1950-01-01", "Start-Date: 1970-01-01");
        assert!(BagMetadata::from_tags(&TagFile::parse(&text).unwrap()).is_err());
    }

    #[test]
    fn update_carries_every_field() {
        let meta = BagMetadata::from_tags(&TagFile::parse(BAG_INFO).unwrap()).unwrap();
        let update = meta.clone().into_update();
        assert_eq!(update.origin, meta.origin);
        assert_eq!(update.rights_reference, meta.rights_ids);
        assert_eq!(update.date_range, meta.date_range);
        assert_eq!(update.profile_identifier, meta.profile_identifier);
    }

    #[test]
    fn reads_bag_info_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bag-info.txt");
        std::fs::write(&path, BAG_INFO).unwrap();
        let tags = TagFile::read(&path).unwrap();
        assert!(BagMetadata::from_tags(&tags).is_ok());

        let err = TagFile::read(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, MetadataError::Read { .. }));
    }
}
