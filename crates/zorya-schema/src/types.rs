//! Newtype wrappers and small value types shared by every Zorya crate.
//!
//! Identifier newtypes serialize/deserialize as plain strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Opaque identifier assigned to a bag when it is first claimed by the pipeline.
    BagId
);

string_newtype!(
    /// Name of a bag as first observed at its origin (remote object key or inbox filename).
    OriginalName
);

impl BagId {
    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Provenance class of a bag, read from its `Origin` bag-info field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    LegacyDigital,
    Digitization,
}

impl Origin {
    pub const ALL: [Origin; 2] = [Origin::LegacyDigital, Origin::Digitization];

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::LegacyDigital => "legacy_digital",
            Origin::Digitization => "digitization",
        }
    }

    /// Human-readable label, as shown to operators.
    pub fn label(self) -> &'static str {
        match self {
            Origin::LegacyDigital => "Legacy Digital Processing",
            Origin::Digitization => "Digitization",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown origin '{0}', expected one of: legacy_digital, digitization")]
pub struct UnknownOrigin(pub String);

impl FromStr for Origin {
    type Err = UnknownOrigin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "legacy_digital" => Ok(Origin::LegacyDigital),
            "digitization" => Ok(Origin::Digitization),
            other => Err(UnknownOrigin(other.to_owned())),
        }
    }
}

/// Inclusive date bounds sent to the rights service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` falls after `end`.
    pub fn new(start: Option<NaiveDate>, end: NaiveDate) -> Option<Self> {
        match start {
            Some(s) if s > end => None,
            _ => Some(Self { start, end }),
        }
    }
}
