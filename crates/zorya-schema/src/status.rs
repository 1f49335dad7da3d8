use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline status of a bag record.
///
/// Stable statuses alternate with the in-progress markers that claim a bag
/// while a stage works on it. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BagStatus {
    Fetching,
    Fetched,
    Discovering,
    Discovered,
    AssigningRights,
    RightsAssigned,
    Packaging,
    Packaged,
    Archiving,
    Archived,
    Delivering,
    Delivered,
}

impl BagStatus {
    pub const ALL: [BagStatus; 12] = [
        BagStatus::Fetching,
        BagStatus::Fetched,
        BagStatus::Discovering,
        BagStatus::Discovered,
        BagStatus::AssigningRights,
        BagStatus::RightsAssigned,
        BagStatus::Packaging,
        BagStatus::Packaged,
        BagStatus::Archiving,
        BagStatus::Archived,
        BagStatus::Delivering,
        BagStatus::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BagStatus::Fetching => "fetching",
            BagStatus::Fetched => "fetched",
            BagStatus::Discovering => "discovering",
            BagStatus::Discovered => "discovered",
            BagStatus::AssigningRights => "assigning_rights",
            BagStatus::RightsAssigned => "rights_assigned",
            BagStatus::Packaging => "packaging",
            BagStatus::Packaged => "packaged",
            BagStatus::Archiving => "archiving",
            BagStatus::Archived => "archived",
            BagStatus::Delivering => "delivering",
            BagStatus::Delivered => "delivered",
        }
    }

    /// Whether this status is a transient claim marker.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            BagStatus::Fetching
                | BagStatus::Discovering
                | BagStatus::AssigningRights
                | BagStatus::Packaging
                | BagStatus::Archiving
                | BagStatus::Delivering
        )
    }

    /// The stable status a claim marker reverts to. `None` for stable
    /// statuses and for `Fetching`, whose record did not exist before the claim.
    pub fn rollback_target(self) -> Option<BagStatus> {
        match self {
            BagStatus::Discovering => Some(BagStatus::Fetched),
            BagStatus::AssigningRights => Some(BagStatus::Discovered),
            BagStatus::Packaging => Some(BagStatus::RightsAssigned),
            BagStatus::Archiving => Some(BagStatus::Packaged),
            BagStatus::Delivering => Some(BagStatus::Archived),
            _ => None,
        }
    }

    /// The stable status a claim marker advances to on success.
    pub fn completion_target(self) -> Option<BagStatus> {
        match self {
            BagStatus::Fetching => Some(BagStatus::Fetched),
            BagStatus::Discovering => Some(BagStatus::Discovered),
            BagStatus::AssigningRights => Some(BagStatus::RightsAssigned),
            BagStatus::Packaging => Some(BagStatus::Packaged),
            BagStatus::Archiving => Some(BagStatus::Archived),
            BagStatus::Delivering => Some(BagStatus::Delivered),
            _ => None,
        }
    }

    /// The status that follows this one in pipeline order.
    pub fn next(self) -> Option<BagStatus> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for BagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bag status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for BagStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

/// A triggerable pipeline stage and the status triple it moves a bag through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Discover,
    Rights,
    Package,
    Archive,
    Deliver,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Fetch,
        Stage::Discover,
        Stage::Rights,
        Stage::Package,
        Stage::Archive,
        Stage::Deliver,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Discover => "discover",
            Stage::Rights => "rights",
            Stage::Package => "package",
            Stage::Archive => "archive",
            Stage::Deliver => "deliver",
        }
    }

    /// Eligible input status. `None` for intake, which starts from no record.
    pub fn start(self) -> Option<BagStatus> {
        self.in_progress().rollback_target()
    }

    pub fn in_progress(self) -> BagStatus {
        match self {
            Stage::Fetch => BagStatus::Fetching,
            Stage::Discover => BagStatus::Discovering,
            Stage::Rights => BagStatus::AssigningRights,
            Stage::Package => BagStatus::Packaging,
            Stage::Archive => BagStatus::Archiving,
            Stage::Deliver => BagStatus::Delivering,
        }
    }

    pub fn end(self) -> BagStatus {
        match self {
            Stage::Fetch => BagStatus::Fetched,
            Stage::Discover => BagStatus::Discovered,
            Stage::Rights => BagStatus::RightsAssigned,
            Stage::Package => BagStatus::Packaged,
            Stage::Archive => BagStatus::Archived,
            Stage::Deliver => BagStatus::Delivered,
        }
    }

    /// The stage that claims bags in `status`, if it is an in-progress marker.
    pub fn for_marker(status: BagStatus) -> Option<Stage> {
        Self::ALL.into_iter().find(|s| s.in_progress() == status)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}', expected one of: fetch, discover, rights, package, archive, deliver")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_owned()))
    }
}
