//! Network and origin collaborators of the Zorya pipeline.
//!
//! This crate provides the `ObjectSource` trait with directory- and
//! HTTP-backed origins, the `RightsClient` and `DeliveryClient` for the
//! external rights and delivery services, and `ProfileSource`
//! implementations that resolve BagIt profiles by identifier.

pub mod config;
pub mod delivery;
pub mod http;
pub mod profiles;
pub mod rights;
pub mod source;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{RemoteConfig, ServiceConfig};
pub use delivery::{DeliveryClient, DeliveryNotice};
pub use profiles::{DirectoryProfiles, HttpProfiles, ProfileChain};
pub use rights::RightsClient;
pub use source::{DirectorySource, HttpObjectSource};

use std::path::Path;
use thiserror::Error;
use zorya_schema::Profile;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP {code} {reason} from {url}")]
    Status {
        code: u16,
        reason: String,
        url: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("remote config error: {0}")]
    Config(String),
}

/// Where candidate bags are listed and fetched from.
pub trait ObjectSource: Send + Sync {
    /// Keys of every object currently at the origin.
    fn list_objects(&self) -> Result<Vec<String>, RemoteError>;

    /// Copy object `key` to `dest`. Returns the number of bytes written.
    fn fetch_object(&self, key: &str, dest: &Path) -> Result<u64, RemoteError>;

    /// Remove object `key` from the origin.
    fn delete_object(&self, key: &str) -> Result<(), RemoteError>;
}

/// Resolves a `BagIt-Profile-Identifier` to its rule set.
pub trait ProfileSource: Send + Sync {
    fn profile(&self, identifier: &str) -> Result<Profile, RemoteError>;
}
