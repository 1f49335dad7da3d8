//! Stage-transition engine for the Zorya preservation pipeline.
//!
//! This crate ties the record store, work areas and remote collaborators
//! together into the `Pipeline`: six single-flight stages (fetch, discover,
//! rights, package, archive, deliver) that each claim at most one bag per
//! run, act on it and either advance or roll back its status. It also
//! provides BagIt structure and profile validation, pipeline configuration,
//! advisory store locking and lifecycle transition checks.

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod services;
mod stages;
pub mod validate;

pub use concurrency::{install_signal_handler, shutdown_requested, StoreLock};
pub use config::{OriginConfig, PipelineConfig, ProfilesConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
pub use engine::{FailurePolicy, Pipeline, RecoveryReport, StageOutcome, StageSpec};
pub use lifecycle::validate_transition;
pub use services::Services;
pub use validate::{BagItValidator, BagValidator, ValidationError};

use thiserror::Error;
use zorya_schema::Stage;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] zorya_store::StoreError),
    #[error("remote error: {0}")]
    Remote(#[from] zorya_remote::RemoteError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("manifest error: {0}")]
    Manifest(#[from] zorya_schema::ManifestError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("{0} stage is running; try again once it finishes")]
    StageActive(Stage),
    #[error("bag '{0}' is missing data required by this stage: {1}")]
    Incomplete(String, String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{stage} failed for bag {identifier} ('{original_name}'): {source}")]
    Stage {
        stage: Stage,
        identifier: String,
        original_name: String,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// The error a stage run ended with, without the stage/bag wrapper.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_names_stage_bag_and_artifact() {
        let e = CoreError::Stage {
            stage: Stage::Discover,
            identifier: "b-1".to_owned(),
            original_name: "x.tar".to_owned(),
            source: Box::new(CoreError::Config("boom".to_owned())),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("discover failed"), "{msg}");
        assert!(msg.contains("b-1"));
        assert!(msg.contains("x.tar"));
        assert!(msg.contains("boom"));
        assert!(matches!(e.root(), CoreError::Config(_)));
    }

    #[test]
    fn remote_status_reason_survives_wrapping() {
        let e = CoreError::Stage {
            stage: Stage::Rights,
            identifier: "b-2".to_owned(),
            original_name: "y.tgz".to_owned(),
            source: Box::new(CoreError::Remote(zorya_remote::RemoteError::Status {
                code: 400,
                reason: "Bad Request: foobar".to_owned(),
                url: "http://rights/".to_owned(),
            })),
        };
        assert!(e.to_string().contains("foobar"));
    }
}
