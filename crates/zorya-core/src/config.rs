//! Pipeline configuration.
//!
//! A single `zorya.toml` describes the store, the three work areas and the
//! external collaborators. It is loaded once by a binary and handed to
//! [`Pipeline::open`](crate::Pipeline::open); nothing reads it globally.
//!
//! ```toml
//! store_dir = "/var/lib/zorya/store"
//! inbox_dir = "/var/lib/zorya/inbox"
//! working_dir = "/var/lib/zorya/working"
//! destination_dir = "/srv/archive"
//! http_timeout_secs = 30
//!
//! [origin]
//! kind = "http"
//! url = "https://origin.example.org/bags"
//!
//! [rights]
//! url = "https://rights.example.org/api/rights/"
//!
//! [delivery]
//! url = "https://ingest.example.org/api/packages/"
//!
//! [profiles]
//! dir = "/etc/zorya/profiles"
//! allow_remote = true
//! ```

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use zorya_remote::ServiceConfig;
use zorya_store::{StoreLayout, WorkAreas};

pub const DEFAULT_CONFIG_FILE: &str = "zorya.toml";
pub const CONFIG_ENV: &str = "ZORYA_CONFIG";

const RIGHTS_KEY_ENV: &str = "ZORYA_RIGHTS_API_KEY";
const DELIVERY_KEY_ENV: &str = "ZORYA_DELIVERY_API_KEY";
const ORIGIN_TOKEN_ENV: &str = "ZORYA_ORIGIN_TOKEN";

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginConfig {
    /// A local or mounted directory of candidate archives.
    Directory { path: PathBuf },
    /// A REST origin, see [`zorya_remote::HttpObjectSource`].
    Http {
        url: String,
        #[serde(default)]
        auth_token: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesConfig {
    /// Directory of profile documents named after the identifier's last segment.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Fetch `http(s)` profile identifiers not found locally.
    #[serde(default)]
    pub allow_remote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub store_dir: PathBuf,
    pub inbox_dir: PathBuf,
    pub working_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub origin: OriginConfig,
    pub rights: ServiceConfig,
    pub delivery: ServiceConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

impl PipelineConfig {
    /// Read, apply secret overrides from the environment, and validate.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut config = Self::parse(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without environment overrides or validation.
    pub fn parse(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Replace secrets with values from `lookup` where it has one.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(RIGHTS_KEY_ENV) {
            self.rights.api_key = Some(key);
        }
        if let Some(key) = lookup(DELIVERY_KEY_ENV) {
            self.delivery.api_key = Some(key);
        }
        if let Some(token) = lookup(ORIGIN_TOKEN_ENV) {
            if let OriginConfig::Http { auth_token, .. } = &mut self.origin {
                *auth_token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let roots = [
            ("store_dir", &self.store_dir),
            ("inbox_dir", &self.inbox_dir),
            ("working_dir", &self.working_dir),
            ("destination_dir", &self.destination_dir),
        ];
        for (name, path) in &roots {
            if path.as_os_str().is_empty() {
                return Err(CoreError::Config(format!("{name} must not be empty")));
            }
        }
        for (i, (a_name, a)) in roots.iter().enumerate() {
            for (b_name, b) in &roots[i + 1..] {
                if a == b {
                    return Err(CoreError::Config(format!(
                        "{a_name} and {b_name} must be distinct directories, both are {}",
                        a.display()
                    )));
                }
            }
        }

        match &self.origin {
            OriginConfig::Directory { path } if path.as_os_str().is_empty() => {
                return Err(CoreError::Config("origin.path must not be empty".to_owned()));
            }
            OriginConfig::Http { url, .. } if url.trim().is_empty() => {
                return Err(CoreError::Config("origin.url must not be empty".to_owned()));
            }
            _ => {}
        }
        if self.rights.url.trim().is_empty() {
            return Err(CoreError::Config("rights.url must not be empty".to_owned()));
        }
        if self.delivery.url.trim().is_empty() {
            return Err(CoreError::Config("delivery.url must not be empty".to_owned()));
        }
        if self.profiles.dir.is_none() && !self.profiles.allow_remote {
            return Err(CoreError::Config(
                "profiles: set `dir` or `allow_remote = true`".to_owned(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(CoreError::Config(
                "http_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn store_layout(&self) -> StoreLayout {
        StoreLayout::new(&self.store_dir)
    }

    pub fn work_areas(&self) -> WorkAreas {
        WorkAreas::new(&self.inbox_dir, &self.working_dir, &self.destination_dir)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
