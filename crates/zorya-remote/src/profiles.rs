//! Resolving `BagIt-Profile-Identifier` values to [`Profile`] documents.
//!
//! Identifiers are usually URLs. [`DirectoryProfiles`] serves them from a
//! local directory keyed by the last path segment, [`HttpProfiles`] fetches
//! the URL itself and [`ProfileChain`] tries several sources in order.

use crate::http::{check_status, read_body, transport};
use crate::{ProfileSource, RemoteError};
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use zorya_schema::Profile;

/// Last non-empty path segment of an identifier, stripped of any query.
fn profile_key(identifier: &str) -> Option<&str> {
    let path = identifier.split(['?', '#']).next().unwrap_or(identifier);
    path.rsplit('/').find(|s| !s.is_empty())
}

fn parse(identifier: &str, data: &[u8]) -> Result<Profile, RemoteError> {
    Profile::from_json(data)
        .map_err(|e| RemoteError::Serialization(format!("profile {identifier}: {e}")))
}

pub struct DirectoryProfiles {
    dir: PathBuf,
}

impl DirectoryProfiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ProfileSource for DirectoryProfiles {
    fn profile(&self, identifier: &str) -> Result<Profile, RemoteError> {
        let key = profile_key(identifier)
            .filter(|k| *k != "." && *k != "..")
            .ok_or_else(|| RemoteError::NotFound(identifier.to_owned()))?;
        let mut candidates = vec![self.dir.join(key)];
        if !key.ends_with(".json") {
            candidates.push(self.dir.join(format!("{key}.json")));
        }
        for path in candidates {
            match fs::read(&path) {
                Ok(data) => {
                    debug!("profile {identifier} from {}", path.display());
                    return parse(identifier, &data);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(RemoteError::Io(e)),
            }
        }
        Err(RemoteError::NotFound(identifier.to_owned()))
    }
}

/// Fetches profiles whose identifier is an `http(s)` URL.
pub struct HttpProfiles {
    agent: ureq::Agent,
}

impl HttpProfiles {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl ProfileSource for HttpProfiles {
    fn profile(&self, identifier: &str) -> Result<Profile, RemoteError> {
        if !(identifier.starts_with("http://") || identifier.starts_with("https://")) {
            return Err(RemoteError::NotFound(identifier.to_owned()));
        }
        debug!("GET {identifier}");
        let resp = self.agent.get(identifier).call().map_err(transport)?;
        let resp = check_status(resp, "GET", identifier)?;
        parse(identifier, &read_body(resp)?)
    }
}

/// Tries each source in turn; `NotFound` falls through to the next one.
#[derive(Default)]
pub struct ProfileChain {
    sources: Vec<Box<dyn ProfileSource>>,
}

impl ProfileChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, source: impl ProfileSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ProfileSource for ProfileChain {
    fn profile(&self, identifier: &str) -> Result<Profile, RemoteError> {
        for source in &self.sources {
            match source.profile(identifier) {
                Err(RemoteError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(RemoteError::NotFound(identifier.to_owned()))
    }
}
