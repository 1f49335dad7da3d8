use crate::http::{check_status, read_body, transport};
use crate::{ObjectSource, RemoteConfig, RemoteError};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An origin that is a local or mounted directory.
///
/// Keys are the names of regular files directly inside the directory;
/// hidden files are ignored.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, RemoteError> {
        if key.is_empty() || key.contains('/') || key.starts_with('.') {
            return Err(RemoteError::NotFound(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

fn not_found_or_io(key: &str, e: io::Error) -> RemoteError {
    if e.kind() == io::ErrorKind::NotFound {
        RemoteError::NotFound(key.to_owned())
    } else {
        RemoteError::Io(e)
    }
}

impl ObjectSource for DirectorySource {
    fn list_objects(&self) -> Result<Vec<String>, RemoteError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_owned());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn fetch_object(&self, key: &str, dest: &Path) -> Result<u64, RemoteError> {
        let src = self.object_path(key)?;
        debug!("copy {} -> {}", src.display(), dest.display());
        let mut input = File::open(&src).map_err(|e| not_found_or_io(key, e))?;
        let mut out = File::create(dest)?;
        let n = io::copy(&mut input, &mut out)?;
        out.sync_all()?;
        Ok(n)
    }

    fn delete_object(&self, key: &str) -> Result<(), RemoteError> {
        let path = self.object_path(key)?;
        fs::remove_file(&path).map_err(|e| not_found_or_io(key, e))
    }
}

/// An origin behind a small REST API.
///
/// - `GET    <url>/`      list keys (JSON array of strings)
/// - `GET    <url>/<key>` download an object
/// - `DELETE <url>/<key>` remove an object
pub struct HttpObjectSource {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl HttpObjectSource {
    pub fn new(config: RemoteConfig, agent: ureq::Agent) -> Self {
        Self { config, agent }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{key}", self.config.url)
    }

    fn auth(&self) -> Option<String> {
        self.config
            .auth_token
            .as_ref()
            .map(|token| format!("Bearer {token}"))
    }
}

impl ObjectSource for HttpObjectSource {
    fn list_objects(&self) -> Result<Vec<String>, RemoteError> {
        let url = format!("{}/", self.config.url);
        debug!("GET {url}");
        let mut req = self.agent.get(&url);
        if let Some(auth) = self.auth() {
            req = req.header("Authorization", &auth);
        }
        let resp = check_status(req.call().map_err(transport)?, "GET", &url)?;
        let mut keys: Vec<String> = serde_json::from_slice(&read_body(resp)?)
            .map_err(|e| RemoteError::Serialization(format!("object listing: {e}")))?;
        keys.sort();
        Ok(keys)
    }

    fn fetch_object(&self, key: &str, dest: &Path) -> Result<u64, RemoteError> {
        let url = self.url(key);
        debug!("GET {url} -> {}", dest.display());
        let mut req = self.agent.get(&url);
        if let Some(auth) = self.auth() {
            req = req.header("Authorization", &auth);
        }
        let resp = check_status(req.call().map_err(transport)?, "GET", &url)?;
        let mut reader = resp.into_body().into_reader();
        let mut out = BufWriter::new(File::create(dest)?);
        let n = io::copy(&mut reader, &mut out).map_err(|e| RemoteError::Http(e.to_string()))?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(n)
    }

    fn delete_object(&self, key: &str) -> Result<(), RemoteError> {
        let url = self.url(key);
        debug!("DELETE {url}");
        let mut req = self.agent.delete(&url);
        if let Some(auth) = self.auth() {
            req = req.header("Authorization", &auth);
        }
        check_status(req.call().map_err(transport)?, "DELETE", &url)?;
        Ok(())
    }
}
