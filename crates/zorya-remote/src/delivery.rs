use crate::http::{check_status, transport};
use crate::{RemoteError, ServiceConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body posted to the downstream system once a package is archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNotice {
    pub package_location: String,
    pub origin: String,
    pub identifier: String,
}

pub struct DeliveryClient {
    config: ServiceConfig,
    agent: ureq::Agent,
}

impl DeliveryClient {
    pub fn new(config: ServiceConfig, agent: ureq::Agent) -> Self {
        Self { config, agent }
    }

    pub fn deliver(&self, notice: &DeliveryNotice) -> Result<(), RemoteError> {
        let body =
            serde_json::to_vec(notice).map_err(|e| RemoteError::Serialization(e.to_string()))?;
        let url = &self.config.url;
        debug!("POST {url} for {}", notice.identifier);
        let mut req = self
            .agent
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            req = req.header("apikey", key);
        }
        check_status(req.send(&body[..]).map_err(transport)?, "POST", url)?;
        Ok(())
    }
}
