use crate::config::{OriginConfig, PipelineConfig};
use crate::validate::{BagItValidator, BagValidator};
use crate::CoreError;
use zorya_remote::http::build_agent;
use zorya_remote::{
    DeliveryClient, DirectoryProfiles, DirectorySource, HttpObjectSource, HttpProfiles,
    ObjectSource, ProfileChain, RemoteConfig, RightsClient,
};

/// External collaborators the stage actions call.
pub struct Services {
    pub origin: Box<dyn ObjectSource>,
    pub validator: Box<dyn BagValidator>,
    pub rights: RightsClient,
    pub delivery: DeliveryClient,
}

impl Services {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, CoreError> {
        let agent = build_agent(config.http_timeout());

        let origin: Box<dyn ObjectSource> = match &config.origin {
            OriginConfig::Directory { path } => Box::new(DirectorySource::new(path)),
            OriginConfig::Http { url, auth_token } => {
                let mut remote = RemoteConfig::new(url);
                if let Some(token) = auth_token {
                    remote = remote.with_token(token);
                }
                Box::new(HttpObjectSource::new(remote, agent.clone()))
            }
        };

        let mut profiles = ProfileChain::new();
        if let Some(dir) = &config.profiles.dir {
            profiles = profiles.with(DirectoryProfiles::new(dir));
        }
        if config.profiles.allow_remote {
            profiles = profiles.with(HttpProfiles::new(agent.clone()));
        }
        if profiles.is_empty() {
            return Err(CoreError::Config("no profile source configured".to_owned()));
        }

        Ok(Self {
            origin,
            validator: Box::new(BagItValidator::new(profiles)),
            rights: RightsClient::new(config.rights.clone(), agent.clone()),
            delivery: DeliveryClient::new(config.delivery.clone(), agent),
        })
    }
}
