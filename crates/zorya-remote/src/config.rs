use serde::{Deserialize, Serialize};

/// An HTTP origin holding candidate bag objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }
}

/// A JSON service endpoint authenticated with an `apikey` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ServiceConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            api_key: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_owned());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_config_strips_trailing_slash() {
        let config = RemoteConfig::new("https://origin.example.com/bags/").with_token("t");
        assert_eq!(config.url, "https://origin.example.com/bags");
        assert_eq!(config.auth_token.as_deref(), Some("t"));
    }

    #[test]
    fn service_config_deserializes_without_key() {
        let config: ServiceConfig = serde_json::from_str(r#"{"url": "http://r/"}"#).unwrap();
        assert_eq!(config, ServiceConfig::new("http://r/"));
    }
}
