// Credentials
// Supplies the subscription key and base URL to the detection client

use super::config_store::{ConfigError, ServiceConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
}

pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Result<Credentials, ConfigError>;
}

/// Fixed credentials, mainly for tests and command-line overrides.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self(Credentials {
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, ConfigError> {
        check(Some(&self.0.api_key), Some(&self.0.base_url))
    }
}

/// Credentials resolved from the service section of the loaded config.
#[derive(Debug, Clone)]
pub struct ConfigCredentials {
    service: ServiceConfig,
}

impl ConfigCredentials {
    pub fn new(service: ServiceConfig) -> Self {
        Self { service }
    }
}

impl CredentialSource for ConfigCredentials {
    fn credentials(&self) -> Result<Credentials, ConfigError> {
        check(self.service.api_key.as_ref(), self.service.base_url.as_ref())
    }
}

fn check(api_key: Option<&String>, base_url: Option<&String>) -> Result<Credentials, ConfigError> {
    let api_key = api_key
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingApiKey)?;
    let base_url = base_url
        .map(|u| u.trim().trim_end_matches('/'))
        .filter(|u| !u.is_empty())
        .ok_or(ConfigError::MissingBaseUrl)?;

    Ok(Credentials {
        api_key: api_key.to_string(),
        base_url: base_url.to_string(),
    })
}
