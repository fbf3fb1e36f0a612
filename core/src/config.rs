//! Client configuration.

use serde::Deserialize;

use crate::auth::Credentials;
use crate::error::DecodeError;
use crate::transport::TransportConfig;

/// Settings for building a [`FhirClient`](crate::FhirClient).
///
/// ```json
/// {
///   "base_url": "https://hapi.example.org/fhir",
///   "username": "reader",
///   "password": "",
///   "transport": { "timeout_secs": 30 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: String::new(),
            password: String::new(),
            transport: TransportConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}
