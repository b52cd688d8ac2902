//! Endpoints and client configuration.
//!
//! Configuration comes either from any serde source (`ClientConfig` derives
//! `Deserialize`) or from `OVH_*` environment variables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::types::Credentials;

/// Seconds before the default transport gives up on a call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// A named API deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    OvhEu,
    OvhCa,
    OvhUs,
    KimsufiEu,
    KimsufiCa,
    SoyoustartEu,
    SoyoustartCa,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::OvhEu,
        Endpoint::OvhCa,
        Endpoint::OvhUs,
        Endpoint::KimsufiEu,
        Endpoint::KimsufiCa,
        Endpoint::SoyoustartEu,
        Endpoint::SoyoustartCa,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::OvhEu => "ovh-eu",
            Endpoint::OvhCa => "ovh-ca",
            Endpoint::OvhUs => "ovh-us",
            Endpoint::KimsufiEu => "kimsufi-eu",
            Endpoint::KimsufiCa => "kimsufi-ca",
            Endpoint::SoyoustartEu => "soyoustart-eu",
            Endpoint::SoyoustartCa => "soyoustart-ca",
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Endpoint::OvhEu => "https://eu.api.ovh.com/1.0",
            Endpoint::OvhCa => "https://ca.api.ovh.com/1.0",
            Endpoint::OvhUs => "https://api.us.ovhcloud.com/1.0",
            Endpoint::KimsufiEu => "https://eu.api.kimsufi.com/1.0",
            Endpoint::KimsufiCa => "https://ca.api.kimsufi.com/1.0",
            Endpoint::SoyoustartEu => "https://eu.api.soyoustart.com/1.0",
            Endpoint::SoyoustartCa => "https://ca.api.soyoustart.com/1.0",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| endpoint.name() == s)
            .ok_or_else(|| ApiError::Config(format!("unknown endpoint: '{s}'")))
    }
}

/// Map an endpoint name or an explicit http(s) URL to a base URL without a
/// trailing slash.
pub fn resolve_endpoint(endpoint: &str) -> Result<String, ApiError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.trim_end_matches('/').to_string());
    }
    endpoint.parse::<Endpoint>().map(|e| e.url().to_string())
}

/// Everything needed to construct a `Client`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Endpoint name (`ovh-eu`, ...) or base URL.
    pub endpoint: String,
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.into(),
            application_key: credentials.application_key,
            application_secret: credentials.application_secret,
            consumer_key: credentials.consumer_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read `OVH_ENDPOINT`, `OVH_APPLICATION_KEY`, `OVH_APPLICATION_SECRET`,
    /// `OVH_CONSUMER_KEY` and optionally `OVH_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ApiError::Config(format!("{name} is not set")))
        };
        let timeout_secs = match lookup("OVH_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::Config(format!("OVH_TIMEOUT_SECS is not a number: '{raw}'")))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            endpoint: require("OVH_ENDPOINT")?,
            application_key: require("OVH_APPLICATION_KEY")?,
            application_secret: require("OVH_APPLICATION_SECRET")?,
            consumer_key: require("OVH_CONSUMER_KEY")?,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> Result<String, ApiError> {
        resolve_endpoint(&self.endpoint)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.application_key.clone(),
            self.application_secret.clone(),
            self.consumer_key.clone(),
        )
    }
}
