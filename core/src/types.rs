//! Credentials, request payloads, and the consumer-key DTOs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::HttpMethod;

/// The three values that identify an application and the account acting
/// through it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
}

impl Credentials {
    pub fn new(
        application_key: impl Into<String>,
        application_secret: impl Into<String>,
        consumer_key: impl Into<String>,
    ) -> Self {
        Self {
            application_key: application_key.into(),
            application_secret: application_secret.into(),
            consumer_key: consumer_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("application_key", &self.application_key)
            .field("application_secret", &"<redacted>")
            .field("consumer_key", &self.consumer_key)
            .finish()
    }
}

/// Request body as the caller supplied it.
///
/// `Raw` text is sent and signed verbatim. `Json` holds the serialized form
/// of a typed value (see `Payload::json`). `Absent` sends no body and signs
/// the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    Absent,
    Raw(String),
    Json(String),
}

impl Payload {
    pub fn raw(body: impl Into<String>) -> Self {
        Payload::Raw(body.into())
    }

    /// Serialize `value` to JSON text.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_string(value)
            .map(Payload::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// Text to put on the wire, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Payload::Absent => None,
            Payload::Raw(body) | Payload::Json(body) => Some(body),
        }
    }

    /// Text that goes into the signature pre-image.
    pub fn signed_body(&self) -> &str {
        self.body().unwrap_or("")
    }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self {
        Payload::Raw(body.to_string())
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Payload::Raw(body)
    }
}

/// One permission requested for a new consumer key. `path` may end with `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub method: HttpMethod,
    pub path: String,
}

impl AccessRule {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

/// Body of `POST /auth/credential`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub access_rules: Vec<AccessRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirection: Option<String>,
}

impl CredentialRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, method: HttpMethod, path: impl Into<String>) -> Self {
        self.access_rules.push(AccessRule::new(method, path));
        self
    }

    /// Grant all four verbs on `path`.
    pub fn allow_all(self, path: &str) -> Self {
        [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete]
            .into_iter()
            .fold(self, |request, method| request.allow(method, path))
    }

    pub fn redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirection = Some(url.into());
        self
    }
}

/// Response of `POST /auth/credential`. The key is unusable until the user
/// visits `validation_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerKeyGrant {
    pub validation_url: String,
    pub consumer_key: String,
    pub state: String,
}
