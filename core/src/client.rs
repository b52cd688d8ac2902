//! Verb-shaped entry points over signed requests.
//!
//! # Design
//! `Client` owns an `AuthenticatedRequestBuilder` and a `Transport`. Each
//! call builds a signed request (syncing the server clock on first use),
//! sends it, maps non-2xx statuses to `ApiError::Http`, and then either
//! returns the body as-is (`*_raw`) or deserializes it into the caller's
//! type. Cloning a client shares the transport and the cached time delta.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpResponse, Transport};
use crate::request::{AuthenticatedRequestBuilder, TIME_PATH};
use crate::time::{ServerTimeSync, SystemTimeSource, TimeSource};
use crate::types::{ConsumerKeyGrant, CredentialRequest, Credentials, Payload};

const CREDENTIAL_PATH: &str = "/auth/credential";

/// Signed API client.
#[derive(Clone)]
pub struct Client {
    builder: AuthenticatedRequestBuilder,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Client over the default ureq transport. `endpoint` is a name such as
    /// `ovh-eu` or a base URL.
    #[cfg(feature = "ureq-transport")]
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_transport(endpoint, credentials, Arc::new(crate::transport::UreqTransport::new()))
    }

    #[cfg(feature = "ureq-transport")]
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self, ApiError> {
        let timeout = std::time::Duration::from_secs(config.timeout_secs);
        Self::with_transport(
            &config.endpoint,
            config.credentials(),
            Arc::new(crate::transport::UreqTransport::with_timeout(timeout)),
        )
    }

    pub fn with_transport(
        endpoint: &str,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ApiError> {
        let base_url = crate::config::resolve_endpoint(endpoint)?;
        let time_sync = ServerTimeSync::new(format!("{base_url}{TIME_PATH}"), Arc::new(SystemTimeSource));
        Ok(Self {
            builder: AuthenticatedRequestBuilder::new(&base_url, credentials, Arc::new(time_sync)),
            transport,
        })
    }

    /// Replace the clock. Starts from an empty time delta.
    pub fn with_time_source(self, clock: Arc<dyn TimeSource>) -> Self {
        let time_url = self.builder.time_sync().time_url().to_string();
        let time_sync = Arc::new(ServerTimeSync::new(time_url, clock));
        Self {
            builder: AuthenticatedRequestBuilder::new(
                self.builder.base_url(),
                self.builder.credentials().clone(),
                time_sync,
            ),
            transport: self.transport,
        }
    }

    /// A client acting as another consumer, e.g. one freshly granted by
    /// `request_consumer_key`.
    pub fn with_consumer_key(&self, consumer_key: impl Into<String>) -> Self {
        Self {
            builder: self.builder.with_consumer_key(consumer_key),
            transport: Arc::clone(&self.transport),
        }
    }

    pub fn base_url(&self) -> &str {
        self.builder.base_url()
    }

    pub fn time_sync(&self) -> &ServerTimeSync {
        self.builder.time_sync()
    }

    /// Force a fresh `/auth/time` round-trip.
    pub fn sync_time(&self) -> Result<i64, ApiError> {
        self.builder.time_sync().sync(self.transport.as_ref())
    }

    /// Send a signed request and return the response if it is 2xx.
    pub fn call(
        &self,
        method: HttpMethod,
        path: &str,
        payload: impl Into<Payload>,
    ) -> Result<HttpResponse, ApiError> {
        let payload = payload.into();
        let request = self
            .builder
            .build(self.transport.as_ref(), method, path, &payload)?;
        debug!(%method, url = %request.url, "sending signed request");
        let response = self.transport.send(&request)?;
        check_status(method, &request.url, response)
    }

    pub fn request_raw(
        &self,
        method: HttpMethod,
        path: &str,
        payload: impl Into<Payload>,
    ) -> Result<String, ApiError> {
        self.call(method, path, payload).map(|response| response.body)
    }

    pub fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        payload: impl Into<Payload>,
    ) -> Result<T, ApiError> {
        let body = self.request_raw(method, path, payload)?;
        parse_body(&body)
    }

    pub fn get_raw(&self, path: &str) -> Result<String, ApiError> {
        self.request_raw(HttpMethod::Get, path, Payload::Absent)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(HttpMethod::Get, path, Payload::Absent)
    }

    pub fn put_raw(&self, path: &str, payload: impl Into<Payload>) -> Result<String, ApiError> {
        self.request_raw(HttpMethod::Put, path, payload)
    }

    pub fn put<T: DeserializeOwned>(&self, path: &str, payload: impl Into<Payload>) -> Result<T, ApiError> {
        self.request(HttpMethod::Put, path, payload)
    }

    pub fn post_raw(&self, path: &str, payload: impl Into<Payload>) -> Result<String, ApiError> {
        self.request_raw(HttpMethod::Post, path, payload)
    }

    pub fn post<T: DeserializeOwned>(&self, path: &str, payload: impl Into<Payload>) -> Result<T, ApiError> {
        self.request(HttpMethod::Post, path, payload)
    }

    pub fn delete_raw(&self, path: &str) -> Result<String, ApiError> {
        self.request_raw(HttpMethod::Delete, path, Payload::Absent)
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(HttpMethod::Delete, path, Payload::Absent)
    }

    /// Ask for a new consumer key with the given rights. This call is not
    /// signed; the returned key must be validated by the user before use.
    pub fn request_consumer_key(&self, request: &CredentialRequest) -> Result<ConsumerKeyGrant, ApiError> {
        let payload = Payload::json(request)?;
        let request = self
            .builder
            .build_unauthenticated(HttpMethod::Post, CREDENTIAL_PATH, &payload);
        debug!(url = %request.url, "requesting consumer key");
        let response = self.transport.send(&request)?;
        let response = check_status(HttpMethod::Post, &request.url, response)?;
        parse_body(&response.body)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

fn check_status(method: HttpMethod, url: &str, response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    warn!(%method, %url, status = response.status, "request rejected");
    Err(ApiError::Http {
        status: response.status,
        body: response.body,
    })
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}
