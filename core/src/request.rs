//! Assembly of signed requests.
//!
//! # Design
//! `build_at` is pure: given a timestamp it produces the same `HttpRequest`
//! every time. `build` wraps it with a lookup of the corrected server time,
//! which may cost one `/auth/time` round-trip on first use. The signature is
//! computed per request and never cached.

use std::sync::Arc;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::signature::sign;
use crate::time::ServerTimeSync;
use crate::types::{Credentials, Payload};

pub const APPLICATION_HEADER: &str = "X-Ovh-Application";
pub const CONSUMER_HEADER: &str = "X-Ovh-Consumer";
pub const TIMESTAMP_HEADER: &str = "X-Ovh-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Ovh-Signature";

/// Path of the unauthenticated server clock endpoint.
pub const TIME_PATH: &str = "/auth/time";

/// Turns (method, path, payload) into a fully signed `HttpRequest`.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequestBuilder {
    base_url: String,
    credentials: Credentials,
    time_sync: Arc<ServerTimeSync>,
}

impl AuthenticatedRequestBuilder {
    pub fn new(base_url: &str, credentials: Credentials, time_sync: Arc<ServerTimeSync>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            time_sync,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn time_sync(&self) -> &Arc<ServerTimeSync> {
        &self.time_sync
    }

    /// Same builder, different consumer key. The time delta stays shared.
    pub fn with_consumer_key(&self, consumer_key: impl Into<String>) -> Self {
        let mut builder = self.clone();
        builder.credentials.consumer_key = consumer_key.into();
        builder
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sign with the corrected server time, syncing first if needed.
    pub fn build(
        &self,
        transport: &dyn Transport,
        method: HttpMethod,
        path: &str,
        payload: &Payload,
    ) -> Result<HttpRequest, ApiError> {
        let timestamp = self.time_sync.current_server_timestamp(transport)?;
        Ok(self.build_at(method, path, payload, timestamp))
    }

    /// Sign with an explicit server timestamp.
    pub fn build_at(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &Payload,
        timestamp: i64,
    ) -> HttpRequest {
        let url = self.url_for(path);
        let signature = sign(
            &self.credentials.application_secret,
            &self.credentials.consumer_key,
            method,
            &url,
            payload.signed_body(),
            timestamp,
        );
        let mut request = self.build_unauthenticated(method, path, payload);
        request.headers.extend([
            (CONSUMER_HEADER.to_string(), self.credentials.consumer_key.clone()),
            (TIMESTAMP_HEADER.to_string(), timestamp.to_string()),
            (SIGNATURE_HEADER.to_string(), signature),
        ]);
        request
    }

    /// Only the application header; for calls such as `/auth/credential`
    /// that precede having a consumer key.
    pub fn build_unauthenticated(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &Payload,
    ) -> HttpRequest {
        let mut headers = vec![(
            APPLICATION_HEADER.to_string(),
            self.credentials.application_key.clone(),
        )];
        if payload.body().is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            url: self.url_for(path),
            headers,
            body: payload.body().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedTimeSource;

    const ENDPOINT: &str = "https://eu.api.ovh.com/1.0";
    const SERVER_TS: i64 = 1566485767;

    fn builder() -> AuthenticatedRequestBuilder {
        let clock = Arc::new(FixedTimeSource::from_timestamp(1566485765).unwrap());
        let sync = Arc::new(ServerTimeSync::new(format!("{ENDPOINT}{TIME_PATH}"), clock));
        AuthenticatedRequestBuilder::new(
            ENDPOINT,
            Credentials::new("APPLICATION_KEY", "APPLICATION_SECRET", "CONSUMER_KEY"),
            sync,
        )
    }

    #[test]
    fn build_at_attaches_auth_headers() {
        let req = builder().build_at(HttpMethod::Put, "/me/contact", &Payload::raw("Fake content"), SERVER_TS);
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "https://eu.api.ovh.com/1.0/me/contact");
        assert_eq!(req.body.as_deref(), Some("Fake content"));
        assert_eq!(req.header(APPLICATION_HEADER), Some("APPLICATION_KEY"));
        assert_eq!(req.header(CONSUMER_HEADER), Some("CONSUMER_KEY"));
        assert_eq!(req.header(TIMESTAMP_HEADER), Some("1566485767"));
        assert_eq!(
            req.header(SIGNATURE_HEADER),
            Some("$1$5e81842c0f0c806fd703de084d80192a59bc0f8a")
        );
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn absent_payload_sends_no_body() {
        let req = builder().build_at(HttpMethod::Put, "/me/contact", &Payload::Absent, SERVER_TS);
        assert!(req.body.is_none());
        assert!(req.header("Content-Type").is_none());
        assert_eq!(
            req.header(SIGNATURE_HEADER),
            Some("$1$5595b180f954de130f8da7a5a4b55adc3d27556f")
        );
    }

    #[test]
    fn absent_and_empty_raw_sign_identically() {
        let b = builder();
        let absent = b.build_at(HttpMethod::Post, "/me", &Payload::Absent, SERVER_TS);
        let empty = b.build_at(HttpMethod::Post, "/me", &Payload::raw(""), SERVER_TS);
        assert_eq!(absent.header(SIGNATURE_HEADER), empty.header(SIGNATURE_HEADER));
    }

    #[test]
    fn each_auth_header_appears_once() {
        let req = builder().build_at(HttpMethod::Get, "/me", &Payload::Absent, SERVER_TS);
        for name in [APPLICATION_HEADER, CONSUMER_HEADER, TIMESTAMP_HEADER, SIGNATURE_HEADER] {
            assert_eq!(req.header_values(name).len(), 1, "{name}");
        }
    }

    #[test]
    fn unauthenticated_has_only_application_header() {
        let req = builder().build_unauthenticated(HttpMethod::Post, "/auth/credential", &Payload::raw("{}"));
        assert_eq!(req.header(APPLICATION_HEADER), Some("APPLICATION_KEY"));
        assert!(req.header(SIGNATURE_HEADER).is_none());
        assert!(req.header(CONSUMER_HEADER).is_none());
        assert!(req.header(TIMESTAMP_HEADER).is_none());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let b = builder();
        let b = AuthenticatedRequestBuilder::new(
            "https://eu.api.ovh.com/1.0/",
            b.credentials().clone(),
            b.time_sync().clone(),
        );
        assert_eq!(b.url_for("/me"), "https://eu.api.ovh.com/1.0/me");
    }

    #[test]
    fn consumer_key_swap_shares_time_sync() {
        let b = builder();
        let other = b.with_consumer_key("NEW_KEY");
        assert_eq!(other.credentials().consumer_key, "NEW_KEY");
        assert!(Arc::ptr_eq(b.time_sync(), other.time_sync()));
        b.time_sync().set_delta(2);
        assert_eq!(other.time_sync().delta(), Some(2));
    }
}
