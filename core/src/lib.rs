//! Signed REST client core for the OVHcloud API.
//!
//! # Overview
//! Every authenticated call carries four headers: the application key, the
//! consumer key, a timestamp, and a SHA-1 based signature over the method,
//! full URL, body and timestamp. The timestamp is the server's clock, not
//! ours: a delta is fetched once from `/auth/time` and applied to every
//! subsequent request.
//!
//! # Design
//! - `signature::sign` is a pure function over strings.
//! - `time::ServerTimeSync` owns the cached delta and reads the current
//!   instant through a `TimeSource`, so tests pin the clock.
//! - `request::AuthenticatedRequestBuilder` turns (method, path, payload)
//!   into a plain-data `HttpRequest`.
//! - `client::Client` sends it through a `Transport` and maps the response
//!   to a raw string, a deserialized value, or an `ApiError`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod signature;
pub mod time;
#[cfg(feature = "ureq-transport")]
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::{ClientConfig, Endpoint};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use request::{
    AuthenticatedRequestBuilder, APPLICATION_HEADER, CONSUMER_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use signature::sign;
pub use time::{FixedTimeSource, ServerTimeSync, SystemTimeSource, TimeSource};
#[cfg(feature = "ureq-transport")]
pub use transport::UreqTransport;
pub use types::{AccessRule, ConsumerKeyGrant, CredentialRequest, Credentials, Payload};
