//! Clock abstraction and server time synchronization.
//!
//! # Design
//! Nothing in the signing path reads the system clock directly: the current
//! instant comes from a `TimeSource`, so tests pin it. The server may be
//! skewed from the local clock and rejects requests outside its tolerance,
//! so every signed request uses `local_now + delta`, where `delta` is fetched
//! once from `/auth/time` and cached behind a mutex. The first caller to find
//! the cache empty performs the sync while holding the lock; concurrent
//! callers wait and then observe the same delta.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, Transport};

/// Supplies the current UTC instant.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedTimeSource {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedTimeSource {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Pin the clock at a Unix timestamp. Returns `None` when out of range.
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self::new)
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut instant = self.instant.lock().unwrap_or_else(PoisonError::into_inner);
        *instant += by;
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caches `server_time - client_time` and hands out corrected timestamps.
pub struct ServerTimeSync {
    time_url: String,
    clock: Arc<dyn TimeSource>,
    delta: Mutex<Option<i64>>,
}

impl ServerTimeSync {
    /// `time_url` is the full URL of the `/auth/time` endpoint.
    pub fn new(time_url: impl Into<String>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            time_url: time_url.into(),
            clock,
            delta: Mutex::new(None),
        }
    }

    pub fn time_url(&self) -> &str {
        &self.time_url
    }

    /// Local time truncated to whole seconds.
    pub fn client_timestamp(&self) -> i64 {
        self.clock.now().timestamp()
    }

    /// Cached delta, if a sync has happened.
    pub fn delta(&self) -> Option<i64> {
        *self.lock()
    }

    /// Seed the delta without a network call.
    pub fn set_delta(&self, delta: i64) {
        *self.lock() = Some(delta);
    }

    /// Forget the cached delta; the next signed request re-syncs.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    /// Fetch the server time now and replace the cached delta.
    pub fn sync(&self, transport: &dyn Transport) -> Result<i64, ApiError> {
        let mut cached = self.lock();
        let delta = self.fetch_delta(transport)?;
        *cached = Some(delta);
        Ok(delta)
    }

    /// `client_timestamp() + delta`, syncing first if nothing is cached.
    pub fn current_server_timestamp(&self, transport: &dyn Transport) -> Result<i64, ApiError> {
        let mut cached = self.lock();
        let delta = match *cached {
            Some(delta) => delta,
            None => {
                let delta = self.fetch_delta(transport)?;
                *cached = Some(delta);
                delta
            }
        };
        self.client_timestamp()
            .checked_add(delta)
            .ok_or_else(out_of_range)
    }

    fn fetch_delta(&self, transport: &dyn Transport) -> Result<i64, ApiError> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.time_url.clone(),
            headers: Vec::new(),
            body: None,
        };
        let response = transport.send(&request).map_err(|e| {
            warn!(url = %self.time_url, error = %e, "time sync request failed");
            ApiError::TimeSync(e.to_string())
        })?;
        if !response.is_success() {
            warn!(url = %self.time_url, status = response.status, "time sync rejected");
            return Err(ApiError::TimeSync(format!(
                "HTTP {}: {}",
                response.status, response.body
            )));
        }
        let server_time = parse_timestamp(&response.body)?;
        let delta = server_time
            .checked_sub(self.client_timestamp())
            .ok_or_else(out_of_range)?;
        debug!(server_time, delta, "synchronized with server clock");
        Ok(delta)
    }

    fn lock(&self) -> MutexGuard<'_, Option<i64>> {
        self.delta.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ServerTimeSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTimeSync")
            .field("time_url", &self.time_url)
            .field("delta", &self.delta())
            .finish_non_exhaustive()
    }
}

fn out_of_range() -> ApiError {
    ApiError::TimeSync("server time out of range".to_string())
}

fn parse_timestamp(body: &str) -> Result<i64, ApiError> {
    body.trim()
        .parse::<i64>()
        .map_err(|e| ApiError::TimeSync(format!("unparseable server time {body:?}: {e}")))
}
