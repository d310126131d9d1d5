//! Wall-clock time and server clock-skew correction
//!
//! Reset timestamps come from the server's clock. Comparing them with a local
//! clock that runs ahead or behind would make the limiter wait too long or too
//! little, so every "now" used for cooldowns is `local + offset`, where the
//! offset is measured once from the first response carrying a `Date` header.

use crate::ratelimit::headers;
use reqwest::header::HeaderMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// The system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Local clock adjusted by the measured server offset
pub(crate) struct ServerClock {
    local: Arc<dyn Clock>,
    offset: OnceLock<i64>,
}

impl ServerClock {
    pub(crate) fn new(local: Arc<dyn Clock>) -> Self {
        Self {
            local,
            offset: OnceLock::new(),
        }
    }

    /// Current time on the server's clock, in epoch milliseconds
    pub(crate) fn now(&self) -> i64 {
        self.local.now_millis() + self.offset().unwrap_or(0)
    }

    /// `server - local`, once measured
    pub(crate) fn offset(&self) -> Option<i64> {
        self.offset.get().copied()
    }

    /// Measure the offset from a response's `Date` header
    ///
    /// Only the first response with a parseable header counts.
    pub(crate) fn calibrate(&self, response_headers: &HeaderMap) {
        if self.offset.get().is_some() {
            return;
        }
        if let Some(server_millis) = headers::server_date(response_headers) {
            let offset = server_millis - self.local.now_millis();
            if self.offset.set(offset).is_ok() {
                tracing::debug!(offset_ms = offset, "Measured server clock offset");
            }
        }
    }
}

impl fmt::Debug for ServerClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerClock")
            .field("offset", &self.offset())
            .finish()
    }
}
