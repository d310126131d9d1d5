//! Rate-limit bucket
//!
//! One bucket per rate-limit key. It holds the remaining budget reported by the
//! server, the time the budget resets, and the FIFO queue of requests waiting
//! to be sent on that key. All mutable state sits behind the bucket's own lock.

use super::headers::RouteHeaders;
use crate::request::QueuedRequest;
use chat_common::{FixedRateLimit, RouteOverride};
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Rate-limit state for one route key
pub struct Bucket {
    key: String,
    route_override: Option<RouteOverride>,
    state: Mutex<BucketState>,
}

/// Point-in-time view of a bucket, for inspection and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub limit: u32,
    pub remaining: u32,
    /// Server epoch milliseconds; 0 before the first reset is known
    pub reset_at: i64,
    pub queued: usize,
}

pub(crate) struct BucketState {
    pub(crate) limit: u32,
    pub(crate) remaining: u32,
    pub(crate) reset_at: i64,
    pub(crate) queue: VecDeque<QueuedRequest>,
}

impl Bucket {
    pub(crate) fn new(key: impl Into<String>, route_override: Option<RouteOverride>) -> Self {
        // Unknown routes start with a budget of one: the first response
        // reports the real limit.
        let limit = route_override
            .and_then(|o| o.fixed)
            .map_or(1, |fixed| fixed.limit);

        Self {
            key: key.into(),
            route_override,
            state: Mutex::new(BucketState {
                limit,
                remaining: limit,
                reset_at: 0,
                queue: VecDeque::new(),
            }),
        }
    }

    /// The rate-limit key this bucket tracks
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fixed_limit(&self) -> Option<FixedRateLimit> {
        self.route_override.and_then(|o| o.fixed)
    }

    /// Whether incomplete headers on this route are expected
    pub fn expects_missing_headers(&self) -> bool {
        self.route_override.is_some_and(|o| o.missing_headers)
    }

    pub fn snapshot(&self) -> BucketSnapshot {
        let state = self.state.lock();
        BucketSnapshot {
            limit: state.limit,
            remaining: state.remaining,
            reset_at: state.reset_at,
            queued: state.queue.len(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock()
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("key", &self.key)
            .field("route_override", &self.route_override)
            .field("state", &self.snapshot())
            .finish()
    }
}

impl BucketState {
    /// Time to wait before the next request may be sent
    ///
    /// Once `reset_at` has passed the budget is refilled to `limit`.
    pub(crate) fn rate_limit_delay(&mut self, now: i64) -> Option<Duration> {
        if self.reset_at <= now {
            self.remaining = self.limit;
            return None;
        }
        if self.remaining == 0 {
            return Some(Duration::from_millis((self.reset_at - now) as u64));
        }
        None
    }

    /// Spend one unit of budget for a request about to be sent
    pub(crate) fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Block the bucket until `until` (after a per-route 429)
    pub(crate) fn exhaust_until(&mut self, until: i64) {
        self.remaining = 0;
        self.reset_at = until;
    }

    /// Apply a known fixed limit; the window opens on the first response
    pub(crate) fn apply_fixed(&mut self, fixed: FixedRateLimit, now: i64) {
        self.limit = fixed.limit;
        if self.reset_at <= now {
            let interval = i64::try_from(fixed.interval_ms).unwrap_or(i64::MAX);
            self.reset_at = now.saturating_add(interval);
        }
    }

    /// Apply whichever per-route headers were present
    pub(crate) fn apply_headers(&mut self, headers: &RouteHeaders) {
        if let Some(limit) = headers.limit {
            self.limit = limit;
        }
        if let Some(remaining) = headers.remaining {
            self.remaining = remaining;
        }
        if let Some(reset_at) = headers.reset_at {
            self.reset_at = reset_at;
        }
    }
}
