//! Global cooldown gate
//!
//! A single timestamp shared by every bucket of one limiter. It is set when
//! the server reports a global 429 and read before any bucket sends a request.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

const UNSET: i64 = 0;

/// Process-wide (per limiter) pause after a global rate limit
#[derive(Debug, Default)]
pub struct GlobalCooldown {
    /// Server epoch milliseconds, `UNSET` when no cooldown is active
    until: AtomicI64,
}

impl GlobalCooldown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining cooldown at `now`, clearing an expired one
    pub fn current_delay(&self, now: i64) -> Option<Duration> {
        let until = self.until.load(Ordering::Acquire);
        if until == UNSET {
            return None;
        }
        if until > now {
            return Some(Duration::from_millis((until - now) as u64));
        }

        // Expired. A concurrent `set_until` wins over the clear.
        let _ = self
            .until
            .compare_exchange(until, UNSET, Ordering::AcqRel, Ordering::Acquire);
        None
    }

    /// Pause every bucket until `until`; an active longer cooldown is kept
    pub fn set_until(&self, until: i64) {
        self.until.fetch_max(until, Ordering::AcqRel);
    }

    /// End of the active cooldown, if one is set
    pub fn until(&self) -> Option<i64> {
        match self.until.load(Ordering::Acquire) {
            UNSET => None,
            until => Some(until),
        }
    }
}
