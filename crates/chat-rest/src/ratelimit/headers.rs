//! Rate-limit header and 429 body parsing

use crate::request::RestResponse;
use reqwest::header::{HeaderMap, DATE, RETRY_AFTER};
use serde::Deserialize;
use std::time::Duration;

pub(crate) const LIMIT: &str = "x-ratelimit-limit";
pub(crate) const REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const RESET: &str = "x-ratelimit-reset";
pub(crate) const GLOBAL: &str = "x-ratelimit-global";

/// Number of per-route headers a bot response is expected to carry
pub(crate) const EXPECTED_ROUTE_HEADERS: usize = 3;

/// Per-route bucket headers of a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RouteHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Server epoch milliseconds
    pub reset_at: Option<i64>,
}

impl RouteHeaders {
    pub(crate) fn parse(headers: &HeaderMap) -> Self {
        Self {
            limit: header_str(headers, LIMIT).and_then(|v| v.parse().ok()),
            remaining: header_str(headers, REMAINING).and_then(|v| v.parse().ok()),
            reset_at: header_str(headers, RESET)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| (secs * 1000.0).round() as i64),
        }
    }

    /// How many of the three headers parsed
    pub(crate) fn count(&self) -> usize {
        usize::from(self.limit.is_some())
            + usize::from(self.remaining.is_some())
            + usize::from(self.reset_at.is_some())
    }
}

/// What a 429 response says about the limit that was hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TooManyRequests {
    pub retry_after: Option<Duration>,
    pub global: bool,
}

#[derive(Debug, Deserialize)]
struct RateLimitedBody {
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

impl TooManyRequests {
    /// Read retry-after and the global flag from body and headers
    ///
    /// The JSON body is preferred for `retry_after` since it carries
    /// fractional seconds; the `Retry-After` header is the fallback. The limit
    /// is global when the body says so or an `X-RateLimit-Global` header is
    /// present with any value but `false`.
    pub(crate) fn parse(response: &RestResponse) -> Self {
        let body = serde_json::from_slice::<RateLimitedBody>(response.body()).ok();
        let headers = response.headers();

        let retry_after = body
            .as_ref()
            .and_then(|b| b.retry_after)
            .and_then(seconds_to_duration)
            .or_else(|| {
                header_str(headers, RETRY_AFTER.as_str())
                    .and_then(|v| v.parse::<f64>().ok())
                    .and_then(seconds_to_duration)
            });

        let global = body.as_ref().is_some_and(|b| b.global)
            || header_str(headers, GLOBAL).is_some_and(|v| !v.eq_ignore_ascii_case("false"));

        Self {
            retry_after,
            global,
        }
    }
}

/// Server time from the `Date` header, in epoch milliseconds
pub(crate) fn server_date(headers: &HeaderMap) -> Option<i64> {
    let value = header_str(headers, DATE.as_str())?;
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.timestamp_millis())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_millis((secs * 1000.0).ceil() as u64))
    } else {
        None
    }
}
