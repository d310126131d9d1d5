//! Per-route rate-limit coordination
//!
//! - [`Bucket`]: budget and FIFO queue for one rate-limit key
//! - [`GlobalCooldown`]: pause across every bucket of a limiter after a global 429
//! - [`RateLimiter`]: registry of buckets plus the scheduling loop
//! - `headers`: parsing of `X-RateLimit-*`, `Retry-After`, and 429 bodies

mod bucket;
mod global;
pub(crate) mod headers;
mod limiter;

pub use bucket::{Bucket, BucketSnapshot};
pub use global::GlobalCooldown;
pub use limiter::{RateLimiter, RateLimiterBuilder};
