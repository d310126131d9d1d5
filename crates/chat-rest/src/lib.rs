//! # chat-rest
//!
//! REST layer of the chat client: turns compiled routes into HTTP requests and
//! runs them through a per-route rate-limit coordinator.
//!
//! ```text
//!   RestClient ──► RateLimiter ──► Bucket (FIFO, one in flight)
//!                      │                │
//!                      │                ▼
//!                      │          HttpExecutor (Requester / reqwest)
//!                      ▼
//!                TaskScheduler (tokio, delayed resumption)
//! ```

pub mod client;
pub mod clock;
pub mod executor;
pub mod ratelimit;
pub mod request;
pub mod requester;
pub mod scheduler;

// Re-export commonly used types at crate root
pub use client::RestClient;
pub use clock::{Clock, SystemClock};
pub use executor::{HttpExecutor, TransportError};
pub use ratelimit::{
    Bucket, BucketSnapshot, GlobalCooldown, RateLimiter, RateLimiterBuilder,
};
pub use request::{CancelHandle, RequestHandle, RestRequest, RestResponse};
pub use requester::Requester;
pub use scheduler::{TaskScheduler, TokioScheduler};
