//! # chat-common
//!
//! Shared utilities including client configuration, rate-limit override tables,
//! error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AccountType, ApiConfig, AppSettings, ClientConfig, ConfigError, Environment, FixedRateLimit,
    RateLimitConfig, RouteLimitTable, RouteOverride,
};
pub use error::{RestError, RestResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
