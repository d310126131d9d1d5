//! Configuration structs

mod client_config;
mod route_limits;

pub use client_config::{
    AccountType, ApiConfig, AppSettings, ClientConfig, ConfigError, Environment, RateLimitConfig,
};
pub use route_limits::{FixedRateLimit, RouteLimitTable, RouteOverride};
