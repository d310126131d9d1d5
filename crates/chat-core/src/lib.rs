//! # chat-core
//!
//! Domain layer containing the REST route vocabulary: HTTP methods, route
//! templates, and the compiled routes whose keys identify rate-limit buckets.
//! This crate has zero dependencies on infrastructure (HTTP client, runtime, etc.).

pub mod error;
pub mod routes;

// Re-export commonly used types at crate root
pub use error::RouteError;
pub use routes::{catalog, CompiledRoute, Method, Route, MAJOR_PARAMETERS};
