//! REST routes - templates, compilation, and the endpoint catalog

pub mod catalog;
mod method;
mod route;

pub use method::Method;
pub use route::{CompiledRoute, Route, MAJOR_PARAMETERS};
