//! Domain errors

mod route_error;

pub use route_error::RouteError;
