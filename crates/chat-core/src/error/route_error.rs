//! Route errors - failures while compiling a route template

use thiserror::Error;

/// Errors raised when a route template cannot be compiled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Route {template} expects {expected} parameters, got {actual}")]
    ParameterCount {
        template: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Empty value for route parameter: {0}")]
    EmptyParameter(String),

    #[error("Malformed route template: {0}")]
    MalformedTemplate(&'static str),
}

impl RouteError {
    /// Get an error code string for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParameterCount { .. } => "ROUTE_PARAMETER_COUNT",
            Self::EmptyParameter(_) => "ROUTE_EMPTY_PARAMETER",
            Self::MalformedTemplate(_) => "ROUTE_MALFORMED_TEMPLATE",
        }
    }
}
