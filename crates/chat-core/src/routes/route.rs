//! Route templates and their compiled form
//!
//! A template such as `channels/{channel_id}/messages/{message_id}` compiles into:
//! - a request path with every placeholder substituted
//! - a rate-limit key where only major parameters are substituted
//!
//! Two requests share a bucket exactly when their rate-limit keys are equal.

use super::Method;
use crate::error::RouteError;
use std::fmt;

/// Parameters whose value is kept in the rate-limit key.
///
/// The platform scopes its buckets per guild, channel, and webhook; every
/// other parameter (message ids, user ids, emoji) is redacted to its placeholder.
pub const MAJOR_PARAMETERS: [&str; 3] = ["guild_id", "channel_id", "webhook_id"];

/// A REST endpoint: method plus path template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    method: Method,
    template: &'static str,
    param_count: usize,
}

impl Route {
    /// Create a route from a method and a `{param}` path template
    pub const fn new(method: Method, template: &'static str) -> Self {
        Self {
            method,
            template,
            param_count: count_parameters(template),
        }
    }

    #[inline]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline]
    pub const fn template(&self) -> &'static str {
        self.template
    }

    /// Number of `{param}` placeholders in the template
    #[inline]
    pub const fn param_count(&self) -> usize {
        self.param_count
    }

    /// Substitute `params` into the template, in order of appearance
    ///
    /// Values are inserted verbatim; callers must percent-encode values such
    /// as unicode emoji before compiling.
    pub fn compile(&self, params: &[&str]) -> Result<CompiledRoute, RouteError> {
        if params.len() != self.param_count {
            return Err(RouteError::ParameterCount {
                template: self.template,
                expected: self.param_count,
                actual: params.len(),
            });
        }

        let mut path = String::with_capacity(self.template.len() + params.len() * 20);
        let mut key = String::with_capacity(self.template.len() + params.len() * 20);
        let mut rest = self.template;
        let mut values = params.iter();

        while let Some(start) = rest.find('{') {
            let end = rest[start..]
                .find('}')
                .map(|offset| start + offset)
                .ok_or(RouteError::MalformedTemplate(self.template))?;
            let name = &rest[start + 1..end];
            let value = values
                .next()
                .ok_or(RouteError::MalformedTemplate(self.template))?;

            if value.is_empty() {
                return Err(RouteError::EmptyParameter(name.to_string()));
            }

            path.push_str(&rest[..start]);
            path.push_str(value);

            key.push_str(&rest[..start]);
            if MAJOR_PARAMETERS.contains(&name) {
                key.push_str(value);
            } else {
                key.push_str(&rest[start..=end]);
            }

            rest = &rest[end + 1..];
        }

        path.push_str(rest);
        key.push_str(rest);

        Ok(CompiledRoute {
            route: *self,
            path,
            rate_limit_key: key,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

const fn count_parameters(template: &str) -> usize {
    let bytes = template.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            count += 1;
        }
        i += 1;
    }
    count
}

/// A route with its parameters filled in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledRoute {
    route: Route,
    path: String,
    rate_limit_key: String,
}

impl CompiledRoute {
    /// The route this was compiled from
    #[inline]
    pub fn route(&self) -> &Route {
        &self.route
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.route.method
    }

    /// The uncompiled template, used to look up per-route overrides
    #[inline]
    pub fn template(&self) -> &'static str {
        self.route.template
    }

    /// Path relative to the API base URL
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bucket identity: the template with only major parameters substituted
    #[inline]
    pub fn rate_limit_key(&self) -> &str {
        &self.rate_limit_key
    }
}

impl fmt::Display for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.route.method, self.path)
    }
}
