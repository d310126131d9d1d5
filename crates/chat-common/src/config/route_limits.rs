//! Per-route rate-limit overrides
//!
//! Some routes have limits the platform does not report reliably through
//! headers. The table maps a route template to a known fixed limit and/or a
//! flag saying that missing headers on that route are expected.
//!
//! File format (TOML shown, JSON and YAML work the same way):
//!
//! ```toml
//! [[routes]]
//! template = "channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me"
//! limit = 1
//! interval_ms = 250
//! missing_headers = true
//! ```

use super::client_config::ConfigError;
use chat_core::catalog;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// A limit known ahead of time: `limit` requests per `interval_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRateLimit {
    pub limit: u32,
    pub interval_ms: u64,
}

impl FixedRateLimit {
    #[must_use]
    pub const fn new(limit: u32, interval_ms: u64) -> Self {
        Self { limit, interval_ms }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Override applied to every bucket created for a route template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOverride {
    pub fixed: Option<FixedRateLimit>,
    pub missing_headers: bool,
}

/// Route template -> override lookup
#[derive(Debug, Clone, Default)]
pub struct RouteLimitTable {
    routes: HashMap<String, RouteOverride>,
}

#[derive(Debug, Deserialize)]
struct RouteLimitFile {
    #[serde(default)]
    routes: Vec<RouteLimitEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteLimitEntry {
    template: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    interval_ms: Option<u64>,
    #[serde(default)]
    missing_headers: bool,
}

impl RouteLimitTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides for routes whose limits are known not to be reported
    #[must_use]
    pub fn builtin() -> Self {
        Self::new().with_override(
            catalog::messages::ADD_REACTION.template(),
            RouteOverride {
                fixed: Some(FixedRateLimit::new(1, 250)),
                missing_headers: true,
            },
        )
    }

    /// Load a table from a TOML, JSON, or YAML file (format from extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = config::File::from(path);
        Self::load(source, &path.display().to_string())
    }

    /// Parse a table from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let source = config::File::from_str(contents, config::FileFormat::Toml);
        Self::load(source, "<inline>")
    }

    fn load<S>(source: S, origin: &str) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let load_error = |e: config::ConfigError| ConfigError::Load {
            path: origin.to_string(),
            message: e.to_string(),
        };

        let file: RouteLimitFile = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(load_error)?
            .try_deserialize()
            .map_err(load_error)?;

        let mut table = Self::new();
        for entry in file.routes {
            let fixed = match (entry.limit, entry.interval_ms) {
                (Some(limit), Some(interval_ms)) if limit > 0 && interval_ms > 0 => {
                    Some(FixedRateLimit::new(limit, interval_ms))
                }
                (None, None) => None,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "routes",
                        format!(
                            "{}: limit and interval_ms must both be set and positive",
                            entry.template
                        ),
                    ))
                }
            };
            table.insert(
                entry.template,
                RouteOverride {
                    fixed,
                    missing_headers: entry.missing_headers,
                },
            );
        }

        Ok(table)
    }

    pub fn insert(&mut self, template: impl Into<String>, route_override: RouteOverride) {
        self.routes.insert(template.into(), route_override);
    }

    #[must_use]
    pub fn with_override(mut self, template: impl Into<String>, route_override: RouteOverride) -> Self {
        self.insert(template, route_override);
        self
    }

    #[must_use]
    pub fn with_fixed_limit(self, template: impl Into<String>, limit: FixedRateLimit) -> Self {
        self.with_override(
            template,
            RouteOverride {
                fixed: Some(limit),
                missing_headers: true,
            },
        )
    }

    /// Entries of `other` replace entries with the same template
    pub fn merge(&mut self, other: RouteLimitTable) {
        self.routes.extend(other.routes);
    }

    #[must_use]
    pub fn get(&self, template: &str) -> Option<RouteOverride> {
        self.routes.get(template).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
