//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use super::route_limits::RouteLimitTable;
use crate::telemetry::TracingConfig;
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub api: ApiConfig,
    pub account_type: AccountType,
    pub rate_limit: RateLimitConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Kind of account the client authenticates as
///
/// Bot accounts receive per-route rate-limit headers on every response.
/// Client (user) accounts only learn about limits from 429 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Bot,
    Client,
}

impl AccountType {
    /// Whether `X-RateLimit-*` headers should drive bucket state
    #[must_use]
    pub fn uses_route_headers(&self) -> bool {
        matches!(self, Self::Bot)
    }

    /// Value of the `Authorization` header for `token`
    #[must_use]
    pub fn authorization(&self, token: &str) -> String {
        match self {
            Self::Bot => format!("Bot {token}"),
            Self::Client => token.to_string(),
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "bot" => Some(Self::Bot),
            "client" | "user" => Some(Self::Client),
            _ => None,
        }
    }
}

/// REST API connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full URL for a compiled route path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Cooldown applied when a 429 carries no retry-after information
    #[serde(default = "default_retry_after_ms")]
    pub default_retry_after_ms: u64,
    /// Optional TOML/JSON/YAML file with per-route overrides
    #[serde(default)]
    pub route_limits_file: Option<String>,
}

impl RateLimitConfig {
    #[must_use]
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_millis(self.default_retry_after_ms)
    }

    /// Built-in overrides merged with the configured file, if any
    ///
    /// Entries from the file replace built-in entries for the same template.
    pub fn route_limits(&self) -> Result<RouteLimitTable, ConfigError> {
        let mut table = RouteLimitTable::builtin();
        if let Some(path) = &self.route_limits_file {
            table.merge(RouteLimitTable::from_file(path)?);
        }
        Ok(table)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_retry_after_ms: default_retry_after_ms(),
            route_limits_file: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_user_agent() -> String {
    format!(
        "DiscordBot (https://github.com/seung/chat-client, {})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_after_ms() -> u64 {
    1000
}

impl ClientConfig {
    /// Configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            api: ApiConfig {
                base_url: default_base_url(),
                token: token.into(),
                user_agent: default_user_agent(),
                request_timeout_secs: default_request_timeout_secs(),
            },
            account_type: AccountType::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHAT_TOKEN` is missing or a value cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let account_type = match env::var("CHAT_ACCOUNT_TYPE") {
            Ok(value) => AccountType::parse(&value)
                .ok_or(ConfigError::InvalidValue("CHAT_ACCOUNT_TYPE", value))?,
            Err(_) => AccountType::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            api: ApiConfig {
                base_url: env::var("CHAT_API_BASE_URL").unwrap_or_else(|_| default_base_url()),
                token: env::var("CHAT_TOKEN").map_err(|_| ConfigError::MissingVar("CHAT_TOKEN"))?,
                user_agent: env::var("CHAT_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
                request_timeout_secs: parse_var("CHAT_REQUEST_TIMEOUT_SECS")?
                    .unwrap_or_else(default_request_timeout_secs),
            },
            account_type,
            rate_limit: RateLimitConfig {
                default_retry_after_ms: parse_var("CHAT_DEFAULT_RETRY_AFTER_MS")?
                    .unwrap_or_else(default_retry_after_ms),
                route_limits_file: env::var("CHAT_ROUTE_LIMITS_FILE").ok(),
            },
        })
    }

    /// Log output suited to the configured `APP_ENV`
    #[must_use]
    pub fn tracing(&self) -> TracingConfig {
        TracingConfig::for_environment(self.app.env)
    }

    #[must_use]
    pub fn with_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, value)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Failed to load {path}: {message}")]
    Load { path: String, message: String },
}
