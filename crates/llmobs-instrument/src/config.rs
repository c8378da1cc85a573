//! Configuration for LLM Observability submission
//!
//! Instrumentors only need the `Config` capability: whether tracing is
//! enabled and which ml_app spans belong to. `LlmObsConfig` is the
//! environment-backed implementation, which also carries the settings the
//! HTTP exporter needs.
//!
//! # Environment
//!
//! | variable | default |
//! |---|---|
//! | `DD_LLMOBS_ENABLED` | `1` |
//! | `DD_SITE` | `datadoghq.com` |
//! | `DD_API_KEY` | none |
//! | `DD_LLMOBS_ML_APP` | falls back to `DD_SERVICE` |

use std::fmt;
use thiserror::Error;

/// Values of `DD_LLMOBS_ENABLED` that disable tracing.
pub const FALSE_VALUES: [&str; 7] = ["0", "f", "F", "false", "FALSE", "off", "OFF"];

pub const DEFAULT_SITE: &str = "datadoghq.com";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DD_API_KEY is required to submit spans")]
    MissingApiKey,

    #[error("DD_LLMOBS_ML_APP is required to submit spans")]
    MissingMlApp,
}

/// What the instrumentors need to know on every call.
pub trait Config: Send + Sync {
    /// Whether spans should be produced at all.
    fn enabled(&self) -> bool;

    /// Application name spans are grouped under.
    fn ml_app(&self) -> &str;
}

/// LLM Observability configuration
#[derive(Clone, PartialEq, Eq)]
pub struct LlmObsConfig {
    /// Submit spans to LLM Observability
    pub enabled: bool,

    /// Datadog site, e.g. `datadoghq.eu`
    pub site: String,

    /// Datadog API key
    pub api_key: Option<String>,

    /// Application name
    pub ml_app: Option<String>,

    /// Timeout for a single submission in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for LlmObsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            site: DEFAULT_SITE.to_string(),
            api_key: None,
            ml_app: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl LlmObsConfig {
    /// Create a new config builder
    pub fn builder() -> LlmObsConfigBuilder {
        LlmObsConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("DD_LLMOBS_ENABLED")
            .map(|v| !FALSE_VALUES.contains(&v.as_str()))
            .unwrap_or(true);

        Self {
            enabled,
            site: lookup("DD_SITE").unwrap_or_else(|| DEFAULT_SITE.to_string()),
            api_key: lookup("DD_API_KEY"),
            ml_app: lookup("DD_LLMOBS_ML_APP").or_else(|| lookup("DD_SERVICE")),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// Base URL of the span intake for the configured site
    pub fn intake_url(&self) -> String {
        format!("https://api.{}/api/intake/llm-obs/v1", self.site)
    }

    /// API key, or an error if none is configured
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// ml_app, or an error if none is configured
    pub fn require_ml_app(&self) -> Result<&str, ConfigError> {
        self.ml_app
            .as_deref()
            .filter(|app| !app.is_empty())
            .ok_or(ConfigError::MissingMlApp)
    }
}

impl Config for LlmObsConfig {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn ml_app(&self) -> &str {
        self.ml_app.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for LlmObsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmObsConfig")
            .field("enabled", &self.enabled)
            .field("site", &self.site)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("ml_app", &self.ml_app)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Builder for LlmObsConfig
pub struct LlmObsConfigBuilder {
    config: LlmObsConfig,
}

impl LlmObsConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: LlmObsConfig::default(),
        }
    }

    /// Enable or disable span submission
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the Datadog site
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.config.site = site.into();
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Set the application name
    pub fn ml_app(mut self, ml_app: impl Into<String>) -> Self {
        self.config.ml_app = Some(ml_app.into());
        self
    }

    /// Set the request timeout in milliseconds
    pub fn request_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.request_timeout_ms = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> LlmObsConfig {
        self.config
    }
}

impl Default for LlmObsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
