//! Configuration management for Formgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{FormgateError, Result};
use crate::ratelimit::{IpTierConfig, MessageTemplates, TierDefinition, TierSet};

/// Prefix for environment variable overrides, e.g. `FORMGATE_SERVER__HTTP_ADDR`.
const ENV_PREFIX: &str = "FORMGATE";

/// Main configuration for the Formgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public HTTP address serving evaluation requests
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Admin HTTP address serving stats/reset/clear
    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            admin_addr: default_admin_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_admin_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Short, medium and long IP tiers
    #[serde(default)]
    pub tiers: IpTierConfig,

    /// Default email tier, overridable per call
    #[serde(default = "default_email_tier")]
    pub email: TierDefinition,

    /// How often the expiry sweep runs, in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Deny message templates
    #[serde(default)]
    pub messages: MessageTemplates,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            tiers: IpTierConfig::default(),
            email: default_email_tier(),
            sweep_interval_ms: default_sweep_interval(),
            messages: MessageTemplates::default(),
        }
    }
}

fn default_email_tier() -> TierDefinition {
    TierDefinition::new(3_600_000, 3)
}

fn default_sweep_interval() -> u64 {
    3_600_000
}

impl RateLimitingConfig {
    /// Check tier definitions and the sweep interval.
    pub fn validate(&self) -> Result<()> {
        self.tier_set().map(|_| ())
    }

    /// Validate the whole section and return the ordered IP tiers.
    pub fn tier_set(&self) -> Result<TierSet> {
        let tiers = TierSet::new(&self.tiers)?;
        self.email.validate("email")?;
        if self.sweep_interval_ms == 0 {
            return Err(FormgateError::Config(
                "sweep_interval_ms must be positive".to_string(),
            ));
        }
        Ok(tiers)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FormgateConfig {
    /// Load configuration from an optional file plus `FORMGATE_*` environment variables.
    ///
    /// Environment variables use `__` to separate nested keys and take
    /// precedence over the file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: FormgateConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FormgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FormgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.validate()
    }
}
