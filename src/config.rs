//! Configuration management for PromGate.
//!
//! Configuration is read once at startup from a YAML file, then selected
//! values may be overridden by `PROMGATE_*` environment variables. The
//! result is validated and frozen into [`Settings`], which is shared by every
//! request for the lifetime of the process.
//!
//! # File format
//!
//! ```yaml
//! server:
//!   port: 8080
//!   bind: "0.0.0.0"
//!   max_concurrency: 10
//!   queue_timeout_secs: 30   # defaults to prometheus.timeout_secs
//! prometheus:
//!   url: "http://localhost:9090"
//!   timeout_secs: 30
//!   max_body_size_mb: 10
//! rules:
//!   allowed_spaces: ["team-a", "team-b"]
//!   max_lookback_secs: 7200
//!   max_function_range_secs: 86400
//! ```
//!
//! Every key is optional and falls back to [`promgate_core::defaults`].
//!
//! # Example
//!
//! ```
//! use promgate::config::{FileConfig, Settings};
//!
//! let file = FileConfig::from_yaml("rules:\n  allowed_spaces: [team-a]\n").unwrap();
//! let settings = Settings::from_file_config(file).unwrap();
//! assert_eq!(settings.port, 8080);
//! assert!(settings.rules.allowed_spaces.contains("team-a"));
//! ```

use std::env::VarError;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::env_vars;
use promgate_core::{
    AllowedSpaces, ConcurrencyProvider, PromGateError, ProxyConfig, ProxyProvider, Result,
    RulesConfig, RulesProvider, defaults,
};

// ============================================================================
// File representation
// ============================================================================

/// Raw configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub prometheus: PrometheusSection,
    pub rules: RulesSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub port: u16,
    pub bind: String,
    pub max_concurrency: usize,
    pub queue_timeout_secs: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: defaults::PORT,
            bind: defaults::BIND.to_string(),
            max_concurrency: defaults::MAX_CONCURRENCY,
            queue_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrometheusSection {
    pub url: String,
    pub timeout_secs: u64,
    pub max_body_size_mb: usize,
}

impl Default for PrometheusSection {
    fn default() -> Self {
        Self {
            url: defaults::BACKEND_URL.to_string(),
            timeout_secs: defaults::PROXY_TIMEOUT_SECS,
            max_body_size_mb: defaults::MAX_BODY_SIZE_MB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesSection {
    pub allowed_spaces: Vec<String>,
    pub max_lookback_secs: u64,
    pub max_function_range_secs: u64,
}

impl Default for RulesSection {
    fn default() -> Self {
        Self {
            allowed_spaces: Vec::new(),
            max_lookback_secs: defaults::MAX_LOOKBACK_SECS,
            max_function_range_secs: defaults::MAX_FUNCTION_RANGE_SECS,
        }
    }
}

impl FileConfig {
    /// Parses YAML configuration text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
            .map_err(|e| PromGateError::ConfigError(format!("invalid configuration file: {e}")))
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            PromGateError::ConfigError(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Applies `PROMGATE_*` overrides read through `env_var`.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_env_overrides<F>(&mut self, env_var: F)
    where
        F: Fn(&str) -> std::result::Result<String, VarError>,
    {
        override_from_env(&env_var, env_vars::PORT, &mut self.server.port);
        override_from_env(&env_var, env_vars::BIND, &mut self.server.bind);
        override_from_env(
            &env_var,
            env_vars::MAX_CONCURRENCY,
            &mut self.server.max_concurrency,
        );
        if let Ok(value) = env_var(env_vars::QUEUE_TIMEOUT_SECS) {
            match value.trim().parse() {
                Ok(secs) => self.server.queue_timeout_secs = Some(secs),
                Err(_) => warn_invalid(env_vars::QUEUE_TIMEOUT_SECS, &value),
            }
        }

        override_from_env(&env_var, env_vars::BACKEND_URL, &mut self.prometheus.url);
        override_from_env(
            &env_var,
            env_vars::PROXY_TIMEOUT_SECS,
            &mut self.prometheus.timeout_secs,
        );
        override_from_env(
            &env_var,
            env_vars::MAX_BODY_SIZE_MB,
            &mut self.prometheus.max_body_size_mb,
        );

        if let Ok(value) = env_var(env_vars::ALLOWED_SPACES) {
            self.rules.allowed_spaces = parse_comma_separated(&value);
        }
    }
}

/// Replaces `target` with the parsed variable, if it is set and valid.
fn override_from_env<F, T>(env_var: &F, var_name: &str, target: &mut T)
where
    F: Fn(&str) -> std::result::Result<String, VarError>,
    T: FromStr,
{
    if let Ok(value) = env_var(var_name) {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn_invalid(var_name, &value),
        }
    }
}

fn warn_invalid(var_name: &str, value: &str) {
    warn!(var = var_name, value = %value, "Invalid env var value, keeping configured value");
}

/// Parses a comma-separated string into a Vec of trimmed strings.
///
/// Filters out empty entries after trimming.
fn parse_comma_separated(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Settings - ConfigProvider implementation
// ============================================================================

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: IpAddr,
    pub port: u16,
    pub max_concurrency: usize,
    pub proxy: ProxyConfig,
    pub rules: RulesConfig,
}

impl Settings {
    /// Loads `path`, applies environment overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = FileConfig::load(path)?;
        file.apply_env_overrides(|key| std::env::var(key));
        Self::from_file_config(file)
    }

    /// Converts raw file contents into validated settings.
    pub fn from_file_config(file: FileConfig) -> Result<Self> {
        let bind = file.server.bind.trim().parse().map_err(|_| {
            PromGateError::ConfigError(format!("invalid bind address: '{}'", file.server.bind))
        })?;

        let timeout = Duration::from_secs(file.prometheus.timeout_secs);
        let queue_timeout = file
            .server
            .queue_timeout_secs
            .map_or(timeout, Duration::from_secs);

        let settings = Self {
            bind,
            port: file.server.port,
            max_concurrency: file.server.max_concurrency,
            proxy: ProxyConfig {
                backend_url: file.prometheus.url.trim().to_string(),
                timeout,
                queue_timeout,
                max_body_size: ProxyConfig::mb_to_bytes(file.prometheus.max_body_size_mb),
            },
            rules: RulesConfig {
                allowed_spaces: AllowedSpaces::new(file.rules.allowed_spaces).into(),
                max_lookback: Duration::from_secs(file.rules.max_lookback_secs),
                max_function_range: Duration::from_secs(file.rules.max_function_range_secs),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Checks that the settings describe a runnable proxy.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(config_error("server.port must be greater than 0"));
        }
        if self.max_concurrency == 0 {
            return Err(config_error("server.max_concurrency must be greater than 0"));
        }
        if self.proxy.timeout.is_zero() {
            return Err(config_error("prometheus.timeout_secs must be greater than 0"));
        }
        if self.proxy.queue_timeout.is_zero() {
            return Err(config_error("server.queue_timeout_secs must be greater than 0"));
        }
        if url::Url::parse(&self.proxy.backend_url).is_err() || !self.proxy.is_valid() {
            return Err(PromGateError::ConfigError(format!(
                "prometheus.url must be an http(s) URL, got '{}'",
                self.proxy.backend_url
            )));
        }
        if !self.rules.is_valid() {
            return Err(config_error(
                "rules.max_lookback_secs and rules.max_function_range_secs must be greater than 0",
            ));
        }
        if self.rules.allowed_spaces.is_empty() {
            warn!("rules.allowed_spaces is empty, every query will be rejected");
        }
        Ok(())
    }

    /// Address the server listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn config_error(message: &str) -> PromGateError {
    PromGateError::ConfigError(message.to_string())
}

impl ProxyProvider for Settings {
    fn proxy_config(&self) -> &ProxyConfig {
        &self.proxy
    }
}

impl RulesProvider for Settings {
    fn rules_config(&self) -> &RulesConfig {
        &self.rules
    }
}

impl ConcurrencyProvider for Settings {
    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
