//! Type definitions for PromGate configuration.
//!
//! This module contains the configuration types shared by the validators and
//! the forwarding gate, plus composable provider traits so configuration can
//! come from any source (YAML file, environment, tests).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::defaults;

// ============================================================================
// Composable Configuration Traits
// ============================================================================

/// Configuration for upstream forwarding.
pub trait ProxyProvider: Send + Sync {
    /// Returns the proxy configuration.
    fn proxy_config(&self) -> &ProxyConfig;
}

/// Configuration for query validation rules.
pub trait RulesProvider: Send + Sync {
    /// Returns the validation rules.
    fn rules_config(&self) -> &RulesConfig;
}

/// Configuration for request admission.
pub trait ConcurrencyProvider: Send + Sync {
    /// Returns the maximum number of query requests processed concurrently.
    fn max_concurrency(&self) -> usize;
}

/// Trait for complete configuration injection.
///
/// Combines all specialized configuration traits into one.
///
/// # Example
///
/// ```
/// use promgate_core::{
///     AllowedSpaces, ConcurrencyProvider, ProxyConfig, ProxyProvider, RulesConfig,
///     RulesProvider,
/// };
///
/// struct MyConfig {
///     proxy: ProxyConfig,
///     rules: RulesConfig,
/// }
///
/// impl ProxyProvider for MyConfig {
///     fn proxy_config(&self) -> &ProxyConfig { &self.proxy }
/// }
///
/// impl RulesProvider for MyConfig {
///     fn rules_config(&self) -> &RulesConfig { &self.rules }
/// }
///
/// impl ConcurrencyProvider for MyConfig {
///     fn max_concurrency(&self) -> usize { 10 }
/// }
///
/// let config = MyConfig {
///     proxy: ProxyConfig::new("http://localhost:9090"),
///     rules: RulesConfig::new(AllowedSpaces::new(["team-a"])),
/// };
/// ```
pub trait ConfigProvider: ProxyProvider + RulesProvider + ConcurrencyProvider {}

// Blanket implementation: any type implementing all sub-traits is a ConfigProvider
impl<T> ConfigProvider for T where T: ProxyProvider + RulesProvider + ConcurrencyProvider {}

// ============================================================================
// Configuration Structs
// ============================================================================

/// The fixed set of `space` label values queries may select.
///
/// Loaded once at startup and shared behind an [`Arc`]; never mutated afterwards.
///
/// # Example
///
/// ```
/// use promgate_core::AllowedSpaces;
///
/// let spaces = AllowedSpaces::new(["team-a", "team-b"]);
/// assert!(spaces.contains("team-a"));
/// assert!(!spaces.contains("team-c"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowedSpaces {
    values: HashSet<String>,
}

impl AllowedSpaces {
    /// Creates the set from any list of values. Blank entries are dropped.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(Into::into)
                .filter(|v: &String| !v.trim().is_empty())
                .collect(),
        }
    }

    /// Returns true if the value is allowed.
    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    /// Number of allowed values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is allowed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Allowed values in sorted order, for display.
    pub fn sorted(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        values.sort_unstable();
        values
    }
}

/// Configuration for proxy behavior and upstream communication.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use promgate_core::ProxyConfig;
///
/// let config = ProxyConfig::new("http://prometheus:9090/");
///
/// assert!(config.is_valid());
/// assert_eq!(config.backend_base(), "http://prometheus:9090");
/// assert_eq!(config.timeout, Duration::from_secs(30));
/// ```
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Base URL of the Prometheus-compatible backend
    pub backend_url: String,
    /// Timeout for upstream requests
    pub timeout: Duration,
    /// How long a query may wait for an admission slot before it is cancelled
    pub queue_timeout: Duration,
    /// Maximum buffered request body size in bytes (0 = unlimited)
    pub max_body_size: usize,
}

impl ProxyConfig {
    /// Creates a configuration for the given backend with default limits.
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            timeout: defaults::PROXY_TIMEOUT,
            queue_timeout: defaults::PROXY_TIMEOUT,
            max_body_size: defaults::MAX_BODY_SIZE,
        }
    }

    /// Returns `true` if the configuration is valid.
    ///
    /// A valid configuration has an http(s) backend URL and non-zero timeouts.
    pub fn is_valid(&self) -> bool {
        let url = self.backend_url.trim();
        (url.starts_with("http://") || url.starts_with("https://"))
            && !self.timeout.is_zero()
            && !self.queue_timeout.is_zero()
    }

    /// Backend URL without a trailing slash, ready for a path to be appended.
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim().trim_end_matches('/')
    }

    /// Returns the maximum body size formatted for display.
    ///
    /// Returns "unlimited" if max_body_size is 0, otherwise returns the size in MB.
    pub fn max_body_size_mb(&self) -> String {
        if self.max_body_size == 0 {
            "unlimited".to_string()
        } else {
            (self.max_body_size / 1024 / 1024).to_string()
        }
    }

    /// Converts megabytes to bytes.
    ///
    /// Returns 0 if input is 0 (representing unlimited).
    pub fn mb_to_bytes(mb: usize) -> usize {
        mb.saturating_mul(1024 * 1024)
    }
}

/// Limits applied by the validators.
#[derive(Clone, Debug)]
pub struct RulesConfig {
    /// Permitted `space` label values
    pub allowed_spaces: Arc<AllowedSpaces>,
    /// How far in the past `start` and `time` may reach
    pub max_lookback: Duration,
    /// Longest range vector accepted by `increase` and `*_over_time`
    pub max_function_range: Duration,
}

impl RulesConfig {
    /// Creates rules for the given spaces with default limits.
    pub fn new(allowed_spaces: AllowedSpaces) -> Self {
        Self {
            allowed_spaces: Arc::new(allowed_spaces),
            max_lookback: defaults::MAX_LOOKBACK,
            max_function_range: defaults::MAX_FUNCTION_RANGE,
        }
    }

    /// Returns `true` if both limits are non-zero.
    pub fn is_valid(&self) -> bool {
        !self.max_lookback.is_zero() && !self.max_function_range.is_zero()
    }
}
