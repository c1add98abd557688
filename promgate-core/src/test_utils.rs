//! Test utilities for PromGate.
//!
//! This module provides shared test configuration types used across unit tests.
//! It is only compiled when running tests (`#[cfg(test)]`).

use std::time::Duration;

use crate::types::{
    AllowedSpaces, ConcurrencyProvider, ProxyConfig, ProxyProvider, RulesConfig, RulesProvider,
};

/// Backend address nothing listens on.
pub const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:1";

/// Shared test configuration for unit tests.
///
/// This struct implements all configuration traits with sensible defaults
/// and builder methods for customization.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub proxy: ProxyConfig,
    pub rules: RulesConfig,
    pub max_concurrency: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::new(UNREACHABLE_BACKEND),
            rules: RulesConfig::new(AllowedSpaces::new(["team-a", "team-b"])),
            max_concurrency: 4,
        }
    }
}

impl TestConfig {
    /// Create a new test configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the admission capacity.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Configure how long a request may wait for admission.
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.proxy.queue_timeout = timeout;
        self
    }

    /// Configure the maximum buffered body size in bytes.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.proxy.max_body_size = bytes;
        self
    }

    /// Replace the allowed spaces.
    pub fn with_allowed_spaces(mut self, spaces: Vec<&str>) -> Self {
        self.rules = RulesConfig {
            allowed_spaces: AllowedSpaces::new(spaces).into(),
            ..self.rules
        };
        self
    }
}

impl ProxyProvider for TestConfig {
    fn proxy_config(&self) -> &ProxyConfig {
        &self.proxy
    }
}

impl RulesProvider for TestConfig {
    fn rules_config(&self) -> &RulesConfig {
        &self.rules
    }
}

impl ConcurrencyProvider for TestConfig {
    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
