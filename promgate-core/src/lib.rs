//! PromGate Core - PromQL validation and admission-gated forwarding
//!
//! This crate provides the core functionality of a validating reverse proxy
//! for Prometheus-compatible query APIs:
//! - Read-only traversal of parsed PromQL expression trees
//! - A chain of semantic validators (allowed `space` labels, time window,
//!   function range limits, step/range consistency)
//! - Bounded-concurrency admission with cancellation
//! - Streaming request forwarding to the backend
//!
//! # Overview
//!
//! `promgate-core` is framework-agnostic. Configuration is provided via the
//! [`ConfigProvider`] trait, allowing flexible configuration from any source.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use promgate_core::{
//!     AllowedSpaces, ConcurrencyProvider, ProxyConfig, ProxyProvider, ProxyState, RulesConfig,
//!     RulesProvider,
//! };
//!
//! struct MyConfig {
//!     proxy: ProxyConfig,
//!     rules: RulesConfig,
//! }
//!
//! impl ProxyProvider for MyConfig {
//!     fn proxy_config(&self) -> &ProxyConfig { &self.proxy }
//! }
//!
//! impl RulesProvider for MyConfig {
//!     fn rules_config(&self) -> &RulesConfig { &self.rules }
//! }
//!
//! impl ConcurrencyProvider for MyConfig {
//!     fn max_concurrency(&self) -> usize { 10 }
//! }
//!
//! let config = MyConfig {
//!     proxy: ProxyConfig::new("http://localhost:9090"),
//!     rules: RulesConfig::new(AllowedSpaces::new(["team-a"])),
//! };
//! let state = ProxyState::new(Arc::new(config)).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`types`] - Configuration types and the [`ConfigProvider`] trait
//! - [`error`] - Error types and result aliases
//! - [`expr`] - Expression tree traversal and rendering
//! - [`context`] - Per-request validation context
//! - [`validator`] - Validators and the validation pipeline
//! - [`admission`] - Bounded admission gate
//! - [`request_handler`] - HTTP request routing and forwarding

#![forbid(unsafe_code)]

pub mod admission;
pub mod context;
pub mod defaults;
pub mod duration;
pub mod error;
pub mod expr;
pub mod headers;
pub mod request_handler;
#[cfg(test)]
pub mod test_utils;
pub mod types;
pub mod validator;

// Re-export commonly used items at crate root
pub use admission::{AdmissionGate, AdmissionPermit};
pub use context::{QueryParams, RequestContext};
pub use error::{PromGateError, Result, ValidationError};
pub use request_handler::{ProxyBody, ProxyState, handle_request};
pub use types::{
    // Configuration structs
    AllowedSpaces,
    // Composable configuration traits
    ConcurrencyProvider,
    // Aggregated configuration trait
    ConfigProvider,
    ProxyConfig,
    ProxyProvider,
    RulesConfig,
    RulesProvider,
};
pub use validator::{ValidationPipeline, Validator};
