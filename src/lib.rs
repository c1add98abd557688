//! PromGate - a validating reverse proxy for Prometheus-compatible query APIs
//!
//! Every PromQL query sent to the query endpoints is parsed and checked
//! against a set of rules before it is forwarded to the backend.
//!
//! # Overview
//!
//! PromGate sits in front of Prometheus, VictoriaMetrics or any server
//! speaking the Prometheus HTTP API and provides:
//! - Mandatory `space` label restrictions on every selector
//! - Bounded lookback for instant and range queries
//! - Caps on `increase` and `*_over_time` range windows
//! - Step/range consistency for range queries
//! - Bounded concurrency for query requests
//! - Structured logging with JSON support
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use promgate::{ProxyState, Settings};
//!
//! let settings = Settings::load(Path::new("config.yaml")).unwrap();
//! let state = ProxyState::new(Arc::new(settings)).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from YAML and environment variables
//! - [`env_vars`] - Environment variable constants
//! - [`connection`] - Connection tracking for graceful shutdown
//! - [`server`] - Logging setup, startup info and the accept loop
//! - [`args`] - Command line argument parsing
//!
//! # Re-exports from promgate-core
//!
//! Core functionality is provided by the `promgate-core` crate:
//! - [`validator`] - Query validators and the validation pipeline
//! - [`request_handler`] - HTTP request routing and forwarding
//! - [`types`] - Configuration types and provider traits

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod connection;
pub mod env_vars;
pub mod server;

// Re-export promgate-core modules
pub use promgate_core::request_handler;
pub use promgate_core::types;
pub use promgate_core::validator;

// Re-export commonly used items at crate root
pub use config::{FileConfig, Settings};
pub use connection::ConnectionTracker;
pub use promgate_core::{
    // Aggregated configuration trait
    ConfigProvider,
    PromGateError,
    // Shared request state
    ProxyState,
    ValidationPipeline,
    handle_request,
};
