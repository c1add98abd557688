//! Error types for PromGate.
//!
//! This module provides a unified error type for request parsing, validation,
//! admission and proxying, along with the HTTP status each maps to.

use thiserror::Error;

/// Result type alias for PromGate operations.
pub type Result<T> = std::result::Result<T, PromGateError>;

/// A semantic rejection reported by one validator.
///
/// # Example
///
/// ```
/// use promgate_core::error::ValidationError;
///
/// let err = ValidationError::new("range_query", "step must be at least 1 minute");
/// assert_eq!(err.to_string(), "step must be at least 1 minute");
/// assert_eq!(err.rule(), "range_query");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    rule: &'static str,
    reason: String,
}

impl ValidationError {
    /// Creates a new validation error for the named rule.
    pub fn new(rule: &'static str, reason: impl Into<String>) -> Self {
        Self {
            rule,
            reason: reason.into(),
        }
    }

    /// Name of the validator that rejected the request.
    pub fn rule(&self) -> &'static str {
        self.rule
    }

    /// Human-readable rejection reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Unified error type for PromGate operations.
///
/// # Example
///
/// ```
/// use promgate_core::error::{PromGateError, Result};
///
/// fn require_query(query: &str) -> Result<()> {
///     if query.is_empty() {
///         return Err(PromGateError::MissingQuery);
///     }
///     Ok(())
/// }
///
/// assert!(require_query("").is_err());
/// ```
#[derive(Debug, Error)]
pub enum PromGateError {
    /// The `query` parameter is missing or empty.
    #[error("missing query parameter")]
    MissingQuery,

    /// The expression could not be parsed.
    #[error("invalid PromQL syntax: {0}")]
    InvalidQuery(String),

    /// A validator rejected the request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The caller gave up while waiting for an admission slot.
    #[error("Request cancelled")]
    RequestCancelled,

    /// The admission gate was closed.
    #[error("admission gate closed")]
    AdmissionClosed,

    /// Request body too large to buffer.
    #[error("Request body too large (max: {max} bytes)")]
    BodyTooLarge {
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// Failed to read the request body.
    #[error("Body read error: {0}")]
    BodyReadError(String),

    /// The outbound URL could not be built.
    #[error("invalid backend url: {0}")]
    InvalidBackendUrl(String),

    /// Backend request or response stream failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Configuration error (missing or invalid values).
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PromGateError {
    /// Returns the HTTP status code that should be returned to the client.
    pub fn status_code(&self) -> hyper::StatusCode {
        use hyper::StatusCode;

        match self {
            Self::MissingQuery => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RequestCancelled => StatusCode::REQUEST_TIMEOUT,
            Self::AdmissionClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyReadError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBackendUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message sent to the client.
    ///
    /// Client errors carry their specific reason. Server errors are reduced
    /// to a generic message; the cause is only logged.
    pub fn user_message(&self) -> String {
        if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Returns true if this error should be logged at error level.
    ///
    /// Validation rejections and cancellations are expected and only
    /// logged at debug level.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::AdmissionClosed
                | Self::InvalidBackendUrl(_)
                | Self::Upstream(_)
                | Self::ConfigError(_)
        )
    }
}
