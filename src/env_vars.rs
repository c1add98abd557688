//! Environment variable names that override the configuration file

/// Server configuration
pub const PORT: &str = "PROMGATE_PORT";
pub const BIND: &str = "PROMGATE_BIND";
pub const MAX_CONCURRENCY: &str = "PROMGATE_MAX_CONCURRENCY";
pub const QUEUE_TIMEOUT_SECS: &str = "PROMGATE_QUEUE_TIMEOUT_SECS";

/// Backend configuration
pub const BACKEND_URL: &str = "PROMGATE_BACKEND_URL";
pub const PROXY_TIMEOUT_SECS: &str = "PROMGATE_PROXY_TIMEOUT_SECS";
pub const MAX_BODY_SIZE_MB: &str = "PROMGATE_MAX_BODY_SIZE_MB";

/// Validation rules
pub const ALLOWED_SPACES: &str = "PROMGATE_ALLOWED_SPACES";

/// Get all environment variable names for documentation/validation
pub fn all_env_vars() -> &'static [&'static str] {
    &[
        PORT,
        BIND,
        MAX_CONCURRENCY,
        QUEUE_TIMEOUT_SECS,
        BACKEND_URL,
        PROXY_TIMEOUT_SECS,
        MAX_BODY_SIZE_MB,
        ALLOWED_SPACES,
    ]
}
