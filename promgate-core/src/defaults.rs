//! Default configuration values for PromGate.
//!
//! This module centralizes all default values used throughout PromGate,
//! ensuring consistency between production code and tests.

use std::time::Duration;

/// Default listen port.
pub const PORT: u16 = 8080;

/// Default bind address.
pub const BIND: &str = "0.0.0.0";

/// Default maximum number of query requests processed concurrently.
pub const MAX_CONCURRENCY: usize = 10;

/// Default backend base URL.
pub const BACKEND_URL: &str = "http://localhost:9090";

/// Default proxy timeout in seconds.
pub const PROXY_TIMEOUT_SECS: u64 = 30;

/// Default proxy timeout duration.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(PROXY_TIMEOUT_SECS);

/// Default maximum buffered body size in megabytes (form-encoded query bodies only).
pub const MAX_BODY_SIZE_MB: usize = 10;

/// Default maximum buffered body size in bytes.
pub const MAX_BODY_SIZE: usize = MAX_BODY_SIZE_MB * 1024 * 1024;

/// Default lookback window for `start` and `time` parameters, in seconds.
pub const MAX_LOOKBACK_SECS: u64 = 2 * 60 * 60;

/// Default lookback window for `start` and `time` parameters.
pub const MAX_LOOKBACK: Duration = Duration::from_secs(MAX_LOOKBACK_SECS);

/// Default cap on range-vector windows of tracked functions, in seconds.
pub const MAX_FUNCTION_RANGE_SECS: u64 = 24 * 60 * 60;

/// Default cap on range-vector windows of tracked functions.
pub const MAX_FUNCTION_RANGE: Duration = Duration::from_secs(MAX_FUNCTION_RANGE_SECS);

/// Label every selector must restrict.
pub const SPACE_LABEL: &str = "space";

/// Step bands for range queries, largest step first: `(min_step, max_span)`.
///
/// Steps below the last band are rejected.
pub const STEP_BANDS: &[(Duration, Duration)] = &[
    (Duration::from_secs(10 * 60), Duration::from_secs(24 * 60 * 60)),
    (Duration::from_secs(5 * 60), Duration::from_secs(24 * 60 * 60)),
    (Duration::from_secs(2 * 60), Duration::from_secs(12 * 60 * 60)),
    (Duration::from_secs(60), Duration::from_secs(6 * 60 * 60)),
];
