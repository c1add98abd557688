//! Duration parsing and formatting in PromQL notation.

use std::time::Duration;

/// Parses a step value such as `30s`, `10m` or `1h30m`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use promgate_core::duration::parse_step;
///
/// assert_eq!(parse_step("10m").unwrap(), Duration::from_secs(600));
/// assert!(parse_step("ten minutes").is_err());
/// ```
pub fn parse_step(step: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(step.trim())
}

/// Formats a duration compactly, largest unit first: `25h`, `1h30m`, `45s`, `250ms`.
///
/// Days are not used so that hour-based limits read naturally.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use promgate_core::duration::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(25 * 3600)), "25h");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
/// ```
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    let total_ms = duration.as_millis();
    let units: [(u128, &str); 4] = [
        (3_600_000, "h"),
        (60_000, "m"),
        (1_000, "s"),
        (1, "ms"),
    ];

    let mut remaining = total_ms;
    let mut out = String::new();
    for (size, suffix) in units {
        let count = remaining / size;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push_str(suffix);
            remaining %= size;
        }
    }

    if out.is_empty() {
        // Sub-millisecond durations.
        format!("{}ns", duration.as_nanos())
    } else {
        out
    }
}
