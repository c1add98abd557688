//! HTTP header constants for PromGate.
//!
//! This module centralizes the header names the proxy treats specially.
//! Everything else is copied verbatim in both directions.

/// Content-Type header.
pub const CONTENT_TYPE: &str = "content-type";

/// Host header.
pub const HOST: &str = "host";

/// Transfer-Encoding header.
pub const TRANSFER_ENCODING: &str = "transfer-encoding";

/// Form content type accepted for POSTed query parameters.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Headers describing the framing of the client connection rather than the message.
///
/// The HTTP client and server regenerate these for their own connection, so
/// they are not copied across.
pub const CONNECTION_MANAGED: &[&str] = &[HOST, TRANSFER_ENCODING];

/// Check if a header is owned by the connection and must not be copied.
///
/// # Arguments
///
/// * `header_name` - The header name to check (lowercase).
///
/// # Example
///
/// ```
/// use promgate_core::headers::is_connection_managed;
///
/// assert!(is_connection_managed("host"));
/// assert!(is_connection_managed("transfer-encoding"));
/// assert!(!is_connection_managed("authorization"));
/// ```
pub fn is_connection_managed(header_name: &str) -> bool {
    CONNECTION_MANAGED.contains(&header_name)
}

/// Returns true if the content type denotes a form-encoded body.
///
/// Parameters such as `charset` are ignored.
pub fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}
