//! Per-request validation context.
//!
//! A [`RequestContext`] is built once from the request's parameters, handed
//! read-only to every validator, and dropped when the request ends.

use chrono::{DateTime, TimeZone, Utc};
use hyper::Uri;
use promql_parser::parser::Expr;
use url::form_urlencoded;

use crate::error::{PromGateError, Result};
use crate::expr;

/// Marker in the request path identifying a range query.
pub const RANGE_QUERY_MARKER: &str = "query_range";

/// Decoded request parameters, in precedence order.
///
/// Lookups return the first occurrence of a key.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decodes an `application/x-www-form-urlencoded` string.
    pub fn parse(raw: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(raw.as_bytes()).into_owned().collect(),
        }
    }

    /// Decodes the query string of a request URI.
    pub fn from_uri(uri: &Uri) -> Self {
        Self::parse(uri.query().unwrap_or_default())
    }

    /// Adds form body parameters ahead of the URL ones.
    ///
    /// Prometheus gives body values precedence over the query string, so the
    /// proxy must validate the same value the backend will evaluate.
    pub fn prepend_form(&mut self, body: &[u8]) {
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(body).into_owned().collect();
        pairs.append(&mut self.pairs);
        self.pairs = pairs;
    }

    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value for `key` if it is non-empty.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Returns true if a non-empty `query` parameter is present.
    pub fn has_query(&self) -> bool {
        self.get_non_empty("query").is_some()
    }
}

/// Parses a `start`, `end` or `time` parameter.
///
/// Accepts Unix seconds (fractions kept to the millisecond) or RFC 3339.
/// Anything else yields `None`.
///
/// # Example
///
/// ```
/// use promgate_core::context::parse_time_param;
///
/// assert_eq!(parse_time_param("1700000000").unwrap().timestamp(), 1_700_000_000);
/// assert!(parse_time_param("2024-01-01T00:00:00Z").is_some());
/// assert!(parse_time_param("yesterday").is_none());
/// ```
pub fn parse_time_param(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        if !secs.is_finite() {
            return None;
        }
        let millis = (secs * 1000.0).round() as i64;
        return Utc.timestamp_millis_opt(millis).single();
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Everything the validators know about one query request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    query: String,
    expr: Expr,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    time: Option<DateTime<Utc>>,
    step: Option<String>,
    is_range: bool,
}

impl RequestContext {
    /// Parses `query` into a context with no time parameters.
    ///
    /// # Errors
    ///
    /// [`PromGateError::MissingQuery`] for an empty query and
    /// [`PromGateError::InvalidQuery`] for a syntax error.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(PromGateError::MissingQuery);
        }
        let expr = expr::parse(&query)?;

        Ok(Self {
            query,
            expr,
            start: None,
            end: None,
            time: None,
            step: None,
            is_range: false,
        })
    }

    /// Builds the context for a request to `path` with the given parameters.
    ///
    /// Time parameters are best effort: unparsable values are treated as absent.
    pub fn from_params(path: &str, params: &QueryParams) -> Result<Self> {
        let query = params
            .get_non_empty("query")
            .ok_or(PromGateError::MissingQuery)?;

        Ok(Self::new(query)?
            .with_range(
                params.get_non_empty("start").and_then(parse_time_param),
                params.get_non_empty("end").and_then(parse_time_param),
            )
            .with_time(params.get_non_empty("time").and_then(parse_time_param))
            .with_step(params.get_non_empty("step").map(str::to_string))
            .with_range_query(path.contains(RANGE_QUERY_MARKER)))
    }

    /// Sets `start` and `end`.
    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Sets the instant-query `time`.
    pub fn with_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.time = time;
        self
    }

    /// Sets the raw `step` value.
    pub fn with_step(mut self, step: Option<String>) -> Self {
        self.step = step;
        self
    }

    /// Marks the request as a range query.
    pub fn with_range_query(mut self, is_range: bool) -> Self {
        self.is_range = is_range;
        self
    }

    /// Raw query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Root of the parsed expression tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// The instant-query evaluation time.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Raw, unvalidated step.
    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    pub fn is_range(&self) -> bool {
        self.is_range
    }
}
