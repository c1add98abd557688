//! HTTP request handling and proxying.
//!
//! This module routes incoming requests, validates PromQL on the query
//! endpoints and forwards everything else to the backend untouched.
//!
//! # Architecture
//!
//! The request handling flow for a query endpoint:
//! 1. Wait for an admission slot (or give up after the queue timeout)
//! 2. Decode the query string and, for form POSTs, the body
//! 3. Parse the expression and run the validation pipeline
//! 4. Forward the original request to the backend
//! 5. Stream the response back; the slot is released when the body ends
//!
//! `/health` answers locally, `/debug/parse` dumps the parsed tree and any
//! other path skips steps 1 to 3.
//!
//! # Connection Pooling
//!
//! [`ProxyState`] owns one [`reqwest::Client`], built with the configured
//! timeout and shared by every request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Collected, Full, LengthLimitError, Limited, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderMap, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionGate, AdmissionPermit};
use crate::context::{QueryParams, RequestContext};
use crate::error::{PromGateError, Result};
use crate::types::ConfigProvider;
use crate::validator::ValidationPipeline;
use crate::{expr, headers};

/// Boxed error type carried by response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body returned by [`handle_request`].
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Query endpoints subject to validation.
pub const QUERY_PATHS: &[&str] = &[
    "/api/v1/query",
    "/api/v1/query_range",
    "/select/0/prometheus/api/v1/query",
    "/select/0/prometheus/api/v1/query_range",
];

/// Liveness endpoint answered by the proxy itself.
pub const HEALTH_PATH: &str = "/health";

/// Expression tree dump endpoint.
pub const DEBUG_PARSE_PATH: &str = "/debug/parse";

/// How a request path is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    DebugParse,
    /// Admission, validation, then forwarding.
    Query,
    /// Forwarded without admission or validation.
    PassThrough,
}

impl Route {
    /// Classifies a request path. Matching is exact.
    pub fn for_path(path: &str) -> Self {
        match path {
            HEALTH_PATH => Route::Health,
            DEBUG_PARSE_PATH => Route::DebugParse,
            p if QUERY_PATHS.contains(&p) => Route::Query,
            _ => Route::PassThrough,
        }
    }
}

/// Process-wide state shared by every request.
///
/// Cloning is cheap: all fields are reference counted.
pub struct ProxyState<C> {
    config: Arc<C>,
    pipeline: Arc<ValidationPipeline>,
    gate: AdmissionGate,
    client: reqwest::Client,
}

impl<C> Clone for ProxyState<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            pipeline: self.pipeline.clone(),
            gate: self.gate.clone(),
            client: self.client.clone(),
        }
    }
}

impl<C: ConfigProvider> ProxyState<C> {
    /// Builds the standard pipeline, the admission gate and the HTTP client.
    ///
    /// # Errors
    ///
    /// [`PromGateError::ConfigError`] if the concurrency limit is zero or the
    /// client cannot be built.
    pub fn new(config: Arc<C>) -> Result<Self> {
        let pipeline = ValidationPipeline::standard(config.rules_config());
        Self::with_pipeline(config, pipeline)
    }

    /// Like [`ProxyState::new`] with a custom validation pipeline.
    pub fn with_pipeline(config: Arc<C>, pipeline: ValidationPipeline) -> Result<Self> {
        let gate = AdmissionGate::new(config.max_concurrency())?;
        let client = reqwest::Client::builder()
            .timeout(config.proxy_config().timeout)
            .build()
            .map_err(|e| PromGateError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            gate,
            client,
        })
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }
}

/// Handles an incoming HTTP request.
///
/// This is the main entry point for request processing. It never fails:
/// every error is turned into a plain-text response with the matching status.
///
/// # Arguments
///
/// * `req` - The incoming HTTP request
/// * `remote_addr` - Peer address, used for logging
/// * `state` - Shared proxy state
pub async fn handle_request<C, B>(
    req: Request<B>,
    remote_addr: SocketAddr,
    state: ProxyState<C>,
) -> std::result::Result<Response<ProxyBody>, Infallible>
where
    C: ConfigProvider,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let route = Route::for_path(req.uri().path());
    let response = match route {
        Route::Health => text_response(StatusCode::OK, "OK"),
        Route::DebugParse => debug_parse(&req),
        Route::Query => handle_query(req, remote_addr, &state).await,
        Route::PassThrough => {
            let (parts, body) = req.into_parts();
            match forward(&parts, outbound_body(body), &state).await {
                Ok(response) => relay_response(response, None),
                Err(err) => error_response(&err),
            }
        }
    };

    Ok(response)
}

async fn handle_query<C, B>(
    req: Request<B>,
    remote_addr: SocketAddr,
    state: &ProxyState<C>,
) -> Response<ProxyBody>
where
    C: ConfigProvider,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let proxy_config = state.config.proxy_config();

    let permit = match state
        .gate
        .acquire(tokio::time::sleep(proxy_config.queue_timeout))
        .await
    {
        Ok(permit) => permit,
        Err(err) => return error_response(&err),
    };

    let (parts, body) = req.into_parts();
    let log = RequestLog::new(remote_addr, &parts, started, permit);

    let mut params = QueryParams::from_uri(&parts.uri);
    let body = if is_form_post(&parts) {
        match read_form_body(body, proxy_config.max_body_size).await {
            Ok(bytes) => {
                params.prepend_form(&bytes);
                Some(reqwest::Body::from(bytes))
            }
            Err(err) => return log.finish(error_response(&err)),
        }
    } else {
        outbound_body(body)
    };

    if params.has_query() {
        if let Err(err) = validate(&parts, &params, &state.pipeline) {
            return log.finish(error_response(&err));
        }
    } else {
        debug!(path = %parts.uri.path(), "No query parameter, forwarding unvalidated");
    }

    match forward(&parts, body, state).await {
        Ok(response) => relay_response(response, Some(log)),
        Err(err) => log.finish(error_response(&err)),
    }
}

fn validate(parts: &Parts, params: &QueryParams, pipeline: &ValidationPipeline) -> Result<()> {
    let ctx = RequestContext::from_params(parts.uri.path(), params)?;
    pipeline.run(&ctx)?;
    Ok(())
}

fn is_form_post(parts: &Parts) -> bool {
    parts.method == Method::POST
        && parts
            .headers
            .get(headers::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(headers::is_form_urlencoded)
}

/// Buffers a form body, bounded by `max` bytes (0 = unlimited).
async fn read_form_body<B>(body: B, max: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let collected: std::result::Result<Collected<Bytes>, BoxError> = if max == 0 {
        body.collect().await.map_err(Into::into)
    } else {
        Limited::new(body, max).collect().await
    };

    match collected {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(PromGateError::BodyTooLarge { max }),
        Err(err) => Err(PromGateError::BodyReadError(err.to_string())),
    }
}

/// Streams the client body to the backend without buffering it.
///
/// Returns `None` for an empty body so none is sent.
fn outbound_body<B>(body: B) -> Option<reqwest::Body>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    (!body.is_end_stream()).then(|| reqwest::Body::wrap_stream(body.into_data_stream()))
}

/// Sends the request to `<backend><path>?<query>` with the client's headers.
async fn forward<C: ConfigProvider>(
    parts: &Parts,
    body: Option<reqwest::Body>,
    state: &ProxyState<C>,
) -> Result<reqwest::Response> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let target = format!(
        "{}{}",
        state.config.proxy_config().backend_base(),
        path_and_query
    );
    let url = reqwest::Url::parse(&target)
        .map_err(|e| PromGateError::InvalidBackendUrl(format!("{target}: {e}")))?;

    let mut request = state
        .client
        .request(parts.method.clone(), url)
        .headers(copy_headers(&parts.headers));
    if let Some(body) = body {
        request = request.body(body);
    }

    Ok(request.send().await?)
}

/// Copies every header except those owned by the connection.
fn copy_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if !headers::is_connection_managed(name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Streams a backend response to the client.
///
/// When `log` is set it travels with the body, so the admission slot is held
/// until the last chunk has been sent or the client goes away.
fn relay_response(upstream: reqwest::Response, log: Option<RequestLog>) -> Response<ProxyBody> {
    let status = upstream.status();
    let headers = copy_headers(upstream.headers());

    let mut log = log;
    if let Some(log) = log.as_mut() {
        log.status = Some(status);
    }

    let stream = upstream
        .bytes_stream()
        .inspect(move |chunk| {
            if let Some(log) = log.as_mut() {
                log.observe(chunk);
            }
        })
        .map_ok(Frame::data)
        .map_err(BoxError::from);

    let mut response = Response::new(StreamBody::new(stream).boxed_unsync());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Dumps the parsed expression tree for `?query=`.
fn debug_parse<B>(req: &Request<B>) -> Response<ProxyBody> {
    let params = QueryParams::from_uri(req.uri());
    let Some(query) = params.get_non_empty("query") else {
        return error_response(&PromGateError::MissingQuery);
    };

    match expr::parse(query) {
        Ok(tree) => {
            let body = format!(
                "Query: {query}\n\nSimplified Expression Tree:\n{}\n{}",
                "=".repeat(30),
                expr::render_tree(&tree)
            );
            text_response(StatusCode::OK, body)
        }
        Err(err) => error_response(&err),
    }
}

/// Converts an error to a response, logging server-side causes.
fn error_response(err: &PromGateError) -> Response<ProxyBody> {
    if err.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        debug!(error = %err, "Request rejected");
    }
    create_error_response(err.status_code(), &err.user_message())
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ProxyBody> {
    let mut response = Response::new(
        Full::new(body.into())
            .map_err(|never| match never {})
            .boxed_unsync(),
    );
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(headers::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Creates a standardized error response.
///
/// Builds an HTTP response with the given status code and plain text message.
///
/// # Example
///
/// ```
/// use promgate_core::request_handler::create_error_response;
/// use hyper::StatusCode;
///
/// let response = create_error_response(StatusCode::BAD_REQUEST, "missing query parameter");
/// assert_eq!(response.status(), StatusCode::BAD_REQUEST);
/// ```
pub fn create_error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    text_response(status, message.to_string())
}

/// Per-request record emitted once the request is done.
///
/// Owns the admission permit, so dropping it frees the slot and writes the
/// log line.
struct RequestLog {
    remote_addr: SocketAddr,
    method: Method,
    path: String,
    query: String,
    started: Instant,
    status: Option<StatusCode>,
    bytes: u64,
    _permit: AdmissionPermit,
}

impl RequestLog {
    fn new(remote_addr: SocketAddr, parts: &Parts, started: Instant, permit: AdmissionPermit) -> Self {
        Self {
            remote_addr,
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            started,
            status: None,
            bytes: 0,
            _permit: permit,
        }
    }

    /// Records the status of a locally generated response and ends the request.
    fn finish(mut self, response: Response<ProxyBody>) -> Response<ProxyBody> {
        self.status = Some(response.status());
        response
    }

    fn observe(&mut self, chunk: &reqwest::Result<Bytes>) {
        match chunk {
            Ok(bytes) => self.bytes += bytes.len() as u64,
            Err(err) => warn!(
                remote_addr = %self.remote_addr,
                path = %self.path,
                error = %err,
                "Response stream failed"
            ),
        }
    }
}

impl Drop for RequestLog {
    fn drop(&mut self) {
        info!(
            remote_addr = %self.remote_addr,
            method = %self.method,
            path = %self.path,
            query = %self.query,
            status = self.status.map(|s| s.as_u16()),
            bytes = self.bytes,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Processed request"
        );
    }
}
