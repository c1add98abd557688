//! End-to-end tests: a real PromGate listener in front of a stub backend.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use promgate::config::{FileConfig, Settings};
use promgate::connection::ConnectionTracker;
use promgate::{ProxyState, server};

// ===========================================
// Stub backend
// ===========================================

/// Records what the backend saw and how busy it was.
#[derive(Default)]
struct BackendState {
    delay: Duration,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

async fn backend_handler(
    req: Request<Incoming>,
    state: Arc<BackendState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(now, Ordering::SeqCst);

    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    let status = if parts.uri.path().ends_with("/teapot") {
        StatusCode::IM_A_TEAPOT
    } else {
        StatusCode::OK
    };
    let custom = parts
        .headers
        .get("x-custom")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let echo = format!(
        "{} {}\n{}",
        parts.method,
        parts.uri,
        String::from_utf8_lossy(&body)
    );

    let response = Response::builder()
        .status(status)
        .header("x-backend-server", "stub")
        .header("x-seen-custom", custom)
        .body(Full::new(Bytes::from(echo)))
        .unwrap();
    Ok(response)
}

async fn start_backend(state: Arc<BackendState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let state = state.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| backend_handler(req, state.clone()));
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

// ===========================================
// Test environment
// ===========================================

struct TestEnvironment {
    proxy_addr: SocketAddr,
    backend: Arc<BackendState>,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl TestEnvironment {
    async fn start() -> Self {
        Self::start_with(4, Duration::from_secs(5), Duration::ZERO).await
    }

    async fn start_with(max_concurrency: usize, queue_timeout: Duration, delay: Duration) -> Self {
        let backend = Arc::new(BackendState {
            delay,
            ..Default::default()
        });
        let backend_addr = start_backend(backend.clone()).await;

        let yaml = format!(
            "server:\n  bind: \"127.0.0.1\"\n  max_concurrency: {max_concurrency}\nprometheus:\n  url: \"http://{backend_addr}\"\n  timeout_secs: 10\nrules:\n  allowed_spaces: [team-a, team-b]\n"
        );
        let mut settings = Settings::from_file_config(FileConfig::from_yaml(&yaml).unwrap()).unwrap();
        settings.proxy.queue_timeout = queue_timeout;
        let state = ProxyState::new(Arc::new(settings)).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server::serve(
            listener,
            state,
            ConnectionTracker::new(),
            async {
                let _ = rx.await;
            },
        ));

        Self {
            proxy_addr,
            backend,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            server,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.proxy_addr, path)
    }

    async fn query(&self, path: &str, params: &[(&str, &str)]) -> (StatusCode, String) {
        let resp = self
            .client
            .get(self.url(path))
            .query(params)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.text().await.unwrap())
    }

    fn backend_requests(&self) -> usize {
        self.backend.requests.load(Ordering::SeqCst)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.server.await;
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// ===========================================
// Routing
// ===========================================

#[tokio::test]
async fn test_health_answers_locally() {
    let env = TestEnvironment::start().await;

    let (status, body) = env.query("/health", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(env.backend_requests(), 0);

    env.stop().await;
}

#[tokio::test]
async fn test_debug_parse_renders_tree() {
    let env = TestEnvironment::start().await;

    let (status, body) = env
        .query("/debug/parse", &[("query", "sum(rate(up{space=\"team-a\"}[5m]))")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("Query: sum(rate(up{space=\"team-a\"}[5m]))"));
    assert!(body.contains("Simplified Expression Tree:"));
    assert!(body.contains("Call: rate()"));
    assert_eq!(env.backend_requests(), 0);

    env.stop().await;
}

#[tokio::test]
async fn test_pass_through_is_not_validated() {
    let env = TestEnvironment::start().await;

    let (status, body) = env
        .query("/api/v1/labels", &[("match[]", "up")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("GET /api/v1/labels?match%5B%5D=up"));
    assert_eq!(env.backend_requests(), 1);

    env.stop().await;
}

// ===========================================
// Forwarding
// ===========================================

#[tokio::test]
async fn test_valid_query_forwarded() {
    let env = TestEnvironment::start().await;

    let resp = env
        .client
        .get(env.url("/api/v1/query"))
        .query(&[("query", "sum(rate(http_requests_total{space=\"team-a\"}[5m]))")])
        .header("x-custom", "kept")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-backend-server"], "stub");
    assert_eq!(resp.headers()["x-seen-custom"], "kept");
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("GET /api/v1/query?query="));

    env.stop().await;
}

#[tokio::test]
async fn test_backend_status_propagated() {
    let env = TestEnvironment::start().await;

    let (status, _) = env.query("/api/v1/status/teapot", &[]).await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);

    env.stop().await;
}

#[tokio::test]
async fn test_range_query_forwarded() {
    let env = TestEnvironment::start().await;
    let end = unix_now();
    let start = (end - 3600).to_string();
    let end = end.to_string();

    let (status, body) = env
        .query(
            "/api/v1/query_range",
            &[
                ("query", "up{space=\"team-b\"}"),
                ("start", &start),
                ("end", &end),
                ("step", "1m"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(env.backend_requests(), 1);

    env.stop().await;
}

#[tokio::test]
async fn test_query_without_query_param_forwarded() {
    let env = TestEnvironment::start().await;

    let (status, _) = env.query("/api/v1/query", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.backend_requests(), 1);

    env.stop().await;
}

#[tokio::test]
async fn test_form_post_forwarded_unchanged() {
    let env = TestEnvironment::start().await;

    let resp = env
        .client
        .post(env.url("/api/v1/query"))
        .form(&[("query", "up{space=\"team-a\"}")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("POST /api/v1/query\n"));
    assert!(body.ends_with("query=up%7Bspace%3D%22team-a%22%7D"));

    env.stop().await;
}

// ===========================================
// Rejections
// ===========================================

#[tokio::test]
async fn test_rejections_never_reach_backend() {
    let env = TestEnvironment::start().await;

    let cases: &[(&str, &[(&str, &str)], &str)] = &[
        (
            "/api/v1/query",
            &[("query", "up")],
            "all metrics in the query must have a 'space' label",
        ),
        (
            "/api/v1/query",
            &[("query", "vector(1)")],
            "query must contain at least one metric with a 'space' label",
        ),
        (
            "/api/v1/query",
            &[("query", "up{space=\"team-a\"} / node_load1")],
            "all metrics in the query must have a 'space' label",
        ),
        (
            "/api/v1/query",
            &[("query", "up{space=\"team-z\"}")],
            "space values team-z with matcher = are not allowed",
        ),
        (
            "/api/v1/query",
            &[("query", "up{space=\"team-a\"}"), ("time", "0")],
            "timestamp must be within 2h from now",
        ),
        (
            "/api/v1/query",
            &[("query", "increase(up{space=\"team-a\"}[2d])")],
            "increase function time range 48h cannot exceed 24h",
        ),
        (
            "/api/v1/query",
            &[("query", "sum(up{space=\"team-a\"}")],
            "invalid PromQL syntax",
        ),
        (
            "/api/v1/query_range",
            &[("query", "up{space=\"team-a\"}"), ("step", "30s")],
            "step must be at least 1 minute",
        ),
        (
            "/api/v1/query_range",
            &[("query", "up{space=\"team-a\"}"), ("step", "often")],
            "invalid step format",
        ),
    ];

    for (path, params, expected) in cases {
        let (status, body) = env.query(path, params).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{params:?}");
        assert!(body.contains(expected), "{params:?}: {body}");
    }
    assert_eq!(env.backend_requests(), 0);

    env.stop().await;
}

#[tokio::test]
async fn test_form_body_cannot_bypass_validation() {
    let env = TestEnvironment::start().await;

    let resp = env
        .client
        .post(env.url("/api/v1/query?query=up%7Bspace%3D%22team-a%22%7D"))
        .form(&[("query", "up")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(env.backend_requests(), 0);

    env.stop().await;
}

// ===========================================
// Admission
// ===========================================

#[tokio::test]
async fn test_admission_limits_backend_concurrency() {
    let env = Arc::new(
        TestEnvironment::start_with(2, Duration::from_secs(10), Duration::from_millis(300)).await,
    );

    let mut handles = Vec::new();
    for _ in 0..3 {
        let env = env.clone();
        handles.push(tokio::spawn(async move {
            env.query("/api/v1/query", &[("query", "up{space=\"team-a\"}")])
                .await
                .0
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(env.backend_requests(), 3);
    assert!(env.backend.peak.load(Ordering::SeqCst) <= 2);

    if let Ok(env) = Arc::try_unwrap(env) {
        env.stop().await;
    }
}

#[tokio::test]
async fn test_queued_request_cancelled_after_queue_timeout() {
    let env = Arc::new(
        TestEnvironment::start_with(1, Duration::from_millis(100), Duration::from_millis(1500))
            .await,
    );

    let first = {
        let env = env.clone();
        tokio::spawn(async move {
            env.query("/api/v1/query", &[("query", "up{space=\"team-a\"}")])
                .await
                .0
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (status, body) = env
        .query("/api/v1/query", &[("query", "up{space=\"team-b\"}")])
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body, "Request cancelled");

    // Pass-through traffic is not gated.
    let (status, _) = env.query("/health", &[]).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first.await.unwrap(), StatusCode::OK);
    assert_eq!(env.backend_requests(), 1);

    if let Ok(env) = Arc::try_unwrap(env) {
        env.stop().await;
    }
}

#[tokio::test]
async fn test_client_disconnect_while_queued_never_reaches_backend() {
    let env = Arc::new(
        TestEnvironment::start_with(1, Duration::from_secs(10), Duration::from_millis(800)).await,
    );

    let first = {
        let env = env.clone();
        tokio::spawn(async move {
            env.query("/api/v1/query", &[("query", "up{space=\"team-a\"}")])
                .await
                .0
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Gives up while still waiting for the only slot.
    let err = env
        .client
        .get(env.url("/api/v1/query"))
        .query(&[("query", "up{space=\"team-b\"}")])
        .timeout(Duration::from_millis(100))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    assert_eq!(first.await.unwrap(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(env.backend_requests(), 1);

    // The abandoned wait did not keep the slot.
    let (status, _) = env
        .query("/api/v1/query", &[("query", "up{space=\"team-a\"}")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.backend_requests(), 2);

    if let Ok(env) = Arc::try_unwrap(env) {
        env.stop().await;
    }
}
