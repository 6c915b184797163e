// src/testing.rs
// =============================================================================
// Test helpers: a local HTTP server with a handful of well-known endpoints,
// and a configuration tuned for fast tests (millisecond backoff).
//
//   /ok       200 "ok"
//   /moved    301 -> /ok
//   /hop      302 -> /moved
//   /loop     302 -> /loop
//   /flaky    503 twice, then 200
//   /limited  429 forever
//   /bounce   first hit 302 -> /unavailable (503), 200 afterwards
//   /echo     200, echoes the User-Agent back as X-Seen-User-Agent
// =============================================================================

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;

use crate::checker::RetryPolicy;
use crate::config::{build_headers, CheckerConfig};

pub struct TestServer {
    addr: SocketAddr,
    flaky_hits: Arc<AtomicUsize>,
    bounce_hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn flaky_hits(&self) -> usize {
        self.flaky_hits.load(Ordering::SeqCst)
    }

    pub fn bounce_hits(&self) -> usize {
        self.bounce_hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_server() -> TestServer {
    let flaky_hits = Arc::new(AtomicUsize::new(0));
    let hits = flaky_hits.clone();
    let bounce_hits = Arc::new(AtomicUsize::new(0));
    let bounces = bounce_hits.clone();

    let app = Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route(
            "/moved",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/ok")]) }),
        )
        .route(
            "/hop",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/moved")]) }),
        )
        .route(
            "/loop",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/loop")]) }),
        )
        .route(
            "/flaky",
            get(move || {
                let hits = hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        )
        .route("/limited", get(|| async { StatusCode::TOO_MANY_REQUESTS }))
        .route(
            "/bounce",
            get(move || {
                let bounces = bounces.clone();
                async move {
                    if bounces.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::FOUND, [(header::LOCATION, "/unavailable")])
                    } else {
                        (StatusCode::OK, [(header::CACHE_CONTROL, "no-store")])
                    }
                }
            }),
        )
        .route(
            "/unavailable",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        )
        .route(
            "/echo",
            get(|headers: HeaderMap| async move {
                let ua = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                ([("x-seen-user-agent", ua)], "echo")
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        flaky_hits,
        bounce_hits,
    }
}

/// Default configuration with quick retries and a recognisable User-Agent.
pub fn fast_config() -> CheckerConfig {
    CheckerConfig {
        workers: 2,
        batch_size: 2,
        headers: build_headers(&[], None, "linkprobe-test").unwrap(),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            concurrency: 3,
        },
        ..CheckerConfig::default()
    }
}
