// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - One long-lived reqwest Client per worker (connection pooling, timeouts,
//   relaxed certificate checks so self-signed hosts can still be probed)
// - Every request goes through the retry engine (retry.rs); retries share a
//   limiter with the other workers of the run
// - Redirect hops are captured by the worker's RedirectRecorder
// - Response bodies are drained and thrown away, never inspected
//
// Whatever happens, check() returns exactly one LinkResult per link. A URL
// that cannot even be turned into a request, or a host that never answers,
// becomes a result without a status code and with the error as its comment.
// =============================================================================

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use reqwest::{Client, Request, Response};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use super::redirect::RedirectRecorder;
use super::result::{header_table, LinkResult};
use super::retry::classify_response;
use crate::config::{CheckerConfig, HttpSettings};
use crate::error::CheckerError;

/// Checks links one at a time for a single worker.
pub struct Prober {
    client: Client,
    recorder: RedirectRecorder,
    config: Arc<CheckerConfig>,
    retry_limiter: Arc<Semaphore>,
}

impl Prober {
    /// `retry_limiter` is shared with the other workers of the run.
    pub fn new(
        config: Arc<CheckerConfig>,
        retry_limiter: Arc<Semaphore>,
    ) -> Result<Self, CheckerError> {
        let recorder = RedirectRecorder::new();
        let client = build_client(&config.http, &recorder).map_err(CheckerError::ClientBuild)?;
        Ok(Self {
            client,
            recorder,
            config,
            retry_limiter,
        })
    }

    /// Checks one link and describes the outcome.
    ///
    /// `payload` is the record the link came from; it is copied into the
    /// result untouched.
    pub async fn check(&self, link: &str, payload: &Value) -> LinkResult {
        let result = self.check_inner(link, payload).await;
        // Always, so one link's redirects never show up on the next.
        self.recorder.reset();
        result
    }

    async fn check_inner(&self, link: &str, payload: &Value) -> LinkResult {
        let request = match self.build_request(link) {
            Ok(request) => request,
            Err(err) => {
                let text = error_text(&err);
                warn!(link, error = %text, "failed to create request");
                return LinkResult::failed(link, payload, text, None);
            }
        };

        debug!(link, method = %self.config.method, "checking");
        let started = Instant::now();
        let outcome = self.execute(request.url()).await;
        let elapsed = started.elapsed();

        match outcome {
            Err(err) => {
                let text = error_text(&err);
                warn!(link, error = %text, ?elapsed, "request failed");
                LinkResult::failed(link, payload, text, Some(elapsed))
            }
            Ok(response) => {
                let status = response.status();
                let headers = header_table(response.headers());
                drain(response).await;
                debug!(link, status = status.as_u16(), ?elapsed, "checked");

                LinkResult {
                    link: link.to_string(),
                    request_headers: Some(header_table(&self.config.headers))
                        .filter(|table| !table.is_empty()),
                    status: Some(status.as_u16()),
                    timestamp: Utc::now(),
                    elapsed: Some(elapsed),
                    comment: self.config.method.to_string(),
                    payload: payload.clone(),
                    headers: Some(headers).filter(|table| !table.is_empty()),
                    redirects: self.recorder.entries(),
                }
            }
        }
    }

    // The configured method, no body, and the shared header set.
    fn build_request<U: reqwest::IntoUrl>(&self, url: U) -> Result<Request, reqwest::Error> {
        self.client
            .request(self.config.method.clone(), url)
            .headers(self.config.headers.clone())
            .build()
    }

    /// Sends the request under the retry policy and returns the final
    /// response or the final error.
    async fn execute(&self, url: &Url) -> Result<Response, reqwest::Error> {
        self.config
            .retry
            .run(
                &self.retry_limiter,
                |attempt| async move {
                    // Only the final attempt's hops belong in the result.
                    self.recorder.reset();
                    if attempt > 1 {
                        debug!(url = %url, attempt, "retrying");
                    }
                    let request = self.build_request(url.clone())?;
                    self.client.execute(request).await
                },
                classify_response,
            )
            .await
    }
}

/// Builds the per-worker client with the recorder hooked into redirects.
pub fn build_client(
    http: &HttpSettings,
    recorder: &RedirectRecorder,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(http.request_timeout)
        .connect_timeout(http.connect_timeout)
        .tcp_keepalive(http.tcp_keepalive)
        .pool_idle_timeout(http.pool_idle_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .danger_accept_invalid_certs(http.accept_invalid_certs)
        .redirect(recorder.policy(http.max_redirects))
        .build()
}

// Reads the body to the end so the connection can go back to the pool.
async fn drain(mut response: Response) {
    loop {
        match response.chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "failed to drain response body");
                break;
            }
        }
    }
}

// The error message followed by any cause it does not already mention.
fn error_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}
