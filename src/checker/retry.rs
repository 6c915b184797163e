// src/checker/retry.rs
// =============================================================================
// Retries with exponential backoff, as a small explicit state machine:
//
//     attempt -> classify -> Success   -> done
//                         -> Terminal  -> done
//                         -> Retryable -> sleep(backoff(n)) -> attempt again
//
// bounded by `max_attempts`. The caller only ever sees the final outcome.
//
// Retries (never first attempts) also need a permit from a semaphore shared
// by every worker of a run, so a burst of failing hosts cannot turn into a
// burst of retry traffic.
//
// What counts as retryable for HTTP:
// - transport failures (connect errors, timeouts, broken bodies)
// - 5xx responses
// - 429 Too Many Requests
// =============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Retryable,
    Terminal,
}

/// Classifies a response status.
pub fn classify_status(status: StatusCode) -> Outcome {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Outcome::Retryable
    } else {
        Outcome::Success
    }
}

/// Classifies a transport error.
///
/// Errors in building the request or following redirects will not improve
/// on a second try; everything else on the wire might.
pub fn classify_error(err: &reqwest::Error) -> Outcome {
    if err.is_builder() || err.is_redirect() || err.is_status() {
        Outcome::Terminal
    } else {
        Outcome::Retryable
    }
}

/// Classifies the result of one HTTP attempt.
pub fn classify_response(result: &Result<reqwest::Response, reqwest::Error>) -> Outcome {
    match result {
        Ok(response) => classify_status(response.status()),
        Err(err) => classify_error(err),
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included
    pub max_attempts: u32,
    /// Backoff unit; the n-th failure waits base * 2^n
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retry attempts allowed in flight at once across all workers
    pub concurrency: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            concurrency: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th failed attempt: base * 2^failures, capped.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// The retry limiter a run shares between its workers.
    pub fn limiter(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.concurrency.max(1)))
    }

    /// Runs `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. The last result is returned
    /// as-is, so an exhausted retryable response still reaches the caller.
    /// Every retry holds a `limiter` permit while it runs.
    pub async fn run<T, E, F, Fut, C>(
        &self,
        limiter: &Semaphore,
        mut op: F,
        classify: C,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&Result<T, E>) -> Outcome,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        let mut result = op(attempt).await;

        while classify(&result) == Outcome::Retryable && attempt < max_attempts {
            let delay = self.backoff(attempt);
            debug!(attempt, max_attempts, ?delay, "retrying after backoff");
            tokio::time::sleep(delay).await;

            let Ok(_permit) = limiter.acquire().await else {
                warn!(attempt, "retry limiter closed, keeping the last result");
                break;
            };
            // Release the failed response before sending the next attempt.
            drop(result);
            attempt += 1;
            result = op(attempt).await;
        }
        result
    }
}
