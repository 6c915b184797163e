// src/checker/redirect.rs
// =============================================================================
// Records the redirect chain of the request currently in flight.
//
// reqwest lets us plug a closure into the client's redirect decision. The
// recorder owns that closure's state: every time the client is about to
// follow a 3xx, we learn the URLs requested so far, the next URL, and the
// status that sent us there. After the request finishes, entries() turns the
// chain into {url, status} hops and reset() clears it for the next link.
//
// One recorder per worker: a reqwest Client binds one redirect policy for its
// whole life, and every worker owns its own client.
// =============================================================================

use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::redirect::{Attempt, Policy};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// One hop of a redirect chain: the URL we were sent to and the status of
/// the response that sent us there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub status: u16,
    pub url: String,
}

// A request in the chain and the status of the response that led to it.
#[derive(Debug, Clone)]
struct ChainedRequest {
    url: String,
    caused_by: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct RedirectRecorder {
    chain: Arc<Mutex<Vec<ChainedRequest>>>,
}

impl RedirectRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the redirect policy to install on this worker's client.
    ///
    /// The recorder never vetoes a redirect; the only limit is the hop ceiling.
    pub fn policy(&self, max_redirects: usize) -> Policy {
        let recorder = self.clone();
        Policy::custom(move |attempt: Attempt| {
            recorder.record(attempt.previous(), attempt.url(), attempt.status());
            if attempt.previous().len() > max_redirects {
                attempt.error(format!("stopped after {max_redirects} redirects"))
            } else {
                attempt.follow()
            }
        })
    }

    /// Stores the chain seen so far: `previous` are the URLs already requested
    /// (the original first), `next` is about to be requested because the last
    /// response answered with `status`.
    pub fn record(&self, previous: &[Url], next: &Url, status: StatusCode) {
        let mut chain = self.lock();

        // A chain of one previous URL means a fresh request (or a retry of it)
        // is starting to redirect, so anything stored is stale.
        if previous.len() <= 1 || chain.len() != previous.len() {
            chain.clear();
            chain.extend(previous.iter().map(|url| ChainedRequest {
                url: url.to_string(),
                caused_by: None,
            }));
        }

        debug!(
            from = ?previous.last().map(Url::as_str),
            to = %next,
            status = status.as_u16(),
            "following redirect"
        );
        chain.push(ChainedRequest {
            url: next.to_string(),
            caused_by: Some(status.as_u16()),
        });
    }

    /// The recorded hops, skipping the original request.
    pub fn entries(&self) -> Vec<RedirectEntry> {
        self.lock()
            .iter()
            .skip(1)
            .map(|req| RedirectEntry {
                url: req.url.clone(),
                status: req.caused_by.unwrap_or_default(),
            })
            .collect()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    // A poisoned lock only means another thread panicked mid-record; the
    // chain is still a plain Vec and reset() will clean it up.
    fn lock(&self) -> MutexGuard<'_, Vec<ChainedRequest>> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Arc<Mutex<...>> for a per-worker recorder?
//    - The redirect closure lives inside the reqwest Client, which requires
//      it to be Send + Sync + 'static
//    - The worker and the closure both need the chain, so they share it
//      through an Arc; the Mutex makes that sharing safe
//
// 2. Why std::sync::Mutex and not tokio's?
//    - The redirect closure is a plain (non-async) function
//    - The lock is held for a few pushes, never across an .await
// -----------------------------------------------------------------------------
