// src/pipeline/worker.rs
// =============================================================================
// A worker pulls batches from the shared queue until it is closed.
//
// For each line of a batch:
//   parse -> extract links -> check each link -> send the line's results
//
// Results for one line travel together as one Vec, so a record and all of
// its results always reach the writer in input order.
//
// Every worker owns its Prober (and with it an HTTP client and a redirect
// recorder). The only things shared between workers are the read-only
// config and the two channels.
// =============================================================================

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::batch::Batch;
use crate::checker::{parse_line, LinkResult, Prober};
use crate::config::CheckerConfig;
use crate::error::CheckerError;

/// Receiving end of the work queue, shared by all workers.
pub type WorkQueue = Arc<Mutex<mpsc::Receiver<Batch>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub batches: usize,
    /// Malformed lines skipped in best-effort mode
    pub skipped: usize,
    pub results: usize,
}

pub async fn run_worker(
    id: usize,
    prober: Prober,
    config: Arc<CheckerConfig>,
    queue: WorkQueue,
    results: mpsc::Sender<Vec<LinkResult>>,
) -> Result<WorkerStats, CheckerError> {
    let mut stats = WorkerStats::default();

    loop {
        // Hold the lock only for the receive, not while checking links.
        let batch = queue.lock().await.recv().await;
        let Some(batch) = batch else {
            break;
        };
        stats.batches += 1;
        if batch.is_empty() {
            continue;
        }
        debug!(worker = id, lines = batch.len(), "claimed batch");

        for line in &batch.lines {
            let record = match parse_line(line, &config.url_key) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) if config.best_effort => {
                    warn!(worker = id, error = %err, "skipping malformed input");
                    stats.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let links = record.link_targets(&config.url_key);
            if links.is_empty() {
                continue;
            }

            let payload = record.payload_value();
            let mut line_results = Vec::with_capacity(links.len());
            for link in &links {
                line_results.push(prober.check(link, &payload).await);
            }

            stats.results += line_results.len();
            results
                .send(line_results)
                .await
                .map_err(|_| CheckerError::ChannelClosed("result"))?;
        }
    }

    debug!(
        worker = id,
        batches = stats.batches,
        results = stats.results,
        "worker finished"
    );
    Ok(stats)
}
