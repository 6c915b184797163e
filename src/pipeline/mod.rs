// src/pipeline/mod.rs
// =============================================================================
// Wires the whole run together:
//
//   input -> feed (batcher) -> work queue -> N workers -> result channel
//         -> writer -> output
//
// Both channels are bounded. Shutdown happens in one fixed order:
// 1. the batcher reaches the end of input and drops the queue sender
// 2. each worker sees the closed queue and exits, dropping its result sender
// 3. once the last worker is gone the result channel closes, the writer
//    drains what is left and hands the sink back
//
// An input error is not fatal to output: the queue still closes, the workers
// finish what they claimed, and the writer flushes before the error is
// returned.
//
// Only the workers hold result senders, so the channel cannot close while a
// worker might still send. A fatal worker error (malformed JSON in strict
// mode) aborts everything and is returned.
// =============================================================================

mod batch;
mod worker;
mod writer;

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::info;

use crate::checker::{LinkResult, Prober};
use crate::config::CheckerConfig;
use crate::error::CheckerError;
use batch::{feed, Batch};
use worker::{run_worker, WorkQueue};
use writer::write_results;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: usize,
    pub batches: usize,
    pub skipped: usize,
    pub results: usize,
}

/// Checks every link found in `input` and writes the results to `output`.
///
/// Returns the summary and the output sink once everything is written.
pub async fn run<R, W>(
    config: Arc<CheckerConfig>,
    input: R,
    output: W,
) -> Result<(RunSummary, W), CheckerError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let workers = config.workers.max(1);

    // Build every client first so a bad TLS setup fails before any task runs.
    let retry_limiter = config.retry.limiter();
    let probers = (0..workers)
        .map(|_| Prober::new(config.clone(), retry_limiter.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let (queue_tx, queue_rx) = mpsc::channel::<Batch>(workers);
    let queue: WorkQueue = Arc::new(Mutex::new(queue_rx));
    let (result_tx, result_rx) = mpsc::channel::<Vec<LinkResult>>(workers);

    let writer = tokio::spawn(write_results(result_rx, output));

    let mut pool = JoinSet::new();
    for (id, prober) in probers.into_iter().enumerate() {
        pool.spawn(run_worker(
            id,
            prober,
            config.clone(),
            queue.clone(),
            result_tx.clone(),
        ));
    }
    drop(result_tx);
    drop(queue);

    let producer = tokio::spawn(feed(input, config.batch_size, queue_tx));

    let mut summary = RunSummary::default();
    while let Some(joined) = pool.join_next().await {
        match joined {
            Ok(Ok(stats)) => {
                summary.skipped += stats.skipped;
            }
            Ok(Err(err)) => {
                producer.abort();
                pool.abort_all();
                // A closed result channel means the writer died first; its
                // error is the one worth reporting.
                if matches!(err, CheckerError::ChannelClosed(_)) {
                    if let Ok(Err(write_err)) = writer.await {
                        return Err(write_err);
                    }
                } else {
                    // Let the writer flush what the workers already sent.
                    pool.shutdown().await;
                    let _ = writer.await;
                }
                return Err(err);
            }
            Err(join_err) => {
                producer.abort();
                pool.abort_all();
                writer.abort();
                return Err(join_err.into());
            }
        }
    }

    // The writer is joined even when reading input failed, so results the
    // workers already produced are flushed before the error is returned.
    let fed = producer.await;
    let written = writer.await;
    let fed = fed??;
    let (sink, written) = written??;

    summary.lines = fed.lines;
    summary.batches = fed.batches;
    summary.results = written;
    info!(
        lines = summary.lines,
        batches = summary.batches,
        skipped = summary.skipped,
        results = summary.results,
        "run complete"
    );
    Ok((summary, sink))
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is the work queue receiver behind a Mutex?
//    - tokio's mpsc channel has many senders but only one receiver
//    - Workers take turns holding the receiver just long enough to pull one
//      batch, which turns it into a shared queue
//
// 2. What does drop(result_tx) do here?
//    - The channel stays open while ANY sender exists
//    - If we kept our copy, the writer would wait forever after the last
//      worker finished
//
// 3. What is a JoinSet?
//    - A collection of spawned tasks that can be awaited in completion order
//    - join_next() hands back each worker's result as soon as it finishes,
//      so a fatal error is seen without waiting for the others
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_config, spawn_server};
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};

    // Serves `head` once, then fails every read.
    struct FailingInput {
        head: Option<Vec<u8>>,
    }

    impl AsyncRead for FailingInput {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.head.take() {
                Some(head) => {
                    buf.put_slice(&head);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "input device gone",
                ))),
            }
        }
    }

    async fn run_lines(
        config: CheckerConfig,
        input: String,
    ) -> Result<(RunSummary, Vec<Value>), CheckerError> {
        let input = Cursor::new(input.into_bytes());
        let (summary, sink) = run(Arc::new(config), input, Vec::new()).await?;
        let records = String::from_utf8(sink)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        Ok((summary, records))
    }

    #[tokio::test]
    async fn test_scalar_url_gives_one_result_with_payload() {
        let server = spawn_server().await;
        let line = json!({"url": server.url("/ok"), "id": 7});

        let (summary, records) = run_lines(fast_config(), format!("{line}\n")).await.unwrap();
        assert_eq!(summary.results, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], 200);
        assert_eq!(records[0]["comment"], "GET");
        assert_eq!(records[0]["payload"], line);
        assert!(records[0].get("redirects").is_none());
    }

    #[tokio::test]
    async fn test_bare_url_without_scheme_gets_http() {
        let server = spawn_server().await;
        let bare = server.url("/ok").trim_start_matches("http://").to_string();

        let (_, records) = run_lines(fast_config(), format!("{bare}\n")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["link"], server.url("/ok"));
        assert_eq!(records[0]["status"], 200);
    }

    #[tokio::test]
    async fn test_url_array_gives_one_result_per_element() {
        let server = spawn_server().await;
        let line = json!({"url": [server.url("/ok"), server.url("/echo")]});

        let (_, records) = run_lines(fast_config(), format!("{line}\n")).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["link"], server.url("/ok"));
        assert_eq!(records[1]["link"], server.url("/echo"));
        assert_eq!(records[0]["payload"], line);
        assert_eq!(records[1]["payload"], line);
    }

    #[tokio::test]
    async fn test_missing_url_key_gives_no_results() {
        let input = "{\"href\": \"http://a.test\"}\n{\"id\": 1}\n".to_string();
        let (summary, records) = run_lines(fast_config(), input).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(summary.lines, 2);
    }

    #[tokio::test]
    async fn test_free_text_is_skipped_in_best_effort_mode() {
        let server = spawn_server().await;
        let config = CheckerConfig {
            best_effort: true,
            ..fast_config()
        };
        let input = format!("not json at all\n{}\n", json!({"url": server.url("/ok")}));

        let (summary, records) = run_lines(config, input).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["link"], server.url("/ok"));
    }

    #[tokio::test]
    async fn test_free_text_is_fatal_in_strict_mode() {
        let err = run_lines(fast_config(), "not json at all\n".to_string())
            .await
            .unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[tokio::test]
    async fn test_redirect_then_ok_is_recorded() {
        let server = spawn_server().await;
        let line = json!({"url": server.url("/moved")});

        let (_, records) = run_lines(fast_config(), format!("{line}\n")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], 200);
        assert_eq!(
            records[0]["redirects"],
            json!([{"url": server.url("/ok"), "status": 301}])
        );
    }

    #[tokio::test]
    async fn test_unreachable_and_malformed_links_are_results_not_errors() {
        let input = format!(
            "{}\n{}\n",
            json!({"url": "http://127.0.0.1:9/"}),
            json!({"url": "http://"})
        );
        let (_, records) = run_lines(fast_config(), input).await.unwrap();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(record.get("status").is_none());
            assert!(!record["comment"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_many_lines_across_workers_lose_nothing() {
        let server = spawn_server().await;
        let input: String = (0..25)
            .map(|i| format!("{}\n", json!({"url": server.url("/ok"), "n": i})))
            .collect();
        let config = CheckerConfig {
            workers: 3,
            batch_size: 4,
            ..fast_config()
        };

        let (summary, records) = run_lines(config, input).await.unwrap();
        assert_eq!(summary.lines, 25);
        assert_eq!(summary.batches, 7);
        assert_eq!(records.len(), 25);

        let mut seen: Vec<i64> = records
            .iter()
            .map(|r| r["payload"]["n"].as_i64().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_input_finishes_cleanly() {
        let (summary, records) = run_lines(fast_config(), String::new()).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(summary.batches, 1);
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_skipped_in_best_effort_mode() {
        let server = spawn_server().await;
        let ok = json!({"url": server.url("/ok")}).to_string();
        let mut input = Vec::new();
        input.extend_from_slice(ok.as_bytes());
        input.extend_from_slice(b"\n\xff\xfe bad line\n");
        input.extend_from_slice(ok.as_bytes());
        input.push(b'\n');
        let config = CheckerConfig {
            best_effort: true,
            ..fast_config()
        };

        let (summary, sink) = run(Arc::new(config), Cursor::new(input), Vec::new())
            .await
            .unwrap();
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.results, 2);
        assert_eq!(String::from_utf8(sink).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_fatal_in_strict_mode() {
        let input = Cursor::new(b"\xff\xfe bad line\n".to_vec());
        let err = run(Arc::new(fast_config()), input, Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[tokio::test]
    async fn test_input_error_still_flushes_earlier_results() {
        let server = spawn_server().await;
        let line = format!("{}\n", json!({"url": server.url("/ok")}));
        let input = BufReader::new(FailingInput {
            head: Some(line.into_bytes()),
        });
        let config = CheckerConfig {
            batch_size: 1,
            ..fast_config()
        };
        let (output, mut written) = tokio::io::duplex(64 * 1024);

        let err = run(Arc::new(config), input, output).await.unwrap_err();
        assert!(matches!(err, CheckerError::Io(_)));

        // The output end is closed once run returns, so this cannot hang.
        let mut text = String::new();
        written.read_to_string(&mut text).await.unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(&server.url("/ok")));
    }
}
