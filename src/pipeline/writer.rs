// src/pipeline/writer.rs
// =============================================================================
// Drains the result channel and writes one JSON object per line.
//
// Each result is serialized on its own, so a consumer can process the output
// line by line while the run is still going. The writer finishes once every
// worker has dropped its sender and the channel is empty.
// =============================================================================

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::checker::LinkResult;
use crate::error::CheckerError;

/// Writes every result it receives to `sink` and returns the sink with the
/// number of records written.
pub async fn write_results<W>(
    mut results: mpsc::Receiver<Vec<LinkResult>>,
    mut sink: W,
) -> Result<(W, usize), CheckerError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;

    while let Some(batch) = results.recv().await {
        for result in batch {
            let mut line = match serde_json::to_vec(&result) {
                Ok(line) => line,
                Err(err) => {
                    warn!(link = %result.link, error = %err, "failed to serialize result");
                    continue;
                }
            };
            line.push(b'\n');
            sink.write_all(&line).await?;
            written += 1;
        }
    }

    sink.flush().await?;
    debug!(written, "result channel drained");
    Ok((sink, written))
}
