// src/pipeline/batch.rs
// =============================================================================
// Groups input lines into fixed-size batches and feeds them to the workers.
//
// How it works:
// 1. Read the input line by line, as raw bytes (a line that is not UTF-8 is
//    the parser's problem, not a reason to stop reading)
// 2. Collect lines until the batch is full
// 3. Hand the full batch to the work queue and start a fresh buffer
// 4. At the end of input, send whatever is left (possibly nothing)
//
// The queue is bounded, so when every worker is busy the send blocks and we
// stop reading input. That is our backpressure.
// =============================================================================

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::CheckerError;

/// Raw input lines, without their line endings, claimed by exactly one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub lines: Vec<Vec<u8>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug)]
pub struct Batcher {
    size: usize,
    buffer: Vec<Vec<u8>>,
}

impl Batcher {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            buffer: Vec::with_capacity(size),
        }
    }

    /// Adds a line; returns the batch once it is full.
    pub fn push(&mut self, line: Vec<u8>) -> Option<Batch> {
        self.buffer.push(line);
        if self.buffer.len() >= self.size {
            Some(self.take())
        } else {
            None
        }
    }

    /// The final, possibly short or empty, batch.
    pub fn finish(mut self) -> Batch {
        self.take()
    }

    /// Lines collected since the last handoff.
    pub fn pending(&self) -> &[Vec<u8>] {
        &self.buffer
    }

    // The handed-off batch owns its lines; the batcher keeps a new buffer.
    fn take(&mut self) -> Batch {
        let lines = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.size));
        Batch { lines }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub lines: usize,
    pub batches: usize,
}

/// Reads `input` to the end, sending batches of `batch_size` lines to `queue`.
///
/// Dropping the sender when this returns is what closes the queue.
pub async fn feed<R>(
    mut input: R,
    batch_size: usize,
    queue: mpsc::Sender<Batch>,
) -> Result<FeedStats, CheckerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut batcher = Batcher::new(batch_size);

    while let Some(line) = next_line(&mut input).await? {
        stats.lines += 1;
        if let Some(batch) = batcher.push(line) {
            send(&queue, batch, &mut stats).await?;
        }
    }
    debug!(lines = batcher.pending().len(), "flushing final batch");
    send(&queue, batcher.finish(), &mut stats).await?;

    debug!(lines = stats.lines, batches = stats.batches, "input exhausted");
    Ok(stats)
}

// One line without its "\n" or "\r\n", or None at the end of input.
async fn next_line<R>(input: &mut R) -> Result<Option<Vec<u8>>, CheckerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    if input.read_until(b'\n', &mut line).await? == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

async fn send(
    queue: &mpsc::Sender<Batch>,
    batch: Batch,
    stats: &mut FeedStats,
) -> Result<(), CheckerError> {
    queue
        .send(batch)
        .await
        .map_err(|_| CheckerError::ChannelClosed("work queue"))?;
    stats.batches += 1;
    Ok(())
}
