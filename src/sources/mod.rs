// SPDX-License-Identifier: Apache-2.0

//! Source listeners and the shared per-connection read loop.

pub mod error;
pub mod pipe;
pub mod socket;

pub use error::{Result, SourceError};

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::select;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::bounded_channel::BoundedSender;
use crate::pacing::{Pacing, READ_IDLE_INTERVAL};
use crate::pipeline::{LogRecord, Pipeline};

/// What end-of-stream means for a transport.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum EofBehavior {
    /// The peer disconnected and the stream is finished.
    Close,
    /// A writer session ended. Flush, then keep reading the same
    /// descriptor for the next sequential writer.
    NextSession,
}

/// Consume one live byte stream: split it into lines, drive the
/// aggregator, and push finished records to the emitter channel. Reads
/// time out at a pacing-scaled idle interval so a sparse writer's
/// pending multi-line entry still gets its time-based flush.
pub(crate) async fn run_stream<R>(
    reader: R,
    pipeline: Arc<Pipeline>,
    output: BoundedSender<LogRecord>,
    pacing: Pacing,
    eof: EofBehavior,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut aggregator =
        crate::pipeline::aggregate::LineAggregator::new(pipeline.input().multiline.clone());

    loop {
        let idle = pacing.scale(READ_IDLE_INTERVAL);
        select! {
            _ = cancel.cancelled() => {
                debug!("Connection handler cancelled");
                break;
            }
            result = timeout(idle, lines.next_line()) => match result {
                // Idle: nothing read within the window, check the flush timer.
                Err(_) => {
                    if let Some(entry) = aggregator.idle_flush(Instant::now()) {
                        if !emit_entry(&pipeline, &output, entry).await {
                            return;
                        }
                    }
                }
                Ok(Ok(Some(line))) => {
                    let now = Instant::now();
                    if let Some(entry) = aggregator.idle_flush(now) {
                        if !emit_entry(&pipeline, &output, entry).await {
                            return;
                        }
                    }
                    if let Some(entry) = aggregator.push(&line, now) {
                        if !emit_entry(&pipeline, &output, entry).await {
                            return;
                        }
                    }
                }
                Ok(Ok(None)) => match eof {
                    EofBehavior::Close => {
                        debug!("Stream closed by writer");
                        break;
                    }
                    EofBehavior::NextSession => {
                        if let Some(entry) = aggregator.finish() {
                            if !emit_entry(&pipeline, &output, entry).await {
                                return;
                            }
                        }
                        // No writer attached right now, back off before
                        // polling again.
                        select! {
                            _ = sleep(idle) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                },
                Ok(Err(e)) => {
                    error!("Error reading from stream: {}", e);
                    break;
                }
            }
        }
    }

    // Flush whatever is still buffered so a closing writer does not lose
    // its trailing partial entry.
    if let Some(entry) = aggregator.finish() {
        emit_entry(&pipeline, &output, entry).await;
    }
}

/// Returns false when the output channel is gone and the connection
/// should stop.
async fn emit_entry(
    pipeline: &Pipeline,
    output: &BoundedSender<LogRecord>,
    entry: String,
) -> bool {
    let Some(record) = pipeline.process(&entry) else {
        return true;
    };
    if output.send(record).await.is_err() {
        warn!("Output channel closed, dropping connection");
        return false;
    }
    true
}
