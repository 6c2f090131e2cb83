// SPDX-License-Identifier: Apache-2.0

//! Record emission.
//!
//! A single task drains the bounded channel and writes one JSON line per
//! record to the sink. Funneling every pipeline instance through this
//! one writer is what keeps concurrent producers from interleaving
//! partial lines.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tower::BoxError;
use tracing::error;

use crate::bounded_channel::BoundedReceiver;
use crate::pipeline::LogRecord;

pub struct Emitter<W> {
    rx: BoundedReceiver<LogRecord>,
    writer: W,
}

impl<W> Emitter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(rx: BoundedReceiver<LogRecord>, writer: W) -> Self {
        Self { rx, writer }
    }

    /// Drain records until every sender has dropped. A record that fails
    /// to serialize or write is logged and dropped; it is never fatal
    /// and never retried.
    pub async fn run(mut self) -> Result<(), BoxError> {
        while let Some(record) = self.rx.next().await {
            let mut line = match serde_json::to_string(&record) {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to serialize record, dropping: {}", e);
                    continue;
                }
            };
            line.push('\n');

            if let Err(e) = self.writer.write_all(line.as_bytes()).await {
                error!("Failed to write record, dropping: {}", e);
                continue;
            }
            if let Err(e) = self.writer.flush().await {
                error!("Failed to flush output sink: {}", e);
            }
        }

        Ok(())
    }
}
