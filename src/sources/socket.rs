// SPDX-License-Identifier: Apache-2.0

//! Unix domain socket source: bind once, accept forever, one concurrent
//! pipeline instance per accepted connection.

use std::fs;
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, error, info, warn};

use crate::bounded_channel::BoundedSender;
use crate::config::Input;
use crate::pacing::Pacing;
use crate::pipeline::{LogRecord, Pipeline};
use crate::sources::error::SourceError;
use crate::sources::{run_stream, EofBehavior};

pub struct SocketSource {
    input: Arc<Input>,
    pipeline: Arc<Pipeline>,
    output: BoundedSender<LogRecord>,
    pacing: Pacing,
}

impl SocketSource {
    pub fn new(input: Arc<Input>, output: BoundedSender<LogRecord>, pacing: Pacing) -> Self {
        let pipeline = Arc::new(Pipeline::new(input.clone()));
        Self {
            input,
            pipeline,
            output,
            pacing,
        }
    }

    /// Bind the socket and spawn the accept loop. A stale socket file
    /// from a previous run is removed first; a bind failure is fatal. An
    /// accept failure is logged and the loop continues.
    pub fn start(
        self,
        task_set: &mut JoinSet<std::result::Result<(), BoxError>>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), BoxError> {
        if self.input.path.exists() {
            fs::remove_file(&self.input.path).map_err(|e| {
                SourceError::SocketBind(format!(
                    "failed to remove existing socket file {}: {}",
                    self.input.path.display(),
                    e
                ))
            })?;
        }

        let listener = UnixListener::bind(&self.input.path).map_err(|e| {
            SourceError::SocketBind(format!("{}: {}", self.input.path.display(), e))
        })?;

        info!(path = %self.input.path.display(), "Socket source bound");

        let cancel = cancel.clone();

        task_set.spawn(async move {
            loop {
                select! {
                    result = listener.accept() => match result {
                        Ok((stream, _addr)) => {
                            debug!(path = %self.input.path.display(), "Accepted socket connection");

                            let pipeline = self.pipeline.clone();
                            let output = self.output.clone();
                            let pacing = self.pacing;
                            let conn_cancel = cancel.clone();
                            tokio::spawn(async move {
                                run_stream(
                                    stream,
                                    pipeline,
                                    output,
                                    pacing,
                                    EofBehavior::Close,
                                    conn_cancel,
                                )
                                .await;
                            });
                        }
                        Err(e) => {
                            error!(path = %self.input.path.display(), "Error accepting socket connection: {}", e);
                        }
                    },
                    _ = cancel.cancelled() => {
                        info!(path = %self.input.path.display(), "Socket source shutting down");
                        break;
                    }
                }
            }

            if self.input.path.exists() {
                if let Err(e) = fs::remove_file(&self.input.path) {
                    warn!(path = %self.input.path.display(), "Failed to remove socket file: {}", e);
                }
            }

            Ok(())
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;
    use crate::config::{InputConfig, MultilineConfig, TransportKind};
    use tempfile::TempDir;

    fn socket_input(path: std::path::PathBuf) -> Arc<Input> {
        let config = InputConfig {
            path,
            kind: TransportKind::Socket,
            tags: vec![],
            multiline: MultilineConfig::default(),
            parsers: vec![],
        };
        Arc::new(config.compile().unwrap())
    }

    #[tokio::test]
    async fn test_bind_and_cleanup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sock");
        let (tx, _rx) = bounded::<LogRecord>(4);

        let mut tasks = JoinSet::new();
        let cancel = CancellationToken::new();

        let source = SocketSource::new(socket_input(path.clone()), tx, Pacing::new());
        source.start(&mut tasks, &cancel).unwrap();

        assert!(path.exists());
        cancel.cancel();

        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"").unwrap();
        let (tx, _rx) = bounded::<LogRecord>(4);

        let mut tasks = JoinSet::new();
        let cancel = CancellationToken::new();

        let source = SocketSource::new(socket_input(path.clone()), tx, Pacing::new());
        source.start(&mut tasks, &cancel).unwrap();

        assert!(path.exists());
        cancel.cancel();
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("test.sock");
        let (tx, _rx) = bounded::<LogRecord>(4);

        let mut tasks = JoinSet::new();
        let cancel = CancellationToken::new();

        let source = SocketSource::new(socket_input(path), tx, Pacing::new());
        assert!(source.start(&mut tasks, &cancel).is_err());
    }
}
