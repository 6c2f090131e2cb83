// SPDX-License-Identifier: Apache-2.0

//! Named pipe (FIFO) source.
//!
//! The FIFO is opened once, read-only and non-blocking, and wrapped in
//! an `AsyncFd` so reads are readiness-driven rather than parked on a
//! blocking thread. A writer leaving shows up as a zero-length read;
//! the read loop treats that as a session boundary and keeps polling
//! the same descriptor for the next sequential writer.

use std::fs::File;
use std::io::Read;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, Interest, ReadBuf};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{error, info};

use crate::bounded_channel::BoundedSender;
use crate::config::Input;
use crate::pacing::Pacing;
use crate::pipeline::{LogRecord, Pipeline};
use crate::sources::error::{Result, SourceError};
use crate::sources::{run_stream, EofBehavior};

pub struct PipeSource {
    input: Arc<Input>,
    pipeline: Arc<Pipeline>,
    output: BoundedSender<LogRecord>,
    pacing: Pacing,
}

impl PipeSource {
    /// Ensure the FIFO exists, creating it if absent. An existing path
    /// (live or stale) is left alone; creation failure is fatal since
    /// the source cannot function at all.
    pub fn new(
        input: Arc<Input>,
        output: BoundedSender<LogRecord>,
        pacing: Pacing,
    ) -> Result<Self> {
        if !input.path.exists() {
            mkfifo(&input.path, Mode::from_bits_truncate(0o666)).map_err(|e| {
                SourceError::PipeCreate(format!("{}: {}", input.path.display(), e))
            })?;
            info!(path = %input.path.display(), "Pipe created");
        }

        let pipeline = Arc::new(Pipeline::new(input.clone()));

        Ok(Self {
            input,
            pipeline,
            output,
            pacing,
        })
    }

    pub fn start(
        self,
        task_set: &mut JoinSet<std::result::Result<(), BoxError>>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), BoxError> {
        // Failing to open the pipe at all leaves the source useless, so
        // surface it as a startup error.
        let reader = PipeReader::open(&self.input.path).map_err(|e| {
            error!(path = %self.input.path.display(), "Failed to open pipe: {}", e);
            SourceError::Io(e)
        })?;

        let cancel = cancel.clone();

        task_set.spawn(async move {
            run_stream(
                reader,
                self.pipeline,
                self.output,
                self.pacing,
                EofBehavior::NextSession,
                cancel,
            )
            .await;

            info!(path = %self.input.path.display(), "Pipe source shutting down");
            Ok(())
        });

        Ok(())
    }
}

/// Readiness-driven reader over a non-blocking FIFO descriptor.
struct PipeReader {
    fd: AsyncFd<File>,
}

impl PipeReader {
    /// Must be called from within a tokio runtime context.
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        let fd = AsyncFd::with_interest(file, Interest::READABLE)?;
        Ok(Self { fd })
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}
