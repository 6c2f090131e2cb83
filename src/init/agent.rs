// SPDX-License-Identifier: Apache-2.0

//! Agent wiring: compile the configuration, build the emitter channel,
//! start one source per input, and supervise the tasks.

use std::time::Duration;

use tokio::select;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{info, warn};

use crate::bounded_channel::bounded;
use crate::config::{Config, TransportKind};
use crate::emit::Emitter;
use crate::init::args::AgentRun;
use crate::init::wait;
use crate::pacing::{Pacing, KEEPALIVE_INTERVAL};
use crate::sources::pipe::PipeSource;
use crate::sources::socket::SocketSource;

const EMIT_QUEUE_SIZE: usize = 1_000;

const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Agent {
    args: AgentRun,
}

impl Agent {
    pub fn new(args: AgentRun) -> Self {
        Self { args }
    }

    pub async fn run(self, cancel_token: CancellationToken) -> Result<(), BoxError> {
        let config = Config::load(&self.args.config).map_err(|e| {
            format!(
                "failed to load configuration {}: {}",
                self.args.config.display(),
                e
            )
        })?;
        let inputs = config.compile()?;

        let pacing = Pacing::new();
        let (tx, rx) = bounded(EMIT_QUEUE_SIZE);
        let mut task_set: JoinSet<Result<(), BoxError>> = JoinSet::new();

        // Single writer task over the shared sink; keeps concurrent
        // pipelines from interleaving partial lines.
        task_set.spawn(Emitter::new(rx, tokio::io::stdout()).run());

        for input in inputs {
            match input.kind {
                TransportKind::Pipe => {
                    PipeSource::new(input, tx.clone(), pacing)?
                        .start(&mut task_set, &cancel_token)?;
                }
                TransportKind::Socket => {
                    SocketSource::new(input, tx.clone(), pacing)
                        .start(&mut task_set, &cancel_token)?;
                }
            }
        }

        // Sources hold the remaining sender clones; once they wind down
        // the emitter drains and exits on its own.
        drop(tx);

        info!("Agent started");

        loop {
            select! {
                _ = cancel_token.cancelled() => break,
                result = wait::wait_for_any_task(&mut task_set) => {
                    match result {
                        Ok(()) => warn!("Unexpected early exit of task"),
                        Err(e) => {
                            cancel_token.cancel();
                            let _ = wait::wait_for_tasks_with_timeout(
                                &mut task_set,
                                TASK_SHUTDOWN_TIMEOUT,
                            )
                            .await;
                            return Err(e);
                        }
                    }
                    break;
                }
                _ = sleep(pacing.scale(KEEPALIVE_INTERVAL)) => {}
            }
        }

        cancel_token.cancel();
        wait::wait_for_tasks_with_timeout(&mut task_set, TASK_SHUTDOWN_TIMEOUT).await?;

        Ok(())
    }
}
