// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use pipetail::init::agent::Agent;
use pipetail::init::args::AgentRun;
use pipetail::init::wait;

#[derive(Debug, Parser)]
#[command(name = "pipetail")]
#[command(bin_name = "pipetail")]
#[command(version, about, long_about = None)]
struct Arguments {
    #[command(flatten)]
    agent: AgentRun,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    let _guard = match setup_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run_agent(opt.agent) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Failed to run agent.");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn run_agent(agent_args: AgentRun) -> Result<(), BoxError> {
    let mut agent_join_set = JoinSet::new();

    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        agent_join_set.spawn(async move { Agent::new(agent_args).run(token).await });
    }

    loop {
        select! {
            _ = signal_wait() => {
                info!("Shutdown signal received.");
                cancel_token.cancel();
                break;
            },
            result = wait::wait_for_any_task(&mut agent_join_set) => {
                match result {
                    Ok(()) => warn!("Unexpected early exit of agent."),
                    Err(e) => return Err(e),
                }
                break;
            },
        }
    }

    // Generous timeout here, the agent enforces lower ones internally.
    wait::wait_for_tasks_with_timeout(&mut agent_join_set, Duration::from_secs(15)).await?;

    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

// Diagnostics go to stderr: stdout is the record sink.
fn setup_logging() -> Result<LoggerGuard, BoxError> {
    LogTracer::init().expect("Unable to setup log tracer!");

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    use std::io::IsTerminal;

    // Skip color codes when not in a terminal
    let use_ansi = std::io::stderr().is_terminal();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_writer)
        .with_target(false)
        .with_level(true)
        .with_ansi(use_ansi)
        .compact();

    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

async fn signal_wait() {
    let mut sig_term = sig(SignalKind::terminate());
    let mut sig_int = sig(SignalKind::interrupt());

    select! {
        _ = sig_term.recv() => {},
        _ = sig_int.recv() => {},
    }
}

fn sig(kind: SignalKind) -> tokio::signal::unix::Signal {
    signal(kind).unwrap()
}
