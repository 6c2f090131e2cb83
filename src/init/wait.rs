// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tower::BoxError;
use tracing::error;

/// Wait for the next task in the set to finish, propagating its result.
pub async fn wait_for_any_task(tasks: &mut JoinSet<Result<(), BoxError>>) -> Result<(), BoxError> {
    match tasks.join_next().await {
        None => Ok(()), // empty set
        Some(result) => result?,
    }
}

/// Drain the whole set, bounding the wait. The first task error (or the
/// timeout) becomes the overall result; join failures are logged.
pub async fn wait_for_tasks_with_timeout(
    tasks: &mut JoinSet<Result<(), BoxError>>,
    wait: Duration,
) -> Result<(), BoxError> {
    let stop_at = Instant::now() + wait;
    let mut result = Ok(());

    loop {
        match timeout_at(stop_at, tasks.join_next()).await {
            Err(_) => {
                result = Err("timed out waiting for tasks to complete".into());
                break;
            }
            Ok(None) => break,
            Ok(Some(joined)) => match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
                Err(e) => error!("Failed to join with task: {:?}", e),
            },
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_any_task_propagates_error() {
        let mut tasks: JoinSet<Result<(), BoxError>> = JoinSet::new();
        tasks.spawn(async { Err("boom".into()) });

        assert!(wait_for_any_task(&mut tasks).await.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_tasks_with_timeout_drains() {
        let mut tasks: JoinSet<Result<(), BoxError>> = JoinSet::new();
        tasks.spawn(async { Ok(()) });
        tasks.spawn(async { Ok(()) });

        let result = wait_for_tasks_with_timeout(&mut tasks, Duration::from_secs(1)).await;
        assert!(result.is_ok());
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_tasks_times_out() {
        let mut tasks: JoinSet<Result<(), BoxError>> = JoinSet::new();
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let result = wait_for_tasks_with_timeout(&mut tasks, Duration::from_millis(20)).await;
        assert!(result.is_err());
        tasks.abort_all();
    }
}
