use std::time::Duration;

use tokio::task::JoinSet;

use crate::core::Shutdown;
use crate::error::DevError;

/// How long stopped actors get to finish in-flight work.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Actors that can end the session.
pub(super) type ActorSet = JoinSet<Result<(), DevError>>;

/// Wait for shutdown or the first fatal actor error, then drain.
///
/// A fatal error triggers the shared signal so every other actor stops too.
pub(super) async fn run_actors(mut actors: ActorSet, shutdown: &Shutdown) -> Result<(), DevError> {
    let mut fatal = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            joined = actors.join_next() => match joined {
                Some(Ok(Ok(()))) => continue,
                Some(Ok(Err(e))) if e.is_fatal() => {
                    crate::log!("error"; "{}", e);
                    fatal = Some(e);
                    shutdown.trigger();
                    break;
                }
                Some(Ok(Err(e))) => {
                    crate::log!("actor"; "stopped: {}", e);
                }
                Some(Err(e)) => {
                    crate::log!("actor"; "task failed: {}", e);
                }
                None => break,
            },
        }
    }

    crate::debug!("actor"; "draining {} actors", actors.len());
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while actors.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        crate::debug!("actor"; "drain timed out, aborting the rest");
        actors.abort_all();
    }

    fatal.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fatal_error_triggers_shutdown() {
        let shutdown = Shutdown::new();
        let mut actors = ActorSet::new();
        {
            let shutdown = shutdown.clone();
            actors.spawn(async move {
                shutdown.cancelled().await;
                Ok(())
            });
        }
        actors.spawn(async { Err(DevError::FatalSession("theme deleted".into())) });

        let result = run_actors(actors, &shutdown).await;
        assert!(matches!(result, Err(DevError::FatalSession(_))));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_non_fatal_errors_keep_running() {
        let shutdown = Shutdown::new();
        let mut actors = ActorSet::new();
        actors.spawn(async { Err(DevError::Validation("bad file".into())) });
        {
            let shutdown = shutdown.clone();
            actors.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                shutdown.trigger();
                Ok(())
            });
        }

        assert!(run_actors(actors, &shutdown).await.is_ok());
    }
}
