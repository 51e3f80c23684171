use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Outcome of a supervised attempt that did not succeed
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError<E> {
    #[error("Timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Action(E),
}

/// Race `action` against a timer.
///
/// Whichever settles first decides the result. When the timer wins the action
/// future is dropped, so it is cancelled at its next suspension point and can
/// never report a late result.
pub async fn attempt_with_timeout<F, T, E>(
    action: F,
    timeout: Duration,
) -> Result<T, SupervisorError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, action).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SupervisorError::Action(e)),
        Err(_) => {
            debug!("Attempt abandoned after {:?}", timeout);
            Err(SupervisorError::Timeout(timeout))
        }
    }
}
