//! Bounded polling.

use std::future::Future;
use std::time::Duration;

use nestbox_shared::errors::{NestboxError, NestboxResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct PollSpec {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSpec {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Call `probe` every `interval` until it returns `true`.
///
/// Fails with `Timeout` once `timeout` has elapsed, with `Cancelled` when
/// `cancel` fires, and with the probe's own error if it fails. A probe in
/// flight is dropped on timeout or cancellation.
pub async fn poll_until<F, Fut>(
    spec: PollSpec,
    cancel: &CancellationToken,
    operation: &str,
    mut probe: F,
) -> NestboxResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = NestboxResult<bool>>,
{
    let deadline = Instant::now() + spec.timeout;
    let timed_out = || NestboxError::Timeout {
        operation: operation.to_string(),
        waited_secs: spec.timeout.as_secs(),
    };
    let cancelled = || NestboxError::Cancelled(operation.to_string());

    loop {
        let done = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            result = probe() => result?,
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out()),
        };
        if done {
            return Ok(());
        }

        tracing::trace!(operation, "Still waiting");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out()),
            _ = tokio::time::sleep(spec.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(timeout_secs: u64) -> PollSpec {
        PollSpec::new(Duration::from_secs(1), Duration::from_secs(timeout_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_when_probe_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        poll_until(spec(60), &CancellationToken::new(), "ready", move || {
            let counter = counter.clone();
            async move { Ok::<_, NestboxError>(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let err = poll_until(spec(5), &CancellationToken::new(), "stop", || async {
            Ok::<_, NestboxError>(false)
        })
        .await
        .unwrap_err();
        match err {
            NestboxError::Timeout {
                operation,
                waited_secs,
            } => {
                assert_eq!(operation, "stop");
                assert_eq!(waited_secs, 5);
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = poll_until(spec(60), &token, "ready", || async { Ok::<_, NestboxError>(false) })
            .await
            .unwrap_err();
        assert!(matches!(err, NestboxError::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates() {
        let err = poll_until(spec(60), &CancellationToken::new(), "ready", || async {
            Err::<bool, _>(NestboxError::Internal("probe broke".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, NestboxError::Internal(_)));
    }
}
