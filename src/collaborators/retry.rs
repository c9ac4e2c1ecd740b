// Bounded retry with per-call timeout and exponential backoff

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use super::{CollaboratorError, Stage};
use crate::errors::RunError;

/// How a single collaborator call is bounded
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Delay before the second attempt; doubles for each later attempt
    pub base_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::constants::DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(crate::config::constants::DEFAULT_CALL_TIMEOUT_SECS),
            base_delay: Duration::from_millis(crate::config::constants::DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

/// Successful call result with bookkeeping for the audit log
#[derive(Debug)]
pub struct Invocation<T> {
    pub value: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Call `f` until it succeeds or `policy.max_attempts` is used up.
///
/// Each attempt is raced against the timeout and the cancellation token, and
/// is retried with the same inputs on any collaborator error. Cancellation is
/// checked before every attempt and during backoff.
pub async fn with_retry<F, Fut, T>(
    stage: Stage,
    policy: &CallPolicy,
    cancel: &CancellationToken,
    f: F,
) -> Result<Invocation<T>, RunError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let started = Instant::now();
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            result = timeout(policy.timeout, f()) => result,
        };

        let error = match outcome {
            Ok(Ok(value)) => {
                return Ok(Invocation {
                    value,
                    attempts: attempt + 1,
                    elapsed: started.elapsed(),
                })
            }
            Ok(Err(e)) => e,
            Err(_) => CollaboratorError::timeout(
                stage,
                format!("no response within {:?}", policy.timeout),
            ),
        };

        if attempt + 1 < policy.max_attempts {
            let delay = policy.base_delay.saturating_mul(2u32.saturating_pow(attempt));
            tracing::warn!(
                "{} call failed (attempt {}/{}): {}; retrying in {:?}",
                stage,
                attempt + 1,
                policy.max_attempts,
                error,
                delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                _ = sleep(delay) => {}
            }
        } else {
            tracing::warn!(
                "{} call failed (attempt {}/{}): {}; giving up",
                stage,
                attempt + 1,
                policy.max_attempts,
                error
            );
        }
        last_error = Some(error);
    }

    Err(match last_error {
        Some(e) => RunError::Collaborator(e),
        None => RunError::Config(crate::errors::ConfigError::ZeroAttempts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> CallPolicy {
        CallPolicy {
            max_attempts,
            timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_one_failure() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = with_retry(Stage::Assess, &policy(2), &cancel, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CollaboratorError::transport(Stage::Assess, "connection reset"))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(result.value, 7);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<Invocation<()>, _> =
            with_retry(Stage::Extract, &policy(2), &cancel, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::invalid_response(Stage::Extract, "not json"))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(RunError::Collaborator(e)) => {
                assert_eq!(e.kind, CollaboratorErrorKind::InvalidResponse)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_collaborator_timeout() {
        let cancel = CancellationToken::new();
        let result: Result<Invocation<()>, _> =
            with_retry(Stage::ProposePatch, &policy(1), &cancel, || async move {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        match result {
            Err(RunError::Collaborator(e)) => {
                assert_eq!(e.kind, CollaboratorErrorKind::Timeout);
                assert_eq!(e.stage, Stage::ProposePatch);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let calls = &AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = with_retry(Stage::Assess, &policy(3), &cancel, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RunError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_in_flight_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let result = with_retry(Stage::Assess, &policy(1), &cancel, || async move {
            sleep(Duration::from_secs(3)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RunError::Cancelled)));
    }
}
