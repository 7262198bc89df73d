//! Bounded retry combinator.
//!
//! # Responsibilities
//! - Re-run an async operation until a success predicate holds
//! - Enforce a finite attempt budget
//! - Sleep between attempts according to a [`BackoffPolicy`]
//! - Abort immediately on errors that can never succeed on repetition

use std::fmt::Display;
use std::future::Future;

use crate::resilience::backoff::BackoffPolicy;

/// Classifies errors as worth retrying or not.
pub trait Transient {
    /// Return true if repeating the same call may succeed.
    fn is_transient(&self) -> bool;
}

/// Attempt budget and delay schedule for [`retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_retries: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// Why a retried operation did not produce an accepted value.
#[derive(Debug)]
pub enum RetryError<T, E> {
    /// Every attempt either failed transiently or returned a value the predicate rejected.
    Exhausted {
        attempts: u32,
        last_value: Option<T>,
        last_error: Option<E>,
    },
    /// A non-transient error stopped the loop early.
    Aborted { attempt: u32, error: E },
}

impl<T, E> RetryError<T, E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The error that ended the loop, if the last attempt errored.
    pub fn into_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Aborted { error, .. } => Some(error),
        }
    }
}

/// Run `operation` until `should_stop` accepts its value or the budget runs out.
///
/// `operation` receives the zero-based attempt index. Transient errors count
/// against the budget; non-transient errors return [`RetryError::Aborted`]
/// without sleeping.
pub async fn retry<T, E, F, Fut, S>(
    policy: &RetryPolicy,
    mut operation: F,
    should_stop: S,
) -> Result<T, RetryError<T, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn(&T) -> bool,
    E: Transient + Display,
{
    let max_attempts = policy.max_retries.max(1);
    let mut last_value = None;
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match operation(attempt - 1).await {
            Ok(value) if should_stop(&value) => return Ok(value),
            Ok(value) => {
                tracing::debug!(attempt, max_attempts, "Retry condition not yet met");
                last_value = Some(value);
                last_error = None;
            }
            Err(error) if !error.is_transient() => {
                tracing::warn!(attempt, error = %error, "Permanent failure, not retrying");
                return Err(RetryError::Aborted { attempt, error });
            }
            Err(error) => {
                tracing::warn!(attempt, max_attempts, error = %error, "Transient failure");
                last_error = Some(error);
            }
        }

        if attempt < max_attempts {
            let delay = policy.backoff.delay(attempt);
            tracing::debug!(attempt, delay = ?delay, "Backing off before next attempt");
            tokio::time::sleep(delay).await;
        }
    }

    Err(RetryError::Exhausted {
        attempts: max_attempts,
        last_value,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct TestError(bool);

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient: {})", self.0)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, BackoffPolicy::Constant(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_stops_when_predicate_holds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, RetryError<u32, TestError>> = retry(
            &fast_policy(5),
            move |_| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(n)
            },
            |n| *n == 2,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry(
            &fast_policy(4),
            move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>("Processing")
            },
            |status| *status == "Committed",
        )
        .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_value,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_value, Some("Processing"));
                assert!(last_error.is_none());
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry(
            &fast_policy(5),
            move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError(true))
                } else {
                    Ok(7)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_aborts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, _> = retry(
            &fast_policy(5),
            move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError(false))
            },
            |_| true,
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Aborted { attempt: 1, .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_index_is_passed() {
        let result = retry(
            &fast_policy(3),
            |index| async move { Ok::<_, TestError>(index) },
            |index| *index == 2,
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
