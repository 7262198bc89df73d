//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay schedule between two attempts of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    Constant(Duration),
    /// `base * 2^(attempt-1)` capped at `max`, plus up to 10% jitter.
    Exponential { base: Duration, max: Duration },
}

impl BackoffPolicy {
    /// Constant delay in whole seconds.
    pub fn constant_secs(secs: u64) -> Self {
        Self::Constant(Duration::from_secs(secs))
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Constant(delay) => *delay,
            BackoffPolicy::Exponential { base, max } => {
                calculate_backoff(attempt, base.as_millis() as u64, max.as_millis() as u64)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn test_constant_policy_ignores_attempt() {
        let policy = BackoffPolicy::constant_secs(2);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(9), Duration::from_secs(2));
    }

    #[test]
    fn test_default_policy_doubles() {
        let policy = BackoffPolicy::default();
        assert!(policy.delay(1) >= Duration::from_secs(1));
        assert!(policy.delay(4) >= Duration::from_secs(8));
        assert!(policy.delay(30) < Duration::from_millis(128_000 + 12_800));
    }
}
