//! Retry policy for the transactional execution strategy.
//!
//! Transient storage failures (node recycling, lock contention, connection
//! blips) resolve on their own within a short window; the execution strategy
//! re-runs the whole operation with exponential backoff when the policy's
//! predicate classifies a failure as retryable. The default predicate is
//! deliberately narrow (only `DbError::Transient`), so genuine constraint
//! or configuration errors are never retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::DbError;

#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
    retryable: Arc<dyn Fn(&DbError) -> bool + Send + Sync>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(100), Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            retryable: Arc::new(DbError::is_transient),
        }
    }

    /// Replaces the retryable-error predicate.
    pub fn retryable_when(
        mut self,
        predicate: impl Fn(&DbError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retryable = Arc::new(predicate);
        self
    }

    pub fn is_retryable(&self, error: &DbError) -> bool {
        (self.retryable)(error)
    }

    /// Exponential backoff for the given attempt number (1-based), capped
    /// at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(2));

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_secs(2));
    }

    #[test]
    fn test_default_predicate_only_matches_transient() {
        let policy = RetryPolicy::default();

        assert!(policy.is_retryable(&DbError::Transient("connection reset".into())));
        assert!(!policy.is_retryable(&DbError::Persistence("constraint violation".into())));
        assert!(!policy.is_retryable(&DbError::Cancelled));
    }

    #[test]
    fn test_custom_predicate() {
        let policy = RetryPolicy::default()
            .retryable_when(|error| matches!(error, DbError::LockError(_)));

        assert!(policy.is_retryable(&DbError::LockError("poisoned".into())));
        assert!(!policy.is_retryable(&DbError::Transient("blip".into())));
    }

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
    }
}
