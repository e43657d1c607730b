//! Retry policy
//!
//! Delays grow linearly with the attempt number: `base * (attempt + 1)`.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Stateless backoff and retry-permission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
}

impl RetryPolicy {
    /// Create policy with a base delay
    #[inline]
    #[must_use]
    pub const fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Base delay
    #[inline]
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Delay before the retry following `attempt` (zero-based)
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.base
            .checked_mul(attempt.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }

    /// Whether another attempt is allowed
    ///
    /// Check before incrementing the counter, never after.
    #[inline]
    #[must_use]
    pub const fn may_retry(attempt: u32, max: u32) -> bool {
        attempt < max
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Sleep for `delay` unless `cancel` fires first
///
/// Returns `false` when cancelled.
pub async fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::new(Duration::from_millis(500));
        assert_eq!(policy.next_delay(0), Duration::from_millis(500));
        assert_eq!(policy.next_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.next_delay(2), Duration::from_millis(1500));
    }

    #[test]
    fn delay_saturates() {
        let policy = RetryPolicy::new(Duration::MAX);
        assert_eq!(policy.next_delay(3), Duration::MAX);
    }

    #[test]
    fn may_retry_is_strict() {
        assert!(RetryPolicy::may_retry(0, 3));
        assert!(RetryPolicy::may_retry(2, 3));
        assert!(!RetryPolicy::may_retry(3, 3));
        assert!(!RetryPolicy::may_retry(0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert!(sleep_unless_cancelled(Duration::from_secs(30), &cancel).await);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let child = cancel.child_token();
        let handle = tokio::spawn(async move { sleep_unless_cancelled(Duration::from_secs(3600), &child).await });
        tokio::task::yield_now().await;
        cancel.cancel();
        assert!(!handle.await.unwrap());
    }

    proptest! {
        #[test]
        fn prop_check_before_increment_never_exceeds_cap(max in 0u32..10, requests in 0usize..50) {
            let mut counter = 0u32;
            for _ in 0..requests {
                if RetryPolicy::may_retry(counter, max) {
                    counter += 1;
                }
                prop_assert!(counter <= max);
            }
        }

        #[test]
        fn prop_delay_is_monotonic(base_ms in 1u64..10_000, attempt in 0u32..100) {
            let policy = RetryPolicy::new(Duration::from_millis(base_ms));
            prop_assert!(policy.next_delay(attempt) < policy.next_delay(attempt + 1));
            prop_assert!(policy.next_delay(attempt) <= Duration::from_millis(base_ms) * (attempt + 1) * 2);
        }
    }
}
