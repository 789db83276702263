use std::time::Duration;

/// Default number of retries after the first connection attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How long to wait before each retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `initial` before the first retry, doubling each time, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let shift = retry.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

/// Bounded connection retry policy.
///
/// A connect makes at most `1 + max_retries` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// Pause between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::Fixed(DEFAULT_RETRY_DELAY),
        }
    }
}

impl RetryPolicy {
    /// Default pacing with an explicit retry budget.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Override the backoff strategy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based),
    /// or `None` when the budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts() {
            return None;
        }
        Some(self.backoff.delay(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_four_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay_after(1), Some(DEFAULT_RETRY_DELAY));
        assert_eq!(policy.delay_after(3), Some(DEFAULT_RETRY_DELAY));
        assert_eq!(policy.delay_after(4), None);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy::with_max_retries(0);
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(650),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(650));
        assert_eq!(backoff.delay(64), Duration::from_millis(650));
    }

    #[test]
    fn with_backoff_keeps_retry_budget() {
        let policy = RetryPolicy::with_max_retries(10)
            .with_backoff(Backoff::Fixed(Duration::from_millis(20)));
        assert_eq!(policy.attempts(), 11);
        assert_eq!(policy.delay_after(10), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_after(11), None);
    }
}
