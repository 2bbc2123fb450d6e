//! Exponential backoff policy for reconnection.
//!
//! Delays grow multiplicatively from `initial` and are capped at `max`. There is
//! no retry budget and no jitter: the sequence is non-decreasing until
//! [`ExponentialBackoff::reset`] is called.

use std::time::Duration;

/// Default first retry delay
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Default retry delay ceiling
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Default growth factor between consecutive delays
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial: DEFAULT_INITIAL_DELAY, max: DEFAULT_MAX_DELAY, multiplier: DEFAULT_MULTIPLIER }
    }
}

/// Stateful delay generator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at the policy's initial delay
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { current: policy.initial.min(policy.max), policy }
    }

    /// Delay to wait before the next attempt, advancing the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.as_secs_f64() * self.policy.multiplier.max(1.0);
        // Saturate at the ceiling when the product no longer fits a Duration.
        self.current = Duration::try_from_secs_f64(grown)
            .map_or(self.policy.max, |next| next.min(self.policy.max));
        delay
    }

    /// Restart from the initial delay
    pub fn reset(&mut self) {
        self.current = self.policy.initial.min(self.policy.max);
    }

    /// The policy this backoff was built from
    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_sequence_grows_then_caps() {
        let mut backoff = ExponentialBackoff::new(BackoffPolicy::default());
        let delays: Vec<Duration> = (0..10).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_secs(5));
        assert_eq!(delays[1], Duration::from_millis(7500));
        assert_eq!(delays[2], Duration::from_millis(11250));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut backoff = ExponentialBackoff::new(BackoffPolicy::default());
        for _ in 0..20 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), DEFAULT_INITIAL_DELAY);
    }

    #[test]
    fn initial_above_max_is_clamped() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(90),
            max: Duration::from_secs(60),
            multiplier: 2.0,
        };
        let mut backoff = ExponentialBackoff::new(policy);
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    #[test]
    fn huge_multiplier_saturates_at_max() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(u64::MAX / 2),
            multiplier: 1e300,
        };
        let mut backoff = ExponentialBackoff::new(policy);

        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), policy.max);
        assert_eq!(backoff.next_delay(), policy.max);
    }

    proptest! {
        #[test]
        fn sequence_is_non_decreasing_and_bounded(
            initial_ms in 1u64..10_000,
            extra_ms in 0u64..120_000,
            multiplier in 1.0f64..4.0,
            steps in 1usize..64,
        ) {
            let policy = BackoffPolicy {
                initial: Duration::from_millis(initial_ms),
                max: Duration::from_millis(initial_ms + extra_ms),
                multiplier,
            };
            let mut backoff = ExponentialBackoff::new(policy);

            let mut previous = Duration::ZERO;
            for _ in 0..steps {
                let delay = backoff.next_delay();
                prop_assert!(delay >= previous);
                prop_assert!(delay <= policy.max);
                previous = delay;
            }

            backoff.reset();
            prop_assert_eq!(backoff.next_delay(), policy.initial);
        }
    }
}
