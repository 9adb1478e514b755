//! Exponential backoff with bounded jitter.

use crate::config::RetryPolicy;
use rand::Rng;
use std::time::Duration;

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), with `jitter_unit` in [0, 1]
    /// scaled to the policy's jitter fraction.
    pub fn delay_for(&self, retry: u32, jitter_unit: f64) -> Duration {
        let exp = self.factor.powi(retry.saturating_sub(1) as i32);
        let raw = self.base_delay.as_secs_f64() * exp;
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = capped * self.jitter * jitter_unit.clamp(0.0, 1.0);
        Duration::from_secs_f64(capped + jitter)
    }
}

/// Per-call retry schedule. Successive delays never shrink.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
    last: Duration,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: 0,
            last: Duration::ZERO,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Next delay using thread-local randomness for jitter.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        let unit = rand::thread_rng().gen_range(0.0..=1.0);
        self.next_delay_with(retry_after, unit)
    }

    /// Next delay with an explicit jitter unit. A server-provided `retry_after`
    /// replaces the computed delay.
    pub fn next_delay_with(&mut self, retry_after: Option<Duration>, jitter_unit: f64) -> Duration {
        self.retries += 1;
        let delay = match retry_after {
            Some(d) => d,
            None => self.policy.delay_for(self.retries, jitter_unit).max(self.last),
        };
        self.last = self.last.max(delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_from_base_and_caps() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        let delays: Vec<_> = (1..=6).map(|n| policy.delay_for(n, 0.0)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
                Duration::from_millis(8000),
            ]
        );
    }

    #[test]
    fn retry_after_overrides_computed_delay() {
        let mut backoff = Backoff::new(RetryPolicy::default());
        assert_eq!(
            backoff.next_delay_with(Some(Duration::from_secs(3)), 0.5),
            Duration::from_secs(3)
        );
        // Computed delays after an override do not drop below it.
        assert!(backoff.next_delay_with(None, 0.0) >= Duration::from_secs(3));
    }

    proptest! {
        #[test]
        fn schedule_is_non_decreasing(units in proptest::collection::vec(0.0f64..=1.0, 1..12)) {
            let mut backoff = Backoff::new(RetryPolicy::default());
            let mut previous = Duration::ZERO;
            for unit in units {
                let d = backoff.next_delay_with(None, unit);
                prop_assert!(d >= previous);
                prop_assert!(d <= Duration::from_secs_f64(8.0 * 1.1));
                previous = d;
            }
        }
    }
}
