//! Jittered exponential backoff, capped per delay and against a deadline.

use rand::Rng;
use std::time::Duration;

/// Delay schedule for retries of one logical request.
///
/// Usable standalone: callers who only want to reason about backoff build
/// one directly; the orchestrator derives it from a
/// [`RetryConfig`](crate::RetryConfig) via
/// [`RetryConfig::backoff`](crate::RetryConfig::backoff).
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Exponent base for the schedule.
    pub base: f64,
    /// Hard ceiling on any single delay.
    pub max_delay: Duration,
    /// Deadline relative to the start of the first attempt.
    pub total_timeout: Duration,
}

impl Backoff {
    /// Delay to wait before the next attempt.
    ///
    /// `attempt_number` is 1-based and names the attempt that just failed,
    /// so the first scheduled retry passes 1. `elapsed` is time since the
    /// first attempt started. A zero result means "retry immediately";
    /// giving up is decided by the retry budgets, never here.
    pub fn next_delay(&self, attempt_number: u32, elapsed: Duration) -> Duration {
        self.next_delay_with(attempt_number, elapsed, &mut rand::rng())
    }

    /// Same as [`next_delay`](Self::next_delay) with an injected jitter
    /// source, for deterministic tests.
    pub fn next_delay_with<R: Rng>(
        &self,
        attempt_number: u32,
        elapsed: Duration,
        rng: &mut R,
    ) -> Duration {
        // Uniform jitter keeps independent callers from retrying in lockstep.
        let jitter_ms: f64 = rng.random_range(0.0..1000.0);
        let exp = attempt_number.min(i32::MAX as u32) as i32;
        let raw_ms = self.base.powi(exp) * 1000.0 + jitter_ms;
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);

        // Never overshoot the total deadline; a spent deadline yields zero.
        let remaining_ms = self.total_timeout.as_millis() as f64 - elapsed.as_millis() as f64;
        let delay_ms = capped_ms.min(remaining_ms).max(0.0);
        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    /// Jitter source that always contributes zero.
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn wide_open() -> Backoff {
        Backoff {
            base: 2.0,
            max_delay: Duration::from_secs(1 << 30),
            total_timeout: Duration::from_secs(1 << 30),
        }
    }

    #[test]
    fn delay_lies_within_jitter_window() {
        let backoff = wide_open();
        for attempt in 1..=6u32 {
            let ms = backoff.next_delay(attempt, Duration::ZERO).as_millis() as u64;
            let floor = 2u64.pow(attempt) * 1000;
            assert!(
                (floor..floor + 1000).contains(&ms),
                "attempt {}: {}ms outside [{}, {})",
                attempt,
                ms,
                floor,
                floor + 1000
            );
        }
    }

    #[test]
    fn delay_never_exceeds_max_delay() {
        let backoff = Backoff {
            base: 2.0,
            max_delay: Duration::from_secs(64),
            total_timeout: Duration::from_secs(1 << 30),
        };
        for attempt in [1u32, 5, 10, 20, 30] {
            let d = backoff.next_delay(attempt, Duration::ZERO);
            assert!(d <= Duration::from_secs(64), "attempt {}: {:?}", attempt, d);
        }
    }

    #[test]
    fn delay_is_capped_by_remaining_deadline() {
        let backoff = Backoff {
            base: 2.0,
            max_delay: Duration::from_secs(64),
            total_timeout: Duration::from_secs(600),
        };
        let elapsed = Duration::from_millis(600_000 - 500);
        let d = backoff.next_delay_with(10, elapsed, &mut ZeroRng);
        assert_eq!(d, Duration::from_millis(500));
    }

    #[test]
    fn spent_deadline_yields_zero_not_abort() {
        let backoff = Backoff {
            base: 2.0,
            max_delay: Duration::from_secs(64),
            total_timeout: Duration::from_secs(600),
        };
        let d = backoff.next_delay_with(3, Duration::from_secs(601), &mut ZeroRng);
        assert_eq!(d, Duration::ZERO);
    }

    #[test]
    fn injected_jitter_source_is_deterministic() {
        let backoff = wide_open();
        let a = backoff.next_delay_with(3, Duration::ZERO, &mut ZeroRng);
        let b = backoff.next_delay_with(3, Duration::ZERO, &mut ZeroRng);
        assert_eq!(a, b);
        assert_eq!(a, Duration::from_millis(8000));
    }
}
