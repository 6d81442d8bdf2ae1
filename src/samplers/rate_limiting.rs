use std::sync::{Arc, Mutex};
use std::time::Instant;

use opentelemetry::trace::{SamplingDecision, SamplingResult};
use opentelemetry::Context;

use crate::clock::Clock;
use crate::samplers::{sampler_attributes, sampling_result, KIND_RATE_LIMITING};

/// Token bucket accumulating fractional credits at a bounded rate.
///
/// Not safe for concurrent use; the owning sampler serializes access behind
/// its own lock.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    credits_per_second: f64,
    balance: f64,
    max_balance: f64,
    last_tick: Instant,
}

impl RateLimiter {
    pub(crate) fn new(credits_per_second: f64, max_balance: f64, now: Instant) -> Self {
        RateLimiter {
            credits_per_second,
            // a full bucket, so a freshly configured limiter allows a burst
            balance: max_balance,
            max_balance,
            last_tick: now,
        }
    }

    /// Refills the bucket for the time elapsed since the last attempt, then
    /// withdraws one credit if a whole one is available.
    pub(crate) fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.balance = f64::min(
            self.balance + elapsed.as_secs_f64() * self.credits_per_second,
            self.max_balance,
        );
        if self.balance >= 1.0 {
            self.balance -= 1.0;
            true
        } else {
            false
        }
    }

    /// Reconfigures capacity and refill rate, keeping the accumulated balance
    /// (clamped to the new capacity) and the last refill instant.
    pub(crate) fn update_limit(&mut self, max_balance: f64, credits_per_second: f64) {
        self.max_balance = max_balance;
        self.credits_per_second = credits_per_second;
        self.balance = f64::min(self.balance, max_balance);
    }

    #[cfg(test)]
    pub(crate) fn balance(&self) -> f64 {
        self.balance
    }
}

/// Sampler admitting at most `max_traces_per_second` traces per second.
#[derive(Debug)]
pub struct RateLimitingSampler {
    max_traces_per_second: f64,
    bucket: Mutex<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl RateLimitingSampler {
    /// Creates a sampler admitting up to `max_traces_per_second` traces per
    /// second, with an initial burst of `max(max_traces_per_second, 1)`.
    /// Negative rates are treated as zero; a zero rate admits nothing.
    pub fn new(max_traces_per_second: f64, clock: Arc<dyn Clock>) -> Self {
        let max_traces_per_second = max_traces_per_second.max(0.0);
        let mut bucket = RateLimiter::new(
            max_traces_per_second,
            max_traces_per_second.max(1.0),
            clock.now(),
        );
        if max_traces_per_second == 0.0 {
            bucket.balance = 0.0;
        }
        RateLimitingSampler {
            max_traces_per_second,
            bucket: Mutex::new(bucket),
            clock,
        }
    }

    pub(crate) fn should_sample(&self, parent_context: Option<&Context>) -> SamplingResult {
        let admitted = self
            .bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .try_consume(self.clock.now());
        let decision = if admitted {
            SamplingDecision::RecordAndSample
        } else {
            SamplingDecision::Drop
        };
        sampling_result(
            decision,
            sampler_attributes(KIND_RATE_LIMITING, self.max_traces_per_second),
            parent_context,
        )
    }

    /// Changes the admitted rate in place, keeping accumulated credits.
    /// A zero rate also forfeits remaining credits, as in [`Self::new`].
    pub(crate) fn update(&mut self, max_traces_per_second: f64) {
        let max_traces_per_second = max_traces_per_second.max(0.0);
        self.max_traces_per_second = max_traces_per_second;
        let bucket = self
            .bucket
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        bucket.update_limit(max_traces_per_second.max(1.0), max_traces_per_second);
        if max_traces_per_second == 0.0 {
            bucket.balance = 0.0;
        }
    }

    pub(crate) fn max_traces_per_second(&self) -> f64 {
        self.max_traces_per_second
    }

    pub(crate) fn description(&self) -> String {
        format!(
            "RateLimitingSampler{{maxTracesPerSecond={}}}",
            self.max_traces_per_second
        )
    }
}

impl PartialEq for RateLimitingSampler {
    fn eq(&self, other: &Self) -> bool {
        self.max_traces_per_second == other.max_traces_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use std::time::Duration;

    #[test]
    fn rate_limiter_refill_and_cap() {
        let clock = ManualClock::new();
        // maximum bucket size 2, one credit every 10 seconds
        let mut bucket = RateLimiter::new(0.1, 2.0, clock.now());

        let test_cases = vec![
            (0, vec![true, true, false]),
            (1, vec![false]),
            (4, vec![false]),
            (5, vec![true, false]),
            (50, vec![true, true, false]), // capped at the maximum of 2
        ];

        for (advance_sec, expectations) in test_cases {
            clock.advance(Duration::from_secs(advance_sec));
            for expected in expectations {
                assert_eq!(expected, bucket.try_consume(clock.now()));
            }
        }
    }

    #[test]
    fn rate_limiter_update_keeps_balance() {
        let clock = ManualClock::new();
        let mut bucket = RateLimiter::new(2.0, 2.0, clock.now());
        assert!(bucket.try_consume(clock.now()));
        assert_eq!(bucket.balance(), 1.0);

        bucket.update_limit(3.0, 3.0);
        assert_eq!(bucket.balance(), 1.0);

        bucket.update_limit(0.5, 0.5);
        assert_eq!(bucket.balance(), 0.5);
    }

    #[test]
    fn burst_admits_whole_credits_only() {
        let clock = Arc::new(ManualClock::new());
        let sampler = RateLimitingSampler::new(2.0, clock.clone());

        let decisions: Vec<_> = (0..3)
            .map(|_| sampler.should_sample(None).decision)
            .collect();
        assert_eq!(
            decisions,
            vec![
                SamplingDecision::RecordAndSample,
                SamplingDecision::RecordAndSample,
                SamplingDecision::Drop,
            ]
        );
    }

    #[test]
    fn sub_unit_rate_still_admits_first_request() {
        let clock = Arc::new(ManualClock::new());
        let sampler = RateLimitingSampler::new(0.5, clock.clone());

        assert_eq!(
            sampler.should_sample(None).decision,
            SamplingDecision::RecordAndSample
        );
        assert_eq!(sampler.should_sample(None).decision, SamplingDecision::Drop);

        clock.advance(Duration::from_secs(2));
        assert_eq!(
            sampler.should_sample(None).decision,
            SamplingDecision::RecordAndSample
        );
    }

    #[test]
    fn zero_rate_never_admits() {
        let clock = Arc::new(ManualClock::new());
        let sampler = RateLimitingSampler::new(0.0, clock.clone());

        assert_eq!(sampler.should_sample(None).decision, SamplingDecision::Drop);
        clock.advance(Duration::from_secs(100));
        assert_eq!(sampler.should_sample(None).decision, SamplingDecision::Drop);
    }

    #[test]
    fn update_preserves_spent_credits() {
        let clock = Arc::new(ManualClock::new());
        let mut sampler = RateLimitingSampler::new(2.0, clock.clone());

        assert_eq!(
            sampler.should_sample(None).decision,
            SamplingDecision::RecordAndSample
        );
        sampler.update(2.0);

        // one credit was already spent before the update, so only one remains
        assert_eq!(
            sampler.should_sample(None).decision,
            SamplingDecision::RecordAndSample
        );
        assert_eq!(sampler.should_sample(None).decision, SamplingDecision::Drop);
    }

    #[test]
    fn update_to_zero_rate_stops_admitting() {
        let clock = Arc::new(ManualClock::new());
        let mut sampler = RateLimitingSampler::new(2.0, clock.clone());
        assert_eq!(
            sampler.should_sample(None).decision,
            SamplingDecision::RecordAndSample
        );

        // a remaining credit does not survive an update to a zero rate
        sampler.update(0.0);
        assert_eq!(sampler.should_sample(None).decision, SamplingDecision::Drop);
        clock.advance(Duration::from_secs(100));
        assert_eq!(sampler.should_sample(None).decision, SamplingDecision::Drop);
    }

    #[test]
    fn equality_is_rate_based() {
        let clock = Arc::new(ManualClock::new());
        let a = RateLimitingSampler::new(2.0, clock.clone());
        let b = RateLimitingSampler::new(2.0, clock.clone());
        let c = RateLimitingSampler::new(3.0, clock);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
