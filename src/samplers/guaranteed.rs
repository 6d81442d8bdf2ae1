use std::sync::Arc;

use opentelemetry::trace::{SamplingDecision, SamplingResult, TraceId};
use opentelemetry::Context;

use crate::clock::Clock;
use crate::samplers::probabilistic::ProbabilisticSampler;
use crate::samplers::rate_limiting::RateLimitingSampler;
use crate::samplers::{sampler_attributes, sampling_result, KIND_PROBABILISTIC};

/// Probabilistic sampler with a rate-limited floor.
///
/// Admits whatever the probabilistic sampler admits, and tops the result up to
/// `lower_bound` traces per second when the probability alone would starve an
/// operation.
#[derive(Debug)]
pub struct GuaranteedThroughputSampler {
    probabilistic: ProbabilisticSampler,
    lower_bound: RateLimitingSampler,
}

impl GuaranteedThroughputSampler {
    /// Creates a sampler admitting at `sampling_rate`, with a guaranteed floor
    /// of `lower_bound` traces per second.
    pub fn new(lower_bound: f64, sampling_rate: f64, clock: Arc<dyn Clock>) -> Self {
        GuaranteedThroughputSampler {
            probabilistic: ProbabilisticSampler::new(sampling_rate),
            lower_bound: RateLimitingSampler::new(lower_bound, clock),
        }
    }

    pub(crate) fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
    ) -> SamplingResult {
        let result = self.probabilistic.should_sample(parent_context, trace_id);
        if result.decision == SamplingDecision::RecordAndSample {
            return result;
        }
        let floor = self.lower_bound.should_sample(parent_context);
        if floor.decision == SamplingDecision::RecordAndSample {
            // A floor admit still reports the probabilistic rate; the limiter
            // only guarantees the minimum and is not the caller-visible policy.
            return sampling_result(
                SamplingDecision::RecordAndSample,
                sampler_attributes(KIND_PROBABILISTIC, self.probabilistic.sampling_rate()),
                parent_context,
            );
        }
        result
    }

    /// Adjusts both children in place, keeping accumulated floor credits.
    pub(crate) fn update(&mut self, lower_bound: f64, sampling_rate: f64) {
        if self.probabilistic.sampling_rate() != sampling_rate.clamp(0.0, 1.0) {
            self.probabilistic.update(sampling_rate);
        }
        self.lower_bound.update(lower_bound);
    }

    pub(crate) fn description(&self) -> String {
        format!(
            "GuaranteedThroughputSampler{{lowerBound={}, samplingRate={}}}",
            self.lower_bound.max_traces_per_second(),
            self.probabilistic.sampling_rate(),
        )
    }
}

impl PartialEq for GuaranteedThroughputSampler {
    fn eq(&self, other: &Self) -> bool {
        self.probabilistic == other.probabilistic && self.lower_bound == other.lower_bound
    }
}
