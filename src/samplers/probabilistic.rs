use opentelemetry::trace::{SamplingDecision, SamplingResult, TraceId};
use opentelemetry::Context;

use crate::samplers::{sampler_attributes, sampling_result, KIND_PROBABILISTIC};

/// Sampler admitting a fixed fraction of traces, decided by the trace id.
///
/// The low 64 bits of the trace id, shifted down to the 63-bit range produced
/// by legacy id generators, are compared against `floor(rate * 2^63)`. This is
/// the same derivation [`Sampler::TraceIdRatioBased`] uses, so both agree on
/// every 128-bit trace id.
///
/// [`Sampler::TraceIdRatioBased`]: opentelemetry_sdk::trace::Sampler::TraceIdRatioBased
#[derive(Debug, Clone)]
pub struct ProbabilisticSampler {
    sampling_rate: f64,
    threshold: u64,
}

impl ProbabilisticSampler {
    /// Creates a sampler admitting the given fraction of traces. Rates outside
    /// [0, 1] are clamped.
    pub fn new(sampling_rate: f64) -> Self {
        let sampling_rate = sampling_rate.clamp(0.0, 1.0);
        ProbabilisticSampler {
            sampling_rate,
            threshold: (sampling_rate * (1u64 << 63) as f64) as u64,
        }
    }

    pub(crate) fn update(&mut self, sampling_rate: f64) {
        *self = ProbabilisticSampler::new(sampling_rate);
    }

    pub(crate) fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub(crate) fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
    ) -> SamplingResult {
        sampling_result(
            self.decide(trace_id),
            sampler_attributes(KIND_PROBABILISTIC, self.sampling_rate),
            parent_context,
        )
    }

    pub(crate) fn decide(&self, trace_id: TraceId) -> SamplingDecision {
        if self.sampling_rate >= 1.0 {
            return SamplingDecision::RecordAndSample;
        }
        let bytes = trace_id.to_bytes();
        let (_, low) = bytes.split_at(8);
        let trace_id_low = u64::from_be_bytes(low.try_into().unwrap());
        if (trace_id_low >> 1) < self.threshold {
            SamplingDecision::RecordAndSample
        } else {
            SamplingDecision::Drop
        }
    }

    pub(crate) fn description(&self) -> String {
        format!("ProbabilisticSampler{{samplingRate={}}}", self.sampling_rate)
    }
}

impl PartialEq for ProbabilisticSampler {
    fn eq(&self, other: &Self) -> bool {
        self.sampling_rate == other.sampling_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samplers::{SAMPLER_KIND, SAMPLER_PARAM};
    use opentelemetry::trace::SpanKind;
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace::{Sampler, ShouldSample};

    #[test]
    fn extreme_rates() {
        let never = ProbabilisticSampler::new(0.0);
        let always = ProbabilisticSampler::new(1.0);
        for id in [0u128, 1, u128::MAX, 0x0123_4567_89ab_cdef] {
            let trace_id = TraceId::from(id);
            assert_eq!(never.decide(trace_id), SamplingDecision::Drop);
            assert_eq!(always.decide(trace_id), SamplingDecision::RecordAndSample);
        }
    }

    #[test]
    fn rates_are_clamped() {
        assert_eq!(ProbabilisticSampler::new(-0.5).sampling_rate(), 0.0);
        assert_eq!(ProbabilisticSampler::new(1.5).sampling_rate(), 1.0);
    }

    #[test]
    fn matches_trace_id_ratio_sampler() {
        for rate in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let sampler = ProbabilisticSampler::new(rate);
            let canonical = Sampler::TraceIdRatioBased(rate);
            for _ in 0..10_000 {
                let trace_id = TraceId::from(rand::random::<u128>());
                let expected = canonical
                    .should_sample(
                        None,
                        trace_id,
                        "parity",
                        &SpanKind::Internal,
                        &[],
                        &[],
                    )
                    .decision;
                assert_eq!(
                    sampler.decide(trace_id),
                    expected,
                    "rate {rate} disagrees on trace id {trace_id:?}"
                );
            }
        }
    }

    #[test]
    fn decision_is_annotated() {
        let sampler = ProbabilisticSampler::new(1.0);
        let result = sampler.should_sample(None, TraceId::from(1u128));
        assert_eq!(result.decision, SamplingDecision::RecordAndSample);
        assert!(result
            .attributes
            .contains(&KeyValue::new(SAMPLER_KIND, "probabilistic")));
        assert!(result.attributes.contains(&KeyValue::new(SAMPLER_PARAM, 1.0)));
    }
}
