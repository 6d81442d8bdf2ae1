//! The sampler variants a remote strategy can install.

use opentelemetry::trace::{
    Link, SamplingDecision, SamplingResult, SpanKind, TraceContextExt, TraceId, TraceState,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::ShouldSample;

mod guaranteed;
mod per_operation;
mod probabilistic;
mod rate_limiting;

pub use guaranteed::GuaranteedThroughputSampler;
pub use per_operation::PerOperationSampler;
pub use probabilistic::ProbabilisticSampler;
pub use rate_limiting::RateLimitingSampler;

/// Attribute key describing which kind of sampler produced a decision.
pub const SAMPLER_KIND: &str = "sampler.kind";
/// Attribute key carrying the sampler's numeric parameter: the sampling rate
/// for probabilistic decisions, the maximum traces per second for
/// rate-limited ones.
pub const SAMPLER_PARAM: &str = "sampler.param";

pub(crate) const KIND_PROBABILISTIC: &str = "probabilistic";
pub(crate) const KIND_RATE_LIMITING: &str = "ratelimiting";

pub(crate) fn sampler_attributes(kind: &'static str, param: f64) -> Vec<KeyValue> {
    vec![
        KeyValue::new(SAMPLER_KIND, kind),
        KeyValue::new(SAMPLER_PARAM, param),
    ]
}

pub(crate) fn sampling_result(
    decision: SamplingDecision,
    attributes: Vec<KeyValue>,
    parent_context: Option<&Context>,
) -> SamplingResult {
    SamplingResult {
        decision,
        attributes,
        // samplers never modify the parent trace state
        trace_state: match parent_context {
            Some(ctx) => ctx.span().span_context().trace_state().clone(),
            None => TraceState::default(),
        },
    }
}

/// The decision engine currently installed in a remote sampler.
///
/// A closed set of variants so strategy updaters can dispatch on the active
/// kind and mutate it in place; arbitrary caller-supplied samplers are carried
/// by [`ActiveSampler::Delegate`] until the first strategy arrives.
#[derive(Debug)]
#[non_exhaustive]
pub enum ActiveSampler {
    /// Admit a fixed fraction of traces by trace id.
    Probabilistic(ProbabilisticSampler),
    /// Admit a bounded number of traces per second.
    RateLimiting(RateLimitingSampler),
    /// Probabilistic sampling with a rate-limited floor.
    GuaranteedThroughput(GuaranteedThroughputSampler),
    /// One guaranteed-throughput sampler per operation.
    PerOperation(PerOperationSampler),
    /// Any other sampler, typically the initial one.
    Delegate(Box<dyn ShouldSample>),
}

impl ActiveSampler {
    pub(crate) fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
        name: &str,
        span_kind: &SpanKind,
        attributes: &[KeyValue],
        links: &[Link],
    ) -> SamplingResult {
        match self {
            ActiveSampler::Probabilistic(sampler) => {
                sampler.should_sample(parent_context, trace_id)
            }
            ActiveSampler::RateLimiting(sampler) => sampler.should_sample(parent_context),
            ActiveSampler::GuaranteedThroughput(sampler) => {
                sampler.should_sample(parent_context, trace_id)
            }
            ActiveSampler::PerOperation(sampler) => {
                sampler.should_sample(parent_context, trace_id, name)
            }
            ActiveSampler::Delegate(sampler) => sampler.should_sample(
                parent_context,
                trace_id,
                name,
                span_kind,
                attributes,
                links,
            ),
        }
    }

    pub(crate) fn description(&self) -> String {
        match self {
            ActiveSampler::Probabilistic(sampler) => sampler.description(),
            ActiveSampler::RateLimiting(sampler) => sampler.description(),
            ActiveSampler::GuaranteedThroughput(sampler) => sampler.description(),
            ActiveSampler::PerOperation(sampler) => sampler.description(),
            ActiveSampler::Delegate(sampler) => format!("{sampler:?}"),
        }
    }

    /// Whether two samplers would make identical decisions. Cross-kind
    /// comparisons, per-operation tables and delegates are never equal.
    pub(crate) fn equal(&self, other: &ActiveSampler) -> bool {
        match (self, other) {
            (ActiveSampler::Probabilistic(a), ActiveSampler::Probabilistic(b)) => a == b,
            (ActiveSampler::RateLimiting(a), ActiveSampler::RateLimiting(b)) => a == b,
            (ActiveSampler::GuaranteedThroughput(a), ActiveSampler::GuaranteedThroughput(b)) => {
                a == b
            }
            _ => false,
        }
    }
}
