//! Wire format of the jaeger remote sampling protocol and its validated
//! in-memory form.
//!
//! The JSON schema follows the `sampling.proto` definition from jaeger-idl.
//! Servers disagree on the details, so parsing is deliberately lenient:
//! unknown fields are ignored, `strategyType` is accepted both as the legacy
//! integer and as the symbolic string, and fractional rate limits are
//! truncated rather than refused.

use std::fmt;

use opentelemetry::otel_warn;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SamplerError;

/// Legacy discriminator of [`SamplingStrategyResponse`].
///
/// Kept for producers that still set it; consumers should prefer checking
/// which payload field is present, starting with `operationSampling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingStrategyType {
    /// Sample a fixed fraction of traces.
    Probabilistic,
    /// Sample a fixed number of traces per second.
    RateLimiting,
}

impl<'de> Deserialize<'de> for SamplingStrategyType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StrategyTypeVisitor;

        impl Visitor<'_> for StrategyTypeVisitor {
            type Value = SamplingStrategyType;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("0, 1, \"PROBABILISTIC\" or \"RATE_LIMITING\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                match value {
                    0 => Ok(SamplingStrategyType::Probabilistic),
                    1 => Ok(SamplingStrategyType::RateLimiting),
                    other => Err(E::custom(format!("unknown strategy type: {other}"))),
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                match value {
                    0 => Ok(SamplingStrategyType::Probabilistic),
                    1 => Ok(SamplingStrategyType::RateLimiting),
                    other => Err(E::custom(format!("unknown strategy type: {other}"))),
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                match value {
                    "PROBABILISTIC" => Ok(SamplingStrategyType::Probabilistic),
                    "RATE_LIMITING" => Ok(SamplingStrategyType::RateLimiting),
                    other => Err(E::custom(format!("unknown strategy type: {other}"))),
                }
            }
        }

        deserializer.deserialize_any(StrategyTypeVisitor)
    }
}

/// Samples traces with a fixed probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilisticSamplingStrategy {
    /// Sampling probability in the range [0.0, 1.0].
    pub sampling_rate: f64,
}

/// Samples a fixed number of traces per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitingSamplingStrategy {
    /// The wire type is a whole number of traces per second; fractional
    /// values produced by some servers are truncated with a warning.
    #[serde(deserialize_with = "truncated_rate_limit")]
    pub max_traces_per_second: i32,
}

/// Sampling strategy for a single operation (endpoint, span name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSamplingStrategy {
    /// Operation the strategy applies to.
    pub operation: String,
    /// Only probabilistic per-operation sampling is defined by the protocol.
    pub probabilistic_sampling: ProbabilisticSamplingStrategy,
}

/// Combination of per-operation strategies with service-wide defaults.
///
/// Useful for services whose endpoints receive vastly different traffic, where
/// any single sampling rate would produce either too much data for some
/// endpoints or almost none for others.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerOperationSamplingStrategies {
    /// Sampling probability for operations not matched by
    /// `per_operation_strategies`.
    pub default_sampling_probability: f64,
    /// Lower-bound rate limit ensuring a minimal amount of traces for
    /// endpoints that a probabilistic strategy alone might never sample. The
    /// limit is local to a single service instance.
    pub default_lower_bound_traces_per_second: f64,
    /// Strategies for individual operations within the service.
    pub per_operation_strategies: Vec<OperationSamplingStrategy>,
    /// Upper-bound rate limit. Almost no SDK honors it; accepted and ignored.
    pub default_upper_bound_traces_per_second: f64,
}

/// Overall sampling strategy for a service, as returned by the configuration
/// service.
///
/// This is a union where only one payload is expected; when several are
/// present, `operationSampling` wins, matching what jaeger agents emit for
/// adaptive configurations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplingStrategyResponse {
    /// Legacy discriminator; see [`SamplingStrategyType`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<SamplingStrategyType>,
    /// Present for probabilistic strategies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilistic_sampling: Option<ProbabilisticSamplingStrategy>,
    /// Present for rate-limiting strategies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limiting_sampling: Option<RateLimitingSamplingStrategy>,
    /// Present for adaptive, per-operation strategies; wins over the others.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_sampling: Option<PerOperationSamplingStrategies>,
}

fn truncated_rate_limit<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 {
        otel_warn!(
            name: "JaegerRemoteSampler.FractionalRateLimit",
            message = "maxTracesPerSecond is not a whole number and was truncated",
            max_traces_per_second = value
        );
    }
    Ok(value as i32)
}

/// A validated sampling strategy, ready to be applied to the sampler.
///
/// Comparing the most recently installed strategy against a freshly parsed one
/// is how the sampler skips redundant updates, so equality is field-wise.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Admit a fixed fraction of traces.
    Probabilistic {
        /// Probability in [0.0, 1.0].
        sampling_rate: f64,
    },
    /// Admit a fixed number of traces per second.
    RateLimiting {
        /// Whole traces per second; zero admits nothing.
        max_traces_per_second: i32,
    },
    /// Admit per operation, with service-wide defaults.
    PerOperation(PerOperationStrategy),
}

/// Validated form of [`PerOperationSamplingStrategies`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerOperationStrategy {
    /// Probability for operations without a dedicated entry.
    pub default_sampling_probability: f64,
    /// Minimum traces per second guaranteed to every operation.
    pub default_lower_bound_traces_per_second: f64,
    /// Dedicated entries, keyed by operation name.
    pub operations: Vec<OperationStrategy>,
}

/// Validated per-operation entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStrategy {
    /// Operation the entry applies to.
    pub operation: String,
    /// Probability in [0.0, 1.0].
    pub sampling_rate: f64,
}

impl TryFrom<SamplingStrategyResponse> for Strategy {
    type Error = SamplerError;

    fn try_from(response: SamplingStrategyResponse) -> Result<Self, Self::Error> {
        if let Some(operation_sampling) = response.operation_sampling {
            let mut operations = Vec::with_capacity(operation_sampling.per_operation_strategies.len());
            for entry in operation_sampling.per_operation_strategies {
                if entry.operation.is_empty() {
                    return Err(SamplerError::Validation(
                        "empty operation name in perOperationStrategies".to_string(),
                    ));
                }
                operations.push(OperationStrategy {
                    operation: entry.operation,
                    sampling_rate: clamped_rate(entry.probabilistic_sampling.sampling_rate),
                });
            }
            return Ok(Strategy::PerOperation(PerOperationStrategy {
                default_sampling_probability: clamped_rate(
                    operation_sampling.default_sampling_probability,
                ),
                default_lower_bound_traces_per_second: operation_sampling
                    .default_lower_bound_traces_per_second
                    .max(0.0),
                operations,
            }));
        }

        match (
            response.strategy_type,
            response.rate_limiting_sampling,
            response.probabilistic_sampling,
        ) {
            (Some(SamplingStrategyType::RateLimiting), Some(rate_limiting), _)
            | (None, Some(rate_limiting), _) => {
                if rate_limiting.max_traces_per_second < 0 {
                    return Err(SamplerError::Validation(format!(
                        "negative maxTracesPerSecond: {}",
                        rate_limiting.max_traces_per_second
                    )));
                }
                Ok(Strategy::RateLimiting {
                    max_traces_per_second: rate_limiting.max_traces_per_second,
                })
            }
            (Some(SamplingStrategyType::RateLimiting), None, _) => Err(SamplerError::Validation(
                "rate limiting strategy without rateLimitingSampling".to_string(),
            )),
            (Some(SamplingStrategyType::Probabilistic), _, Some(probabilistic))
            | (None, None, Some(probabilistic)) => Ok(Strategy::Probabilistic {
                sampling_rate: clamped_rate(probabilistic.sampling_rate),
            }),
            (Some(SamplingStrategyType::Probabilistic), _, None) => Err(SamplerError::Validation(
                "probabilistic strategy without probabilisticSampling".to_string(),
            )),
            (None, None, None) => Err(SamplerError::Validation(
                "empty sampling strategy".to_string(),
            )),
        }
    }
}

fn clamped_rate(sampling_rate: f64) -> f64 {
    if sampling_rate.is_nan() {
        otel_warn!(
            name: "JaegerRemoteSampler.SamplingRateOutOfRange",
            message = "samplingRate is not a number, using 0.0"
        );
        return 0.0;
    }
    if !(0.0..=1.0).contains(&sampling_rate) {
        otel_warn!(
            name: "JaegerRemoteSampler.SamplingRateOutOfRange",
            message = "samplingRate is outside [0.0, 1.0] and was clamped",
            sampling_rate = sampling_rate
        );
        return sampling_rate.clamp(0.0, 1.0);
    }
    sampling_rate
}

/// Decodes raw bytes from the configuration service into a [`Strategy`].
///
/// Replaceable for deployments that receive strategies in another encoding,
/// for example from a file or a sidecar.
pub trait StrategyParser: fmt::Debug + Send + Sync {
    /// Parses and validates one strategy document.
    fn parse(&self, body: &[u8]) -> Result<Strategy, SamplerError>;
}

/// Default [`StrategyParser`] for the JSON wire format.
#[derive(Debug, Clone, Default)]
pub struct JsonStrategyParser;

impl StrategyParser for JsonStrategyParser {
    fn parse(&self, body: &[u8]) -> Result<Strategy, SamplerError> {
        let response: SamplingStrategyResponse =
            serde_json::from_slice(body).map_err(|err| SamplerError::Parse(err.to_string()))?;
        Strategy::try_from(response)
    }
}
