use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opentelemetry::otel_debug;
use opentelemetry::trace::{SamplingResult, TraceId};
use opentelemetry::Context;

use crate::clock::Clock;
use crate::samplers::guaranteed::GuaranteedThroughputSampler;
use crate::samplers::probabilistic::ProbabilisticSampler;
use crate::samplers::{sampler_attributes, sampling_result, KIND_PROBABILISTIC};
use crate::strategy::PerOperationStrategy;

/// Sampler that keeps one [`GuaranteedThroughputSampler`] per operation.
///
/// The table is bounded by `max_operations` so adversarial span-name
/// cardinality cannot grow it without limit: once full, unknown operations
/// fall back to the default probabilistic sampler and no entry is added.
/// Entries are never evicted; the table is only rebuilt when a new
/// per-operation strategy is installed.
#[derive(Debug)]
pub struct PerOperationSampler {
    default_sampler: ProbabilisticSampler,
    lower_bound: f64,
    max_operations: usize,
    late_binding: bool,
    operations: Mutex<HashMap<String, GuaranteedThroughputSampler>>,
    clock: Arc<dyn Clock>,
}

impl PerOperationSampler {
    /// Builds a table from a per-operation strategy. At most `max_operations`
    /// entries are created; surplus entries from the strategy are dropped.
    pub fn new(
        strategy: &PerOperationStrategy,
        max_operations: usize,
        late_binding: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lower_bound = strategy.default_lower_bound_traces_per_second;
        let mut operations = HashMap::new();
        for entry in &strategy.operations {
            if operations.len() >= max_operations {
                otel_debug!(
                    name: "JaegerRemoteSampler.OperationTableFull",
                    message = "per-operation strategy has more entries than maxOperations, the rest use the default sampler",
                    max_operations = max_operations
                );
                break;
            }
            operations.insert(
                entry.operation.clone(),
                GuaranteedThroughputSampler::new(lower_bound, entry.sampling_rate, clock.clone()),
            );
        }
        PerOperationSampler {
            default_sampler: ProbabilisticSampler::new(strategy.default_sampling_probability),
            lower_bound,
            max_operations,
            late_binding,
            operations: Mutex::new(operations),
            clock,
        }
    }

    pub(crate) fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
        name: &str,
    ) -> SamplingResult {
        let mut operations = self
            .operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(entry) = operations.get(name) {
            return entry.should_sample(parent_context, trace_id);
        }

        if operations.len() < self.max_operations {
            let entry = GuaranteedThroughputSampler::new(
                self.lower_bound,
                self.default_sampler.sampling_rate(),
                self.clock.clone(),
            );
            let result = entry.should_sample(parent_context, trace_id);
            operations.insert(name.to_string(), entry);
            if self.late_binding {
                // The operation name may still change after span creation, so
                // the decision is attributed to the service-wide policy rather
                // than the entry just created for this name.
                return sampling_result(
                    result.decision,
                    sampler_attributes(KIND_PROBABILISTIC, self.default_sampler.sampling_rate()),
                    parent_context,
                );
            }
            return result;
        }

        drop(operations);
        self.default_sampler.should_sample(parent_context, trace_id)
    }

    /// Applies a new per-operation strategy in place.
    ///
    /// Entries named by the strategy are refreshed without reallocation;
    /// entries it omits keep their current samplers, matching servers that
    /// only send overrides for operations deviating from the default.
    pub(crate) fn update(&mut self, strategy: &PerOperationStrategy) {
        self.default_sampler = ProbabilisticSampler::new(strategy.default_sampling_probability);
        self.lower_bound = strategy.default_lower_bound_traces_per_second;

        let operations = self
            .operations
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for entry in &strategy.operations {
            match operations.get_mut(&entry.operation) {
                Some(existing) => existing.update(self.lower_bound, entry.sampling_rate),
                None => {
                    if operations.len() < self.max_operations {
                        operations.insert(
                            entry.operation.clone(),
                            GuaranteedThroughputSampler::new(
                                self.lower_bound,
                                entry.sampling_rate,
                                self.clock.clone(),
                            ),
                        );
                    }
                }
            }
        }
    }

    pub(crate) fn description(&self) -> String {
        format!(
            "PerOperationSampler{{defaultSamplingProbability={}, lowerBound={}, maxOperations={}}}",
            self.default_sampler.sampling_rate(),
            self.lower_bound,
            self.max_operations,
        )
    }

    #[cfg(test)]
    fn operation_count(&self) -> usize {
        self.operations.lock().unwrap().len()
    }

    #[cfg(test)]
    fn contains_operation(&self, name: &str) -> bool {
        self.operations.lock().unwrap().contains_key(name)
    }
}
