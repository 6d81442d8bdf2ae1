use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::SamplerError;
use crate::samplers::{
    ActiveSampler, PerOperationSampler, ProbabilisticSampler, RateLimitingSampler,
};
use crate::strategy::Strategy;

/// Turns a parsed [`Strategy`] into changes to the active sampler.
///
/// Updaters form an ordered chain; the first one that recognizes the strategy
/// wins. An updater compares the current sampler against what the strategy
/// asks for and does nothing when they are equal; otherwise it prefers
/// mutating the current sampler in place when the strategy matches its kind,
/// so state like accumulated rate-limiter credits and the per-operation table
/// survives a refresh.
pub trait SamplerUpdater: fmt::Debug + Send + Sync {
    /// Applies the strategy if this updater recognizes it.
    ///
    /// `Ok(true)` means the strategy was handled; `Ok(false)` passes it to
    /// the next updater. `Err` also ends the chain: a best-effort replacement
    /// may already be installed, the error only carries the diagnostic.
    fn update(
        &self,
        current: &mut ActiveSampler,
        strategy: &Strategy,
    ) -> Result<bool, SamplerError>;
}

/// Handles [`Strategy::PerOperation`].
#[derive(Debug)]
pub struct PerOperationSamplerUpdater {
    max_operations: usize,
    late_binding: bool,
    clock: Arc<dyn Clock>,
}

impl PerOperationSamplerUpdater {
    /// Creates an updater building per-operation tables bounded by
    /// `max_operations`.
    pub fn new(max_operations: usize, late_binding: bool, clock: Arc<dyn Clock>) -> Self {
        PerOperationSamplerUpdater {
            max_operations,
            late_binding,
            clock,
        }
    }
}

impl SamplerUpdater for PerOperationSamplerUpdater {
    fn update(
        &self,
        current: &mut ActiveSampler,
        strategy: &Strategy,
    ) -> Result<bool, SamplerError> {
        let Strategy::PerOperation(per_operation) = strategy else {
            return Ok(false);
        };
        match current {
            ActiveSampler::PerOperation(sampler) => sampler.update(per_operation),
            other => {
                *other = ActiveSampler::PerOperation(PerOperationSampler::new(
                    per_operation,
                    self.max_operations,
                    self.late_binding,
                    self.clock.clone(),
                ))
            }
        }
        Ok(true)
    }
}

/// Handles [`Strategy::Probabilistic`].
#[derive(Debug, Default)]
pub struct ProbabilisticSamplerUpdater;

impl SamplerUpdater for ProbabilisticSamplerUpdater {
    fn update(
        &self,
        current: &mut ActiveSampler,
        strategy: &Strategy,
    ) -> Result<bool, SamplerError> {
        let Strategy::Probabilistic { sampling_rate } = strategy else {
            return Ok(false);
        };
        let clamped = sampling_rate.clamp(0.0, 1.0);
        let candidate = ActiveSampler::Probabilistic(ProbabilisticSampler::new(clamped));
        if !current.equal(&candidate) {
            match current {
                ActiveSampler::Probabilistic(sampler) => sampler.update(clamped),
                other => *other = candidate,
            }
        }
        if *sampling_rate > 1.0 {
            return Err(SamplerError::Validation(format!(
                "sampling rate {sampling_rate} exceeds 1.0, sampling every trace instead"
            )));
        }
        Ok(true)
    }
}

/// Handles [`Strategy::RateLimiting`].
#[derive(Debug)]
pub struct RateLimitingSamplerUpdater {
    clock: Arc<dyn Clock>,
}

impl RateLimitingSamplerUpdater {
    /// Creates an updater building rate limiters on the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        RateLimitingSamplerUpdater { clock }
    }
}

impl SamplerUpdater for RateLimitingSamplerUpdater {
    fn update(
        &self,
        current: &mut ActiveSampler,
        strategy: &Strategy,
    ) -> Result<bool, SamplerError> {
        let Strategy::RateLimiting {
            max_traces_per_second,
        } = strategy
        else {
            return Ok(false);
        };
        if *max_traces_per_second < 0 {
            // the current sampler stays; a negative limit has no meaningful clamp
            return Err(SamplerError::Validation(format!(
                "negative maxTracesPerSecond: {max_traces_per_second}"
            )));
        }
        let rate = *max_traces_per_second as f64;
        let candidate =
            ActiveSampler::RateLimiting(RateLimitingSampler::new(rate, self.clock.clone()));
        if current.equal(&candidate) {
            return Ok(true);
        }
        match current {
            ActiveSampler::RateLimiting(sampler) => sampler.update(rate),
            other => *other = candidate,
        }
        Ok(true)
    }
}

/// The chain installed when the builder is not given a custom one: adaptive
/// strategies first, then the two service-wide kinds.
pub(crate) fn default_updaters(
    max_operations: usize,
    late_binding: bool,
    clock: Arc<dyn Clock>,
) -> Vec<Box<dyn SamplerUpdater>> {
    vec![
        Box::new(PerOperationSamplerUpdater::new(
            max_operations,
            late_binding,
            clock.clone(),
        )),
        Box::new(ProbabilisticSamplerUpdater),
        Box::new(RateLimitingSamplerUpdater::new(clock)),
    ]
}
