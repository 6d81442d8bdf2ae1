//! `OTEL_TRACES_SAMPLER` environment support.
//!
//! When the environment selects the `jaeger_remote` sampler,
//! `OTEL_TRACES_SAMPLER_ARG` carries its configuration as a comma-separated
//! `key=value` list, e.g.
//! `endpoint=http://localhost:5778,pollingIntervalMs=5000,initialSamplingRate=0.25`.
//!
//! Environment values only fill in options the caller left unset; explicit
//! builder options always win, so an environment cannot silently downgrade an
//! embedded configuration.

use std::env;
use std::time::Duration;

use opentelemetry::otel_warn;

const OTEL_TRACES_SAMPLER: &str = "OTEL_TRACES_SAMPLER";
const OTEL_TRACES_SAMPLER_ARG: &str = "OTEL_TRACES_SAMPLER_ARG";
const SAMPLER_NAME: &str = "jaeger_remote";

#[derive(Debug, Default, PartialEq)]
pub(crate) struct EnvOverrides {
    pub(crate) endpoint: Option<String>,
    pub(crate) polling_interval: Option<Duration>,
    pub(crate) initial_sampling_rate: Option<f64>,
}

pub(crate) fn overrides_from_env() -> EnvOverrides {
    match env::var(OTEL_TRACES_SAMPLER) {
        Ok(value) if value == SAMPLER_NAME => {}
        _ => return EnvOverrides::default(),
    }
    match env::var(OTEL_TRACES_SAMPLER_ARG) {
        Ok(arg) => parse_sampler_arg(&arg),
        Err(_) => EnvOverrides::default(),
    }
}

fn parse_sampler_arg(arg: &str) -> EnvOverrides {
    let mut overrides = EnvOverrides::default();
    for pair in arg.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            otel_warn!(
                name: "JaegerRemoteSampler.InvalidSamplerArgument",
                message = "OTEL_TRACES_SAMPLER_ARG entries must be key=value pairs",
                entry = pair.to_string()
            );
            continue;
        };
        match key.trim() {
            "endpoint" => overrides.endpoint = Some(value.trim().to_string()),
            "pollingIntervalMs" => match value.trim().parse::<u64>() {
                Ok(millis) => overrides.polling_interval = Some(Duration::from_millis(millis)),
                Err(_) => {
                    otel_warn!(
                        name: "JaegerRemoteSampler.InvalidSamplerArgument",
                        message = "pollingIntervalMs must be an integer number of milliseconds, keeping the configured interval",
                        polling_interval_ms = value.to_string()
                    );
                }
            },
            "initialSamplingRate" => match value.trim().parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => {
                    overrides.initial_sampling_rate = Some(rate)
                }
                _ => {
                    otel_warn!(
                        name: "JaegerRemoteSampler.InvalidSamplerArgument",
                        message = "initialSamplingRate must be a float in [0.0, 1.0], keeping the configured sampler",
                        initial_sampling_rate = value.to_string()
                    );
                }
            },
            unknown => {
                otel_warn!(
                    name: "JaegerRemoteSampler.InvalidSamplerArgument",
                    message = "unrecognized OTEL_TRACES_SAMPLER_ARG key",
                    key = unknown.to_string()
                );
            }
        }
    }
    overrides
}
