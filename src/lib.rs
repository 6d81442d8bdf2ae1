//! # OpenTelemetry Jaeger Remote Sampler
//!
//! Samples traces according to a strategy fetched periodically from a remote
//! configuration service speaking the [jaeger remote sampling protocol], such
//! as a jaeger agent/collector or the OpenTelemetry collector. Sampling is
//! typically tuned centrally on the collector while SDKs poll for changes, so
//! a fleet can be re-configured without redeploying it.
//!
//! The remote service can install one of three strategies:
//!
//! - **Probabilistic** - admit a fixed fraction of traces, decided by the
//!   trace id. `0.0` never samples, `1.0` always samples.
//! - **Rate limiting** - admit a fixed number of traces per second, enforced
//!   by a token bucket that allows short bursts.
//! - **Per operation** - admit per span name, with a probabilistic rate per
//!   operation, a service-wide default, and a rate-limited lower bound that
//!   guarantees rarely-taken endpoints still show up in traces.
//!
//! ## Quickstart
//!
//! With a sampling server listening on the default `http://localhost:5778`:
//!
//! ```no_run
//! use opentelemetry_jaeger_remote::JaegerRemoteSampler;
//! use opentelemetry_sdk::{runtime, trace::SdkTracerProvider};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = reqwest::Client::builder()
//!         .timeout(Duration::from_secs(10))
//!         .build()
//!         .expect("reqwest client");
//!
//!     let sampler = JaegerRemoteSampler::builder(runtime::Tokio, client, "my-service")
//!         .with_polling_interval(Duration::from_secs(60))
//!         .build()
//!         .expect("sampler configuration is valid");
//!
//!     let provider = SdkTracerProvider::builder()
//!         .with_sampler(sampler)
//!         .build();
//!     // install the provider and trace as usual
//!     # drop(provider);
//! }
//! ```
//!
//! Until the first successful fetch, decisions come from the initial sampler
//! (probabilistic at 0.001 unless configured otherwise). Fetch and parse
//! failures are reported through the SDK's internal logs and never affect
//! decisions.
//!
//! ## Environment configuration
//!
//! Setting `OTEL_TRACES_SAMPLER=jaeger_remote` lets the environment fill in
//! options the code did not set, via `OTEL_TRACES_SAMPLER_ARG`, e.g.
//! `endpoint=http://localhost:5778,pollingIntervalMs=5000,initialSamplingRate=0.25`.
//! Options passed to the builder always take precedence.
//!
//! ## Choosing an HTTP client
//!
//! Strategies are fetched with an [`HttpClient`] implementation of your
//! choice; the `reqwest-client` feature (on by default) enables the
//! implementation for `reqwest::Client`. Give the client a request timeout:
//! it bounds both a stuck poll and the worst-case [`shutdown`] latency.
//!
//! [jaeger remote sampling protocol]: https://www.jaegertracing.io/docs/latest/apis/#remote-sampling-configuration
//! [`HttpClient`]: opentelemetry_http::HttpClient
//! [`shutdown`]: JaegerRemoteSampler::shutdown
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]

mod clock;
mod env;
mod error;
mod fetcher;
mod sampler;
pub mod samplers;
mod strategy;
mod updaters;

pub use clock::{Clock, SystemClock};
pub use error::SamplerError;
pub use fetcher::{HttpStrategyFetcher, StrategyFetcher};
pub use sampler::{JaegerRemoteSampler, JaegerRemoteSamplerBuilder};
pub use strategy::{
    JsonStrategyParser, OperationSamplingStrategy, OperationStrategy,
    PerOperationSamplingStrategies, PerOperationStrategy, ProbabilisticSamplingStrategy,
    RateLimitingSamplingStrategy, SamplingStrategyResponse, SamplingStrategyType, Strategy,
    StrategyParser,
};
pub use updaters::{
    PerOperationSamplerUpdater, ProbabilisticSamplerUpdater, RateLimitingSamplerUpdater,
    SamplerUpdater,
};
