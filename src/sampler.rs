use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use futures_channel::{mpsc, oneshot};
use futures_util::{stream, Stream, StreamExt as _};
use opentelemetry::trace::{Link, SamplingResult, SpanKind, TraceId};
use opentelemetry::{otel_debug, otel_warn, Context, KeyValue};
use opentelemetry_http::HttpClient;
use opentelemetry_sdk::runtime::Runtime;
use opentelemetry_sdk::trace::ShouldSample;

use crate::clock::{Clock, SystemClock};
use crate::env;
use crate::error::SamplerError;
use crate::fetcher::{HttpStrategyFetcher, StrategyFetcher};
use crate::samplers::{ActiveSampler, ProbabilisticSampler};
use crate::strategy::{JsonStrategyParser, Strategy, StrategyParser};
use crate::updaters::{default_updaters, SamplerUpdater};

const DEFAULT_SAMPLING_SERVER_URL: &str = "http://localhost:5778";
const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_INITIAL_SAMPLING_RATE: f64 = 0.001;
const DEFAULT_MAX_OPERATIONS: usize = 2000;
/// Ticks are spread by up to this fraction of the polling interval in either
/// direction so a fleet of samplers does not synchronize against the
/// configuration service.
const POLLING_JITTER: f64 = 0.1;

/// Builder for [`JaegerRemoteSampler`].
///
/// Obtained from [`JaegerRemoteSampler::builder`]; see there for an example.
#[derive(Debug)]
pub struct JaegerRemoteSamplerBuilder<C, R>
where
    C: HttpClient + 'static,
    R: Runtime,
{
    runtime: R,
    client: C,
    service_name: String,
    endpoint: Option<String>,
    polling_interval: Option<Duration>,
    initial_sampler: Option<Box<dyn ShouldSample>>,
    max_operations: Option<usize>,
    operation_name_late_binding: Option<bool>,
    fetcher: Option<Box<dyn StrategyFetcher>>,
    parser: Option<Box<dyn StrategyParser>>,
    updaters: Option<Vec<Box<dyn SamplerUpdater>>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<C, R> JaegerRemoteSamplerBuilder<C, R>
where
    C: HttpClient + 'static,
    R: Runtime,
{
    fn new<Svc>(runtime: R, client: C, service_name: Svc) -> Self
    where
        Svc: Into<String>,
    {
        JaegerRemoteSamplerBuilder {
            runtime,
            client,
            service_name: service_name.into(),
            endpoint: None,
            polling_interval: None,
            initial_sampler: None,
            max_operations: None,
            operation_name_late_binding: None,
            fetcher: None,
            parser: None,
            updaters: None,
            clock: None,
        }
    }

    /// The URL of the sampling server, `http://localhost:5778` by default.
    ///
    /// The service name is appended as a `service` query parameter.
    pub fn with_endpoint<Str: Into<String>>(mut self, endpoint: Str) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// How often the strategy is re-fetched, every 60 seconds by default.
    ///
    /// A small jitter is applied to every tick. Short intervals put load on
    /// the sampling server and should be avoided.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    /// The sampler serving decisions until the first successful update.
    ///
    /// Defaults to probabilistic sampling at a rate of 0.001.
    pub fn with_initial_sampler<S: ShouldSample + 'static>(mut self, sampler: S) -> Self {
        self.initial_sampler = Some(Box::new(sampler));
        self
    }

    /// Bound on the per-operation table, 2000 by default.
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = Some(max_operations);
        self
    }

    /// Attribute decisions for not-yet-seen operations to the service-wide
    /// policy instead of the operation's own entry. Off by default.
    pub fn with_operation_name_late_binding(mut self, late_binding: bool) -> Self {
        self.operation_name_late_binding = Some(late_binding);
        self
    }

    /// Replaces the HTTP fetcher, e.g. with a file-backed one or one adding
    /// authentication headers. The HTTP client passed to the builder is then
    /// unused.
    pub fn with_fetcher(mut self, fetcher: Box<dyn StrategyFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replaces the JSON strategy parser.
    pub fn with_parser(mut self, parser: Box<dyn StrategyParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Replaces the updater chain applied to parsed strategies.
    pub fn with_updaters(mut self, updaters: Vec<Box<dyn SamplerUpdater>>) -> Self {
        self.updaters = Some(updaters);
        self
    }

    /// Replaces the clock driving the rate limiters. Intended for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the sampler and starts its poller on the runtime.
    ///
    /// Environment variables fill in options not set explicitly: when
    /// `OTEL_TRACES_SAMPLER=jaeger_remote`, the `endpoint`,
    /// `pollingIntervalMs` and `initialSamplingRate` keys of
    /// `OTEL_TRACES_SAMPLER_ARG` are honored. Options passed to the builder
    /// always win.
    ///
    /// Returns an error for an empty service name, an unparsable endpoint or
    /// a zero polling interval.
    pub fn build(self) -> Result<JaegerRemoteSampler, SamplerError> {
        if self.service_name.is_empty() {
            return Err(SamplerError::InvalidConfig(
                "service name cannot be empty".to_string(),
            ));
        }

        let overrides = env::overrides_from_env();
        let endpoint = self
            .endpoint
            .or(overrides.endpoint)
            .unwrap_or_else(|| DEFAULT_SAMPLING_SERVER_URL.to_string());
        let polling_interval = self
            .polling_interval
            .or(overrides.polling_interval)
            .unwrap_or(DEFAULT_POLLING_INTERVAL);
        if polling_interval.is_zero() {
            return Err(SamplerError::InvalidConfig(
                "polling interval must be positive".to_string(),
            ));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let max_operations = self.max_operations.unwrap_or(DEFAULT_MAX_OPERATIONS);
        let late_binding = self.operation_name_late_binding.unwrap_or(false);

        let initial = match self.initial_sampler {
            Some(sampler) => ActiveSampler::Delegate(sampler),
            None => ActiveSampler::Probabilistic(ProbabilisticSampler::new(
                overrides
                    .initial_sampling_rate
                    .unwrap_or(DEFAULT_INITIAL_SAMPLING_RATE),
            )),
        };

        let fetcher: Box<dyn StrategyFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpStrategyFetcher::new(self.client, &endpoint)?),
        };
        let parser = self
            .parser
            .unwrap_or_else(|| Box::new(JsonStrategyParser) as Box<dyn StrategyParser>);
        let updaters = self
            .updaters
            .unwrap_or_else(|| default_updaters(max_operations, late_binding, clock));

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let core = Arc::new(SamplerCore {
            service_name: self.service_name,
            fetcher,
            parser,
            updaters,
            current: RwLock::new(initial),
            last_strategy: Mutex::new(None),
            closed: AtomicBool::new(false),
            shutdown_tx,
            done_rx: Mutex::new(Some(done_rx)),
        });

        run_update_task(
            self.runtime,
            Arc::downgrade(&core),
            polling_interval,
            shutdown_rx,
            done_tx,
        );

        Ok(JaegerRemoteSampler { core })
    }
}

/// Sampler controlled by a remote sampling service.
///
/// Decisions are delegated to whichever sampler the most recently fetched
/// strategy installed: probabilistic, rate limiting, or per operation. A
/// background task re-fetches the strategy at a fixed, slightly jittered
/// interval; every fetch, parse or validation failure is logged and leaves
/// the current sampler untouched, so sampling decisions never fail.
///
/// The backend does not need to be jaeger; anything speaking the jaeger
/// remote sampling protocol works, including the OpenTelemetry collector.
///
/// Cloning is cheap and all clones share the same sampler state.
#[derive(Clone, Debug)]
pub struct JaegerRemoteSampler {
    core: Arc<SamplerCore>,
}

impl JaegerRemoteSampler {
    /// Creates a builder.
    ///
    /// * `runtime` - the async runtime to poll on.
    /// * `http_client` - the client used to query the sampling server; its
    ///   timeout bounds how long one poll can take, so configure one.
    /// * `service_name` - the service whose strategy is requested.
    ///
    /// ```no_run
    /// use opentelemetry_jaeger_remote::JaegerRemoteSampler;
    /// use opentelemetry_sdk::runtime;
    /// use std::time::Duration;
    ///
    /// # #[cfg(feature = "reqwest-client")]
    /// # fn build() {
    /// let client = reqwest::Client::builder()
    ///     .timeout(Duration::from_secs(10))
    ///     .build()
    ///     .expect("reqwest client");
    /// let sampler = JaegerRemoteSampler::builder(runtime::Tokio, client, "my-service")
    ///     .with_endpoint("http://localhost:5778")
    ///     .build()
    ///     .expect("sampler configuration is valid");
    /// # }
    /// ```
    pub fn builder<C, R, Svc>(
        runtime: R,
        http_client: C,
        service_name: Svc,
    ) -> JaegerRemoteSamplerBuilder<C, R>
    where
        C: HttpClient + 'static,
        R: Runtime,
        Svc: Into<String>,
    {
        JaegerRemoteSamplerBuilder::new(runtime, http_client, service_name)
    }

    /// Describes the currently installed sampler.
    pub fn description(&self) -> String {
        let current = self
            .core
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        format!("RemotelyControlledSampler{{{}}}", current.description())
    }

    /// Stops polling and waits for the poller to finish. Idempotent.
    ///
    /// The sampler keeps serving decisions with the last installed strategy.
    /// An in-flight request completes or times out and its result is
    /// discarded, so the wait is bounded by the HTTP client's timeout. Call
    /// from outside the runtime, or from a multi-threaded one; like the batch
    /// processors, shutdown blocks the calling thread.
    pub fn shutdown(&self) {
        if self
            .core
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let _ = self.core.shutdown_tx.clone().try_send(());
        let done_rx = self
            .core
            .done_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(done) = done_rx {
            let _ = futures_executor::block_on(done);
        }
    }
}

impl ShouldSample for JaegerRemoteSampler {
    fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
        name: &str,
        span_kind: &SpanKind,
        attributes: &[KeyValue],
        links: &[Link],
    ) -> SamplingResult {
        self.core
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .should_sample(parent_context, trace_id, name, span_kind, attributes, links)
    }
}

#[derive(Debug)]
struct SamplerCore {
    service_name: String,
    fetcher: Box<dyn StrategyFetcher>,
    parser: Box<dyn StrategyParser>,
    updaters: Vec<Box<dyn SamplerUpdater>>,
    current: RwLock<ActiveSampler>,
    last_strategy: Mutex<Option<Strategy>>,
    closed: AtomicBool,
    shutdown_tx: mpsc::Sender<()>,
    done_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl SamplerCore {
    async fn update_once(&self) {
        let body = match self.fetcher.fetch(&self.service_name).await {
            Ok(body) => body,
            Err(err) => {
                otel_warn!(
                    name: "JaegerRemoteSampler.FetchFailed",
                    message = "failed to fetch the sampling strategy, keeping the current sampler",
                    reason = format!("{err}")
                );
                return;
            }
        };

        let strategy = match self.parser.parse(&body) {
            Ok(strategy) => strategy,
            Err(err) => {
                otel_warn!(
                    name: "JaegerRemoteSampler.InvalidStrategy",
                    message = "failed to parse the sampling strategy, keeping the current sampler",
                    reason = format!("{err}")
                );
                return;
            }
        };

        if self
            .last_strategy
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            == Some(&strategy)
        {
            otel_debug!(
                name: "JaegerRemoteSampler.StrategyUnchanged",
                message = "strategy matches the last installed one, keeping the current sampler"
            );
            return;
        }

        let mut handled = false;
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for updater in &self.updaters {
                match updater.update(&mut current, &strategy) {
                    Ok(false) => continue,
                    Ok(true) => {
                        handled = true;
                        break;
                    }
                    Err(err) => {
                        // the updater may still have installed a replacement
                        otel_warn!(
                            name: "JaegerRemoteSampler.UpdateFailed",
                            message = "sampling strategy was invalid",
                            reason = format!("{err}")
                        );
                        handled = true;
                        break;
                    }
                }
            }
        }

        if handled {
            *self
                .last_strategy
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(strategy);
        } else {
            otel_warn!(
                name: "JaegerRemoteSampler.UnsupportedStrategy",
                message = "no updater in the chain recognized the strategy, keeping the current sampler",
                strategy = format!("{strategy:?}")
            );
        }
    }
}

impl Drop for SamplerCore {
    fn drop(&mut self) {
        // the poller only holds a weak handle; nudge it so it exits now
        // instead of at the next tick
        let _ = self.shutdown_tx.clone().try_send(());
    }
}

fn run_update_task<R: Runtime>(
    runtime: R,
    core: Weak<SamplerCore>,
    polling_interval: Duration,
    shutdown: mpsc::Receiver<()>,
    done: oneshot::Sender<()>,
) {
    let ticks = jittered_ticks(runtime.clone(), polling_interval);
    runtime.spawn(async move {
        if let Some(core) = core.upgrade() {
            core.update_once().await;
        }
        // wake on whichever comes first, a tick or a shutdown signal
        let mut signal = Box::pin(stream::select(
            shutdown.map(|_| false),
            ticks.map(|_| true),
        ));
        while let Some(tick) = signal.next().await {
            if !tick {
                break;
            }
            match core.upgrade() {
                Some(core) => core.update_once().await,
                None => break,
            }
        }
        let _ = done.send(());
    });
}

fn jittered_ticks<R: Runtime>(runtime: R, polling_interval: Duration) -> impl Stream<Item = ()> {
    stream::unfold((), move |_| {
        let runtime = runtime.clone();
        async move {
            runtime.delay(jittered(polling_interval)).await;
            Some(((), ()))
        }
    })
}

fn jittered(polling_interval: Duration) -> Duration {
    let spread = 1.0 - POLLING_JITTER + rand::random::<f64>() * 2.0 * POLLING_JITTER;
    polling_interval.mul_f64(spread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::samplers::{SAMPLER_KIND, SAMPLER_PARAM};
    use async_trait::async_trait;
    use bytes::Bytes;
    use opentelemetry::trace::SamplingDecision;
    use opentelemetry_sdk::runtime;
    use opentelemetry_sdk::trace::Sampler;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(10);
    const PATIENCE: Duration = Duration::from_secs(5);

    /// Fetcher that pops scripted responses and then repeats the last one.
    /// `Err` entries become transport errors.
    #[derive(Debug)]
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<&'static str, &'static str>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedFetcher {
        fn new(
            responses: Vec<Result<&'static str, &'static str>>,
        ) -> (Box<dyn StrategyFetcher>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(ScriptedFetcher {
                    responses: Mutex::new(responses.into_iter().collect()),
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl StrategyFetcher for ScriptedFetcher {
        async fn fetch(&self, _service_name: &str) -> Result<Bytes, SamplerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let response = if responses.len() > 1 {
                responses.pop_front().expect("non-empty")
            } else {
                *responses
                    .front()
                    .expect("scripted fetcher needs at least one response")
            };
            response
                .map(|body| Bytes::from_static(body.as_bytes()))
                .map_err(|message| SamplerError::Transport(message.to_string()))
        }
    }

    fn noop_client() -> impl HttpClient {
        #[derive(Debug)]
        struct NoopClient;

        #[async_trait]
        impl HttpClient for NoopClient {
            async fn send_bytes(
                &self,
                _request: http::Request<Bytes>,
            ) -> Result<http::Response<Bytes>, opentelemetry_http::HttpError> {
                Err("no server in tests".into())
            }
        }

        NoopClient
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + PATIENCE;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(TICK).await;
        }
        false
    }

    fn decide(sampler: &JaegerRemoteSampler, trace_id: u128, name: &str) -> SamplingResult {
        sampler.should_sample(
            None,
            TraceId::from(trace_id),
            name,
            &SpanKind::Internal,
            &[],
            &[],
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn initial_sampler_serves_while_fetches_fail() {
        let (fetcher, calls) = ScriptedFetcher::new(vec![Err("429 slow down")]);
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_initial_sampler(Sampler::AlwaysOn)
            .with_fetcher(fetcher)
            .build()
            .unwrap();

        assert!(wait_until(|| calls.load(Ordering::SeqCst) >= 3).await);
        assert_eq!(
            decide(&sampler, 1, "op").decision,
            SamplingDecision::RecordAndSample
        );
        assert_eq!(sampler.description(), "RemotelyControlledSampler{AlwaysOn}");
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_successful_fetch_swaps_the_sampler() {
        let (fetcher, _calls) = ScriptedFetcher::new(vec![Ok(
            r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":1.0}}"#,
        )]);
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_initial_sampler(Sampler::AlwaysOff)
            .with_fetcher(fetcher)
            .build()
            .unwrap();

        assert!(
            wait_until(|| {
                decide(&sampler, 1, "op").decision == SamplingDecision::RecordAndSample
            })
            .await
        );
        let result = decide(&sampler, 1, "op");
        assert!(result
            .attributes
            .contains(&KeyValue::new(SAMPLER_KIND, "probabilistic")));
        assert!(result.attributes.contains(&KeyValue::new(SAMPLER_PARAM, 1.0)));
        assert_eq!(
            sampler.description(),
            "RemotelyControlledSampler{ProbabilisticSampler{samplingRate=1}}"
        );
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rate_limiting_strategy_admits_a_burst() {
        let (fetcher, _calls) = ScriptedFetcher::new(vec![Ok(
            r#"{"strategyType":1,"rateLimitingSampling":{"maxTracesPerSecond":2}}"#,
        )]);
        let clock = Arc::new(ManualClock::new());
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_initial_sampler(Sampler::AlwaysOff)
            .with_fetcher(fetcher)
            .with_clock(clock)
            .build()
            .unwrap();

        assert!(
            wait_until(|| {
                sampler.description()
                    == "RemotelyControlledSampler{RateLimitingSampler{maxTracesPerSecond=2}}"
            })
            .await
        );
        let decisions: Vec<_> = (0..3)
            .map(|_| decide(&sampler, 1, "op").decision)
            .collect();
        assert_eq!(
            decisions,
            vec![
                SamplingDecision::RecordAndSample,
                SamplingDecision::RecordAndSample,
                SamplingDecision::Drop,
            ]
        );
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn per_operation_strategy_guarantees_a_floor() {
        let (fetcher, _calls) = ScriptedFetcher::new(vec![Ok(
            r#"{"operationSampling":{
                "defaultSamplingProbability":0.0,
                "defaultLowerBoundTracesPerSecond":1,
                "perOperationStrategies":[
                    {"operation":"A","probabilisticSampling":{"samplingRate":1.0}}
                ]}}"#,
        )]);
        let clock = Arc::new(ManualClock::new());
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_initial_sampler(Sampler::AlwaysOff)
            .with_fetcher(fetcher)
            .with_clock(clock.clone())
            .build()
            .unwrap();

        assert!(
            wait_until(|| {
                decide(&sampler, u128::MAX, "A").decision == SamplingDecision::RecordAndSample
            })
            .await
        );

        // unknown operation: admitted once by the lower bound, then dropped
        // until a second elapses
        assert_eq!(
            decide(&sampler, u128::MAX, "B").decision,
            SamplingDecision::RecordAndSample
        );
        assert_eq!(
            decide(&sampler, u128::MAX, "B").decision,
            SamplingDecision::Drop
        );
        clock.advance(Duration::from_secs(1));
        assert_eq!(
            decide(&sampler, u128::MAX, "B").decision,
            SamplingDecision::RecordAndSample
        );
        assert_eq!(
            decide(&sampler, u128::MAX, "B").decision,
            SamplingDecision::Drop
        );
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unchanged_strategy_skips_the_updater_chain() {
        #[derive(Debug)]
        struct CountingUpdater {
            applied: Arc<AtomicUsize>,
        }

        impl SamplerUpdater for CountingUpdater {
            fn update(
                &self,
                current: &mut ActiveSampler,
                strategy: &Strategy,
            ) -> Result<bool, SamplerError> {
                self.applied.fetch_add(1, Ordering::SeqCst);
                crate::updaters::ProbabilisticSamplerUpdater.update(current, strategy)
            }
        }

        let (fetcher, calls) = ScriptedFetcher::new(vec![Ok(
            r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":0.5}}"#,
        )]);
        let applied = Arc::new(AtomicUsize::new(0));
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_fetcher(fetcher)
            .with_updaters(vec![Box::new(CountingUpdater {
                applied: applied.clone(),
            })])
            .build()
            .unwrap();

        // several identical responses arrive, only the first is applied
        assert!(wait_until(|| calls.load(Ordering::SeqCst) >= 4).await);
        assert_eq!(applied.load(Ordering::SeqCst), 1);
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recovers_after_transient_failure() {
        let (fetcher, _calls) = ScriptedFetcher::new(vec![
            Ok(r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":0.5}}"#),
            Err("429 slow down"),
            Ok(r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":0.1}}"#),
        ]);
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_fetcher(fetcher)
            .build()
            .unwrap();

        assert!(
            wait_until(|| {
                sampler.description()
                    == "RemotelyControlledSampler{ProbabilisticSampler{samplingRate=0.1}}"
            })
            .await
        );
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_fetch_keeps_the_installed_strategy() {
        let (fetcher, calls) = ScriptedFetcher::new(vec![
            Ok(r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":0.5}}"#),
            Err("connection refused"),
        ]);
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_fetcher(fetcher)
            .build()
            .unwrap();

        assert!(
            wait_until(|| {
                sampler.description()
                    == "RemotelyControlledSampler{ProbabilisticSampler{samplingRate=0.5}}"
            })
            .await
        );
        let before = calls.load(Ordering::SeqCst);
        assert!(wait_until(|| calls.load(Ordering::SeqCst) >= before + 3).await);
        assert_eq!(
            sampler.description(),
            "RemotelyControlledSampler{ProbabilisticSampler{samplingRate=0.5}}"
        );
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_stops_polling_and_is_idempotent() {
        let (fetcher, calls) = ScriptedFetcher::new(vec![Ok(
            r#"{"strategyType":0,"probabilisticSampling":{"samplingRate":0.5}}"#,
        )]);
        let sampler = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(TICK)
            .with_fetcher(fetcher)
            .build()
            .unwrap();

        assert!(wait_until(|| calls.load(Ordering::SeqCst) >= 1).await);
        sampler.shutdown();
        sampler.shutdown();

        let after_close = calls.load(Ordering::SeqCst);
        tokio::time::sleep(TICK * 10).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_close);

        // decisions are still served from the installed strategy
        assert_eq!(
            sampler.description(),
            "RemotelyControlledSampler{ProbabilisticSampler{samplingRate=0.5}}"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_service_name_is_rejected() {
        let err = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "")
            .build()
            .unwrap_err();
        assert!(matches!(err, SamplerError::InvalidConfig(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_polling_interval_is_rejected() {
        let err = JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
            .with_polling_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, SamplerError::InvalidConfig(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn environment_sets_the_initial_sampling_rate() {
        let (fetcher, _calls) = ScriptedFetcher::new(vec![Err("no server")]);
        let sampler = temp_env::with_vars(
            [
                ("OTEL_TRACES_SAMPLER", Some("jaeger_remote")),
                ("OTEL_TRACES_SAMPLER_ARG", Some("initialSamplingRate=0.25")),
            ],
            || {
                JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
                    .with_polling_interval(TICK)
                    .with_fetcher(fetcher)
                    .build()
                    .unwrap()
            },
        );
        assert_eq!(
            sampler.description(),
            "RemotelyControlledSampler{ProbabilisticSampler{samplingRate=0.25}}"
        );
        sampler.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn caller_options_beat_environment_overrides() {
        let (fetcher, _calls) = ScriptedFetcher::new(vec![Err("no server")]);
        let sampler = temp_env::with_vars(
            [
                ("OTEL_TRACES_SAMPLER", Some("jaeger_remote")),
                ("OTEL_TRACES_SAMPLER_ARG", Some("initialSamplingRate=0.25")),
            ],
            || {
                JaegerRemoteSampler::builder(runtime::Tokio, noop_client(), "svc")
                    .with_polling_interval(TICK)
                    .with_initial_sampler(Sampler::AlwaysOn)
                    .with_fetcher(fetcher)
                    .build()
                    .unwrap()
            },
        );
        assert_eq!(sampler.description(), "RemotelyControlledSampler{AlwaysOn}");
        sampler.shutdown();
    }
}
