//! Sink configuration.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use sluice_config::{ConfigurationError, GenericConfiguration};

use crate::{
    counters::SinkCounters,
    cycle::BatchCycle,
    drain::{BatchDrainer, DrainMode},
    forward::{AcceptPolicy, Forwarder},
    queue::SourceQueue,
    runner::{ExponentialBackoff, SinkRunner},
    sink::IngestionSink,
    transform::TransformerConfiguration,
};

const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(size) => size,
    None => unreachable!(),
};

fn default_sink_name() -> String {
    "sluice".to_string()
}

const fn default_batch_size() -> NonZeroUsize {
    DEFAULT_BATCH_SIZE
}

const fn default_forward_timeout_secs() -> u64 {
    30
}

const fn default_backoff_min_ms() -> u64 {
    100
}

const fn default_backoff_max_ms() -> u64 {
    10_000
}

const fn default_idle_interval_ms() -> u64 {
    250
}

/// Sink configuration.
///
/// Every field has a default, so an empty configuration is valid.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SinkConfiguration {
    /// Name of the sink, used to label metrics and logs.
    ///
    /// Defaults to `sluice`.
    #[serde(default = "default_sink_name")]
    sink_name: String,

    /// Maximum number of records drained per attempt.
    ///
    /// Defaults to 100.
    #[serde(default = "default_batch_size")]
    batch_size: NonZeroUsize,

    /// How a drain reacts to a take that finds no record.
    ///
    /// Defaults to `exhaustive`.
    #[serde(default)]
    drain_mode: DrainMode,

    /// How partial acknowledgements are treated.
    ///
    /// Defaults to `lenient`.
    #[serde(default)]
    accept_policy: AcceptPolicy,

    /// Maximum time to wait for the ingestion sink to acknowledge a batch, in seconds.
    ///
    /// Setting this to zero disables the timeout. Defaults to 30 seconds.
    #[serde(default = "default_forward_timeout_secs")]
    forward_timeout_secs: u64,

    /// Record transformation strategy.
    ///
    /// Defaults to copying headers.
    #[serde(default)]
    transformer: TransformerConfiguration,

    /// Minimum delay after a failed attempt, in milliseconds.
    ///
    /// Defaults to 100 milliseconds.
    #[serde(default = "default_backoff_min_ms")]
    backoff_min_ms: u64,

    /// Maximum delay after consecutive failed attempts, in milliseconds.
    ///
    /// Defaults to 10 seconds.
    #[serde(default = "default_backoff_max_ms")]
    backoff_max_ms: u64,

    /// Delay after an attempt that found the queue empty, in milliseconds.
    ///
    /// Defaults to 250 milliseconds.
    #[serde(default = "default_idle_interval_ms")]
    idle_interval_ms: u64,
}

impl Default for SinkConfiguration {
    fn default() -> Self {
        Self {
            sink_name: default_sink_name(),
            batch_size: default_batch_size(),
            drain_mode: DrainMode::default(),
            accept_policy: AcceptPolicy::default(),
            forward_timeout_secs: default_forward_timeout_secs(),
            transformer: TransformerConfiguration::default(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            idle_interval_ms: default_idle_interval_ms(),
        }
    }
}

impl SinkConfiguration {
    /// Creates a new `SinkConfiguration` from the given configuration.
    ///
    /// # Errors
    ///
    /// If any field is present but invalid, such as a batch size of zero, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, ConfigurationError> {
        config.as_typed()
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Returns the sink name.
    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Returns the batch size.
    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    /// Returns the forward timeout, if enabled.
    pub fn forward_timeout(&self) -> Option<Duration> {
        (self.forward_timeout_secs > 0).then(|| Duration::from_secs(self.forward_timeout_secs))
    }

    /// Builds a batch cycle over the given queue and sink, with fresh counters.
    pub fn build_cycle<Q>(&self, queue: Arc<Q>, sink: Arc<dyn IngestionSink>) -> BatchCycle<Q>
    where
        Q: SourceQueue,
    {
        let drainer = BatchDrainer::new(self.batch_size).with_mode(self.drain_mode);
        let forwarder = Forwarder::new(sink)
            .with_timeout(self.forward_timeout())
            .with_accept_policy(self.accept_policy);
        let counters = Arc::new(SinkCounters::new(self.sink_name.clone()));

        BatchCycle::new(queue, drainer, self.transformer.build(), forwarder, counters)
    }

    /// Builds a runner over the given queue and sink.
    pub fn build_runner<Q>(&self, queue: Arc<Q>, sink: Arc<dyn IngestionSink>) -> SinkRunner<Q>
    where
        Q: SourceQueue,
    {
        let backoff = ExponentialBackoff::with_jitter(
            Duration::from_millis(self.backoff_min_ms),
            Duration::from_millis(self.backoff_max_ms),
            2.0,
        );

        SinkRunner::new(
            self.build_cycle(queue, sink),
            backoff,
            Duration::from_millis(self.idle_interval_ms),
        )
    }
}
