//! Operational counters for a sink instance.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use serde::Serialize;
use sluice_metrics::static_counters;

static_counters!(
    name => SinkTelemetry,
    prefix => sink,
    labels => [sink_name: String],
    counters => [
        event_drain_attempt_total,
        event_drain_success_total,
        batch_complete_total,
        batch_underflow_total,
        batch_empty_total,
        connection_failed_total,
        forward_failed_total,
        connection_created_total,
        connection_closed_total,
    ],
);

/// Cumulative counters for a single sink instance.
///
/// Counters only ever increase, and are only reset by creating a new instance. Every increment is also forwarded to
/// the global `metrics` recorder as a `sink_*` counter labeled with the sink name, so they can be scraped by whatever
/// exporter the host installs. The values themselves stay readable through the accessors here.
#[derive(Debug)]
pub struct SinkCounters {
    name: String,
    drain_attempt: AtomicU64,
    drain_success: AtomicU64,
    batch_complete: AtomicU64,
    batch_underflow: AtomicU64,
    batch_empty: AtomicU64,
    connection_failed: AtomicU64,
    forward_failed: AtomicU64,
    connection_created: AtomicU64,
    connection_closed: AtomicU64,
    telemetry: SinkTelemetry,
}

/// A point-in-time copy of [`SinkCounters`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CountersSnapshot {
    /// Number of take attempts, including those that found no record.
    pub drain_attempt: u64,

    /// Number of records forwarded and committed.
    pub drain_success: u64,

    /// Number of non-empty batches that reached the batch size.
    pub batch_complete: u64,

    /// Number of non-empty batches smaller than the batch size.
    pub batch_underflow: u64,

    /// Number of attempts that drained no records.
    pub batch_empty: u64,

    /// Number of attempts that hit a queue-level fault.
    pub connection_failed: u64,

    /// Number of attempts whose forward call failed.
    pub forward_failed: u64,

    /// Number of times the sink was started.
    pub connection_created: u64,

    /// Number of times the sink was stopped.
    pub connection_closed: u64,
}

impl SinkCounters {
    /// Creates a new set of counters, all starting at zero, for the sink with the given name.
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        let name = name.into();
        Self {
            telemetry: SinkTelemetry::new(name.clone()),
            name,
            drain_attempt: AtomicU64::new(0),
            drain_success: AtomicU64::new(0),
            batch_complete: AtomicU64::new(0),
            batch_underflow: AtomicU64::new(0),
            batch_empty: AtomicU64::new(0),
            connection_failed: AtomicU64::new(0),
            forward_failed: AtomicU64::new(0),
            connection_created: AtomicU64::new(0),
            connection_closed: AtomicU64::new(0),
        }
    }

    /// Returns the name of the sink these counters belong to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of take attempts, including those that found no record.
    pub fn drain_attempt(&self) -> u64 {
        self.drain_attempt.load(Relaxed)
    }

    /// Returns the number of records forwarded and committed.
    pub fn drain_success(&self) -> u64 {
        self.drain_success.load(Relaxed)
    }

    /// Returns the number of non-empty batches that reached the batch size.
    pub fn batch_complete(&self) -> u64 {
        self.batch_complete.load(Relaxed)
    }

    /// Returns the number of non-empty batches smaller than the batch size.
    pub fn batch_underflow(&self) -> u64 {
        self.batch_underflow.load(Relaxed)
    }

    /// Returns the number of attempts that drained no records.
    pub fn batch_empty(&self) -> u64 {
        self.batch_empty.load(Relaxed)
    }

    /// Returns the number of attempts that hit a queue-level fault.
    pub fn connection_failed(&self) -> u64 {
        self.connection_failed.load(Relaxed)
    }

    /// Returns the number of attempts whose forward call failed.
    pub fn forward_failed(&self) -> u64 {
        self.forward_failed.load(Relaxed)
    }

    /// Returns the number of times the sink was started.
    pub fn connection_created(&self) -> u64 {
        self.connection_created.load(Relaxed)
    }

    /// Returns the number of times the sink was stopped.
    pub fn connection_closed(&self) -> u64 {
        self.connection_closed.load(Relaxed)
    }

    /// Returns a point-in-time copy of every counter.
    ///
    /// Fields are read one at a time, so a snapshot taken while an attempt is running may mix values from before and
    /// after an increment.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            drain_attempt: self.drain_attempt(),
            drain_success: self.drain_success(),
            batch_complete: self.batch_complete(),
            batch_underflow: self.batch_underflow(),
            batch_empty: self.batch_empty(),
            connection_failed: self.connection_failed(),
            forward_failed: self.forward_failed(),
            connection_created: self.connection_created(),
            connection_closed: self.connection_closed(),
        }
    }

    pub(crate) fn increment_drain_attempt(&self) {
        self.drain_attempt.fetch_add(1, Relaxed);
        self.telemetry.event_drain_attempt_total().increment(1);
    }

    pub(crate) fn add_drain_success(&self, count: usize) {
        let count = count as u64;
        self.drain_success.fetch_add(count, Relaxed);
        self.telemetry.event_drain_success_total().increment(count);
    }

    pub(crate) fn increment_batch_complete(&self) {
        self.batch_complete.fetch_add(1, Relaxed);
        self.telemetry.batch_complete_total().increment(1);
    }

    pub(crate) fn increment_batch_underflow(&self) {
        self.batch_underflow.fetch_add(1, Relaxed);
        self.telemetry.batch_underflow_total().increment(1);
    }

    pub(crate) fn increment_batch_empty(&self) {
        self.batch_empty.fetch_add(1, Relaxed);
        self.telemetry.batch_empty_total().increment(1);
    }

    pub(crate) fn increment_connection_failed(&self) {
        self.connection_failed.fetch_add(1, Relaxed);
        self.telemetry.connection_failed_total().increment(1);
    }

    pub(crate) fn increment_forward_failed(&self) {
        self.forward_failed.fetch_add(1, Relaxed);
        self.telemetry.forward_failed_total().increment(1);
    }

    pub(crate) fn increment_connection_created(&self) {
        self.connection_created.fetch_add(1, Relaxed);
        self.telemetry.connection_created_total().increment(1);
    }

    pub(crate) fn increment_connection_closed(&self) {
        self.connection_closed.fetch_add(1, Relaxed);
        self.telemetry.connection_closed_total().increment(1);
    }
}
