//! Scheduling and lifecycle for a batch cycle.

use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering::AcqRel},
    time::Duration,
};

use tokio::{pin, select, time::sleep};
use tracing::{debug, error, info};

use crate::{
    counters::SinkCounters,
    cycle::{BatchCycle, FatalError, Status},
    queue::SourceQueue,
};

mod backoff;
pub use self::backoff::ExponentialBackoff;

/// Repeatedly runs a [`BatchCycle`], pacing it according to the status of each attempt.
///
/// After [`Status::Ready`], the next attempt runs right away, unless the attempt found the queue empty, in which case
/// the runner waits for the idle interval first. After [`Status::Backoff`], the runner waits for an exponentially
/// increasing delay, which resets on the next `Ready`.
///
/// Shutdown is only observed between attempts and while waiting: an attempt that has started always runs to
/// completion, so its transaction is always either committed or rolled back.
pub struct SinkRunner<Q: SourceQueue> {
    cycle: BatchCycle<Q>,
    backoff: ExponentialBackoff,
    idle_interval: Duration,
    queue_closed: AtomicBool,
}

impl<Q: SourceQueue> SinkRunner<Q> {
    /// Creates a new `SinkRunner`.
    pub fn new(cycle: BatchCycle<Q>, backoff: ExponentialBackoff, idle_interval: Duration) -> Self {
        Self {
            cycle,
            backoff,
            idle_interval,
            queue_closed: AtomicBool::new(false),
        }
    }

    /// Returns the counters of the underlying cycle.
    pub fn counters(&self) -> &SinkCounters {
        self.cycle.counters()
    }

    /// Starts the sink.
    pub fn start(&self) {
        self.counters().increment_connection_created();
        info!(sink_name = self.counters().name(), "Sink started.");
    }

    /// Runs attempts until `shutdown` resolves or an unrecoverable failure occurs.
    ///
    /// # Errors
    ///
    /// If an attempt fails unrecoverably, the error is returned and no further attempts are made.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), FatalError>
    where
        F: Future<Output = ()>,
    {
        pin!(shutdown);

        let mut consecutive_failures = 0u32;
        loop {
            let empty_before = self.cycle.counters().batch_empty();

            let pause = match self.cycle.process().await {
                Ok(Status::Ready) => {
                    consecutive_failures = 0;
                    (self.cycle.counters().batch_empty() > empty_before).then_some(self.idle_interval)
                }
                Ok(Status::Backoff) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let delay = self.backoff.get_backoff_duration(consecutive_failures);
                    debug!(consecutive_failures, ?delay, "Backing off before next attempt.");
                    Some(delay)
                }
                Err(e) => {
                    error!(sink_name = self.counters().name(), error = %e, "Sink stopped after unrecoverable failure.");
                    return Err(e);
                }
            };

            match pause {
                Some(delay) => select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = sleep(delay) => {}
                },
                None => select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = std::future::ready(()) => {}
                },
            }
        }

        debug!(sink_name = self.counters().name(), "Shutdown requested. Runner stopped.");
        Ok(())
    }

    /// Stops the sink.
    ///
    /// Closes the ingestion sink, waiting for outstanding work to finish, and then closes the source queue. The queue is
    /// closed at most once no matter how many times this is called.
    pub async fn stop(&self) {
        if let Err(e) = self.cycle.forwarder().sink().close().await {
            error!(sink_name = self.counters().name(), error = %e, "Failed to close ingestion sink.");
        }

        if !self.queue_closed.swap(true, AcqRel) {
            self.cycle.queue().close();
        }

        self.counters().increment_connection_closed();
        info!(sink_name = self.counters().name(), "Sink stopped.");
    }
}
