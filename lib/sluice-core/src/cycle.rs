//! The drain, transform, forward, and commit cycle.

use std::sync::Arc;

use snafu::Snafu;
use tracing::{debug, error, trace, warn};

use crate::{
    counters::SinkCounters,
    drain::BatchDrainer,
    forward::{ForwardError, Forwarder},
    queue::{QueueError, QueueTransaction, SourceQueue},
    record::Document,
    transform::RecordTransformer,
};

/// Outcome of a single cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// The cycle committed its transaction, whether or not it forwarded anything. The cycle can run again right away.
    Ready,

    /// The cycle rolled back after a recoverable failure. The next cycle should be delayed.
    Backoff,
}

/// A failure that a sink cannot recover from by retrying.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum FatalError {
    /// The source queue failed unrecoverably.
    #[snafu(display("Source queue failed unrecoverably: {}", source))]
    Queue {
        /// Error source.
        source: QueueError,
    },

    /// The ingestion sink failed unrecoverably.
    #[snafu(display("Ingestion sink failed unrecoverably: {}", source))]
    Sink {
        /// Error source.
        source: ForwardError,
    },
}

/// A failure within a single cycle.
///
/// Only [`CycleError::Fatal`] escapes [`BatchCycle::process`]. The other variants are absorbed into
/// [`Status::Backoff`].
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum CycleError {
    /// The source queue failed transiently while opening, draining, or committing the transaction.
    #[snafu(display("Channel fault: {}", source))]
    Channel {
        /// Error source.
        source: QueueError,
    },

    /// Forwarding the batch failed transiently.
    #[snafu(display("Forward fault: {}", source))]
    Forward {
        /// Error source.
        source: ForwardError,
    },

    /// An unrecoverable failure.
    #[snafu(display("Fatal fault: {}", source))]
    Fatal {
        /// Error source.
        source: FatalError,
    },
}

impl From<QueueError> for CycleError {
    fn from(source: QueueError) -> Self {
        if source.is_unrecoverable() {
            Self::Fatal {
                source: FatalError::Queue { source },
            }
        } else {
            Self::Channel { source }
        }
    }
}

impl From<ForwardError> for CycleError {
    fn from(source: ForwardError) -> Self {
        if source.is_unrecoverable() {
            Self::Fatal {
                source: FatalError::Sink { source },
            }
        } else {
            Self::Forward { source }
        }
    }
}

/// Owns a transaction for the length of a cycle.
///
/// The transaction is closed exactly once: either explicitly, or when the guard is dropped. A guard dropped before its
/// transaction was committed or rolled back (the cycle was cancelled while forwarding, or panicked) rolls the
/// transaction back first.
struct TransactionGuard<T: QueueTransaction> {
    transaction: T,
    finished: bool,
    closed: bool,
}

impl<T: QueueTransaction> TransactionGuard<T> {
    fn new(transaction: T) -> Self {
        Self {
            transaction,
            finished: false,
            closed: false,
        }
    }

    fn transaction(&mut self) -> &mut T {
        &mut self.transaction
    }

    fn commit(&mut self) -> Result<(), QueueError> {
        self.transaction.commit()?;
        self.finished = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), QueueError> {
        if self.finished {
            return Ok(());
        }

        self.finished = true;
        self.transaction.rollback()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transaction.close();
        }
    }
}

impl<T: QueueTransaction> Drop for TransactionGuard<T> {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            warn!(error = %e, "Failed to roll back abandoned transaction.");
        }
        self.close();
    }
}

/// Runs one drain, transform, forward, and commit attempt at a time against a source queue.
pub struct BatchCycle<Q: SourceQueue> {
    queue: Arc<Q>,
    drainer: BatchDrainer,
    transformer: Arc<dyn RecordTransformer>,
    forwarder: Forwarder,
    counters: Arc<SinkCounters>,
}

impl<Q: SourceQueue> BatchCycle<Q> {
    /// Creates a new `BatchCycle`.
    pub fn new(
        queue: Arc<Q>, drainer: BatchDrainer, transformer: Arc<dyn RecordTransformer>, forwarder: Forwarder,
        counters: Arc<SinkCounters>,
    ) -> Self {
        Self {
            queue,
            drainer,
            transformer,
            forwarder,
            counters,
        }
    }

    /// Returns the source queue.
    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Returns the forwarder.
    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Returns the counters updated by this cycle.
    pub fn counters(&self) -> &Arc<SinkCounters> {
        &self.counters
    }

    /// Runs a single attempt.
    ///
    /// Opens a transaction, drains a batch from it, and, if the batch is not empty, transforms and forwards it. The
    /// transaction is committed if the batch was empty or forwarding succeeded, and rolled back otherwise. Either way,
    /// the transaction is closed before this method returns.
    ///
    /// Returns [`Status::Ready`] when the transaction was committed, and [`Status::Backoff`] after a recoverable
    /// failure.
    ///
    /// # Errors
    ///
    /// If the queue or the sink fails unrecoverably, the transaction is rolled back and closed, and an error is
    /// returned.
    pub async fn process(&mut self) -> Result<Status, FatalError> {
        let transaction = match self.queue.begin_transaction() {
            Ok(transaction) => transaction,
            Err(e) => return self.handle_failure(e.into()),
        };

        let mut guard = TransactionGuard::new(transaction);
        let result = match self.attempt(&mut guard).await {
            Ok(()) => Ok(()),
            Err(e) => match guard.rollback() {
                Ok(()) => Err(e),
                Err(rollback_error) => {
                    warn!(error = %rollback_error, "Failed to roll back transaction.");
                    match CycleError::from(rollback_error) {
                        fatal @ CycleError::Fatal { .. } => Err(fatal),
                        _ => Err(e),
                    }
                }
            },
        };
        guard.close();
        drop(guard);

        match result {
            Ok(()) => Ok(Status::Ready),
            Err(e) => self.handle_failure(e),
        }
    }

    async fn attempt(&self, guard: &mut TransactionGuard<Q::Transaction>) -> Result<(), CycleError> {
        let batch = self.drainer.drain(guard.transaction(), &self.counters)?;

        if batch.is_empty() {
            self.counters.increment_batch_empty();
            guard.commit()?;
            trace!("Committed empty batch.");
            return Ok(());
        }

        let batch_len = batch.len();
        let documents = batch
            .records()
            .iter()
            .map(|record| self.transformer.transform(record))
            .collect::<Vec<Document>>();
        drop(batch);

        self.forwarder.forward(documents).await?;
        self.counters.add_drain_success(batch_len);

        guard.commit()?;
        debug!(batch_len, "Committed forwarded batch.");
        Ok(())
    }

    fn handle_failure(&self, error: CycleError) -> Result<Status, FatalError> {
        match error {
            CycleError::Channel { source } => {
                self.counters.increment_connection_failed();
                warn!(sink_name = self.counters.name(), error = %source, "Source queue fault. Rolled back batch.");
                Ok(Status::Backoff)
            }
            CycleError::Forward { source } => {
                self.counters.increment_forward_failed();
                warn!(sink_name = self.counters.name(), error = %source, "Failed to forward batch. Rolled back batch.");
                Ok(Status::Backoff)
            }
            CycleError::Fatal { source } => {
                match &source {
                    FatalError::Queue { .. } => self.counters.increment_connection_failed(),
                    FatalError::Sink { .. } => self.counters.increment_forward_failed(),
                }
                error!(sink_name = self.counters.name(), error = %source, "Unrecoverable failure. Rolled back batch.");
                Err(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        num::NonZeroUsize,
        sync::{
            atomic::{AtomicUsize, Ordering::SeqCst},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use sluice_error::generic_error;

    use super::*;
    use crate::{
        record::Record,
        sink::{IngestionSink, SinkError},
        transform::HeadersTransformer,
    };

    #[derive(Default)]
    struct Calls {
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        closes: AtomicUsize,
    }

    struct StubQueue {
        records: Mutex<VecDeque<Record>>,
        fail_take_after: Option<usize>,
        calls: Arc<Calls>,
    }

    struct StubTransaction {
        records: Vec<Record>,
        taken: usize,
        fail_take_after: Option<usize>,
        calls: Arc<Calls>,
    }

    impl StubQueue {
        fn with_records(count: usize) -> Self {
            Self {
                records: Mutex::new((0..count).map(|i| Record::default().with_header("seq", i.to_string())).collect()),
                fail_take_after: None,
                calls: Arc::default(),
            }
        }
    }

    impl SourceQueue for StubQueue {
        type Transaction = StubTransaction;

        fn begin_transaction(&self) -> Result<StubTransaction, QueueError> {
            Ok(StubTransaction {
                records: self.records.lock().unwrap().drain(..).collect(),
                taken: 0,
                fail_take_after: self.fail_take_after,
                calls: Arc::clone(&self.calls),
            })
        }

        fn close(&self) {}
    }

    impl QueueTransaction for StubTransaction {
        fn take(&mut self) -> Result<Option<Record>, QueueError> {
            if self.fail_take_after == Some(self.taken) {
                return Err(QueueError::channel("take failed"));
            }
            let record = self.records.get(self.taken).cloned();
            self.taken += 1;
            Ok(record)
        }

        fn commit(&mut self) -> Result<(), QueueError> {
            self.calls.commits.fetch_add(1, SeqCst);
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), QueueError> {
            self.calls.rollbacks.fetch_add(1, SeqCst);
            Ok(())
        }

        fn close(&mut self) {
            self.calls.closes.fetch_add(1, SeqCst);
        }
    }

    struct StubSink {
        fail: Option<fn() -> SinkError>,
        hang: bool,
    }

    #[async_trait]
    impl IngestionSink for StubSink {
        async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            match self.fail {
                Some(make_error) => Err(make_error()),
                None => Ok(documents.len()),
            }
        }
    }

    fn cycle(queue: StubQueue, sink: StubSink) -> BatchCycle<StubQueue> {
        BatchCycle::new(
            Arc::new(queue),
            BatchDrainer::new(NonZeroUsize::new(4).unwrap()),
            Arc::new(HeadersTransformer),
            Forwarder::new(Arc::new(sink)),
            Arc::new(SinkCounters::new("test")),
        )
    }

    fn ok_sink() -> StubSink {
        StubSink { fail: None, hang: false }
    }

    #[tokio::test]
    async fn forwarded_batch_is_committed_and_closed_once() {
        let queue = StubQueue::with_records(2);
        let calls = Arc::clone(&queue.calls);
        let mut cycle = cycle(queue, ok_sink());

        assert_eq!(cycle.process().await.unwrap(), Status::Ready);

        assert_eq!(calls.commits.load(SeqCst), 1);
        assert_eq!(calls.rollbacks.load(SeqCst), 0);
        assert_eq!(calls.closes.load(SeqCst), 1);
        assert_eq!(cycle.counters().drain_success(), 2);
    }

    #[tokio::test]
    async fn take_fault_rolls_back_and_backs_off() {
        let mut queue = StubQueue::with_records(3);
        queue.fail_take_after = Some(1);
        let calls = Arc::clone(&queue.calls);
        let mut cycle = cycle(queue, ok_sink());

        assert_eq!(cycle.process().await.unwrap(), Status::Backoff);

        assert_eq!(calls.commits.load(SeqCst), 0);
        assert_eq!(calls.rollbacks.load(SeqCst), 1);
        assert_eq!(calls.closes.load(SeqCst), 1);
        assert_eq!(cycle.counters().connection_failed(), 1);
        assert_eq!(cycle.counters().drain_attempt(), 1);
    }

    #[tokio::test]
    async fn unrecoverable_sink_error_is_fatal_after_rollback() {
        let queue = StubQueue::with_records(1);
        let calls = Arc::clone(&queue.calls);
        let sink = StubSink {
            fail: Some(|| SinkError::unrecoverable(generic_error!("index deleted"))),
            hang: false,
        };
        let mut cycle = cycle(queue, sink);

        let result = cycle.process().await;

        assert!(matches!(result, Err(FatalError::Sink { .. })));
        assert_eq!(calls.rollbacks.load(SeqCst), 1);
        assert_eq!(calls.closes.load(SeqCst), 1);
        assert_eq!(cycle.counters().forward_failed(), 1);
        assert_eq!(cycle.counters().drain_success(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_cycle_rolls_back_and_closes_once() {
        let queue = StubQueue::with_records(2);
        let calls = Arc::clone(&queue.calls);
        let mut cycle = cycle(queue, StubSink { fail: None, hang: true });

        let result = tokio::time::timeout(Duration::from_secs(5), cycle.process()).await;

        assert!(result.is_err());
        assert_eq!(calls.commits.load(SeqCst), 0);
        assert_eq!(calls.rollbacks.load(SeqCst), 1);
        assert_eq!(calls.closes.load(SeqCst), 1);
    }
}
