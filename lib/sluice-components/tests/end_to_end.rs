use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use sluice_components::{queues::MemoryQueue, sinks::BlackholeSink};
use sluice_core::{
    config::SinkConfiguration,
    cycle::Status,
    queue::{QueueTransaction as _, SourceQueue as _},
    record::{Document, Record},
    sink::{IngestionSink, SinkError},
};
use sluice_error::generic_error;

fn fill(queue: &MemoryQueue, count: usize) {
    let mut txn = queue.begin_transaction().unwrap();
    for i in 0..count {
        let record = Record::from_body(format!("line {}", i)).with_header("seq", i.to_string());
        txn.put(record).unwrap();
    }
    txn.commit().unwrap();
    txn.close();
}

/// Fails the first `failures` submissions, then accepts everything.
#[derive(Default)]
struct FlakySink {
    failures: usize,
    calls: AtomicUsize,
    seen: std::sync::Mutex<Vec<Vec<Document>>>,
}

#[async_trait]
impl IngestionSink for FlakySink {
    async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError> {
        let call = self.calls.fetch_add(1, SeqCst);
        let len = documents.len();
        self.seen.lock().unwrap().push(documents);
        if call < self.failures {
            Err(SinkError::transient(generic_error!("connection refused")))
        } else {
            Ok(len)
        }
    }
}

#[tokio::test(start_paused = true)]
async fn runner_drains_memory_queue_into_blackhole() {
    let queue = Arc::new(MemoryQueue::new(1_000, 250));
    fill(&queue, 250);
    let sink = Arc::new(BlackholeSink::default());

    let config = SinkConfiguration::default();
    let mut runner = config.build_runner(Arc::clone(&queue), sink.clone());

    runner.start();
    let drained = {
        let queue = Arc::clone(&queue);
        async move {
            while !queue.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    };
    runner.run(drained).await.unwrap();
    runner.stop().await;

    assert_eq!(sink.documents_received(), 250);
    assert!(queue.is_closed());

    let counters = runner.counters().snapshot();
    assert_eq!(counters.drain_success, 250);
    assert_eq!(counters.batch_complete, 2);
    assert_eq!(counters.batch_underflow, 1);
    assert_eq!(counters.connection_created, 1);
    assert_eq!(counters.connection_closed, 1);
}

#[tokio::test]
async fn failed_forward_leaves_records_in_memory_queue() {
    let queue = Arc::new(MemoryQueue::new(100, 10));
    fill(&queue, 5);
    let sink = Arc::new(FlakySink {
        failures: 1,
        ..FlakySink::default()
    });

    let config = SinkConfiguration::default().with_batch_size(NonZeroUsize::new(5).unwrap());
    let mut cycle = config.build_cycle(Arc::clone(&queue), sink.clone());

    assert_eq!(cycle.process().await.unwrap(), Status::Backoff);
    assert_eq!(queue.len(), 5);
    assert_eq!(cycle.counters().batch_complete(), 1);
    assert_eq!(cycle.counters().drain_success(), 0);

    assert_eq!(cycle.process().await.unwrap(), Status::Ready);
    assert!(queue.is_empty());
    assert_eq!(cycle.counters().drain_success(), 5);

    let seen = sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}
