#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use sluice_core::{
    queue::{QueueError, QueueTransaction, SourceQueue},
    record::{Document, Record},
    sink::{IngestionSink, SinkError},
};
use sluice_error::generic_error;

/// A fault to inject into a queue operation.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    Channel,
    Unrecoverable,
}

impl Fault {
    fn into_error(self, operation: &str) -> QueueError {
        match self {
            Fault::Channel => QueueError::channel(format!("{} failed", operation)),
            Fault::Unrecoverable => QueueError::Unrecoverable {
                source: generic_error!("{} hit corrupted state", operation),
            },
        }
    }
}

#[derive(Default)]
struct QueueState {
    records: VecDeque<Record>,
    take_fault: Option<(usize, Fault)>,
    commit_fault: Option<Fault>,
    commits: usize,
    rollbacks: usize,
    transactions_opened: usize,
    transactions_closed: usize,
    queue_closes: usize,
}

/// An in-memory transactional queue that records every call made against it.
#[derive(Clone, Default)]
pub struct MockQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MockQueue {
    pub fn with_records(count: usize) -> Self {
        let queue = Self::default();
        queue.push((0..count).map(|i| Record::from_body(format!("event-{}", i)).with_header("seq", i.to_string())));
        queue
    }

    pub fn push<I>(&self, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        self.state.lock().unwrap().records.extend(records);
    }

    /// Fails the take with the given zero-based index in every transaction.
    pub fn fail_take_at(&self, index: usize, fault: Fault) {
        self.state.lock().unwrap().take_fault = Some((index, fault));
    }

    pub fn fail_commit(&self, fault: Fault) {
        self.state.lock().unwrap().commit_fault = Some(fault);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock().unwrap();
        state.take_fault = None;
        state.commit_fault = None;
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| String::from_utf8_lossy(r.body()).into_owned())
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    pub fn transactions_opened(&self) -> usize {
        self.state.lock().unwrap().transactions_opened
    }

    pub fn transactions_closed(&self) -> usize {
        self.state.lock().unwrap().transactions_closed
    }

    pub fn queue_closes(&self) -> usize {
        self.state.lock().unwrap().queue_closes
    }
}

impl SourceQueue for MockQueue {
    type Transaction = MockTransaction;

    fn begin_transaction(&self) -> Result<MockTransaction, QueueError> {
        self.state.lock().unwrap().transactions_opened += 1;
        Ok(MockTransaction {
            state: Arc::clone(&self.state),
            taken: Vec::new(),
            takes: 0,
        })
    }

    fn close(&self) {
        self.state.lock().unwrap().queue_closes += 1;
    }
}

pub struct MockTransaction {
    state: Arc<Mutex<QueueState>>,
    taken: Vec<Record>,
    takes: usize,
}

impl QueueTransaction for MockTransaction {
    fn take(&mut self) -> Result<Option<Record>, QueueError> {
        let mut state = self.state.lock().unwrap();
        if let Some((index, fault)) = state.take_fault {
            if index == self.takes {
                return Err(fault.into_error("take"));
            }
        }
        self.takes += 1;

        let record = state.records.pop_front();
        if let Some(record) = &record {
            self.taken.push(record.clone());
        }
        Ok(record)
    }

    fn commit(&mut self) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        if let Some(fault) = state.commit_fault {
            return Err(fault.into_error("commit"));
        }
        state.commits += 1;
        self.taken.clear();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.rollbacks += 1;
        for record in self.taken.drain(..).rev() {
            state.records.push_front(record);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().transactions_closed += 1;
    }
}

/// How the mock sink answers a submission.
#[derive(Clone, Copy, Debug)]
pub enum Reply {
    AcceptAll,
    Accept(usize),
    Fail,
    FailFatally,
}

#[derive(Default)]
struct SinkState {
    replies: VecDeque<Reply>,
    submissions: Vec<Vec<Document>>,
    closes: usize,
}

/// An ingestion sink that answers from a script of replies, accepting everything once the script runs out.
#[derive(Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
}

impl MockSink {
    pub fn replying<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        let sink = Self::default();
        sink.state.lock().unwrap().replies.extend(replies);
        sink
    }

    pub fn submissions(&self) -> Vec<Vec<Document>> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl IngestionSink for MockSink {
    async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError> {
        let mut state = self.state.lock().unwrap();
        let submitted = documents.len();
        state.submissions.push(documents);

        match state.replies.pop_front().unwrap_or(Reply::AcceptAll) {
            Reply::AcceptAll => Ok(submitted),
            Reply::Accept(accepted) => Ok(accepted),
            Reply::Fail => Err(SinkError::transient(generic_error!("503 Service Unavailable"))),
            Reply::FailFatally => Err(SinkError::unrecoverable(generic_error!("datasource dropped"))),
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
