use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use sluice_core::{
    queue::{QueueError, QueueTransaction, SourceQueue},
    record::Record,
};
use sluice_error::generic_error;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct State {
    records: VecDeque<Record>,
    in_flight: usize,
    closed: bool,
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>, QueueError> {
    state.lock().map_err(|_| QueueError::Unrecoverable {
        source: generic_error!("Memory queue state is poisoned."),
    })
}

/// A bounded, transactional, in-memory queue.
///
/// Records are added by committing a transaction that put them, and removed by committing a transaction that took
/// them. Records taken by a transaction that is rolled back go back to the front of the queue in the order they were
/// taken, so the next transaction sees them first.
///
/// The queue holds at most `capacity` records, counting records that have been taken by a transaction that is still
/// open. A single transaction can put or take at most `transaction_capacity` records.
#[derive(Clone, Debug)]
pub struct MemoryQueue {
    state: Arc<Mutex<State>>,
    capacity: usize,
    transaction_capacity: usize,
}

impl MemoryQueue {
    /// Creates a new `MemoryQueue` with the given capacities.
    pub fn new(capacity: usize, transaction_capacity: usize) -> Self {
        Self {
            state: Arc::default(),
            capacity,
            transaction_capacity,
        }
    }

    /// Returns the number of records available to take.
    ///
    /// Records taken by an open transaction are not included.
    pub fn len(&self) -> usize {
        lock(&self.state).map(|state| state.records.len()).unwrap_or_default()
    }

    /// Returns `true` if no records are available to take.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).map(|state| state.closed).unwrap_or(true)
    }
}

impl SourceQueue for MemoryQueue {
    type Transaction = MemoryTransaction;

    fn begin_transaction(&self) -> Result<MemoryTransaction, QueueError> {
        if lock(&self.state)?.closed {
            return Err(QueueError::channel("queue is closed"));
        }

        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            capacity: self.capacity,
            transaction_capacity: self.transaction_capacity,
            puts: Vec::new(),
            takes: Vec::new(),
            phase: Phase::Open,
        })
    }

    fn close(&self) {
        match lock(&self.state) {
            Ok(mut state) => {
                if !state.closed {
                    state.closed = true;
                    debug!(remaining = state.records.len(), "Memory queue closed.");
                }
            }
            Err(e) => warn!(error = %e, "Failed to close memory queue."),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Open,
    Committed,
    RolledBack,
    Closed,
}

/// A transaction against a [`MemoryQueue`].
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    capacity: usize,
    transaction_capacity: usize,
    puts: Vec<Record>,
    takes: Vec<Record>,
    phase: Phase,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.phase == Phase::Open {
            Ok(())
        } else {
            Err(QueueError::channel(format!(
                "transaction is no longer open ({:?})",
                self.phase
            )))
        }
    }

    fn ensure_transaction_capacity(&self) -> Result<(), QueueError> {
        if self.puts.len() + self.takes.len() >= self.transaction_capacity {
            return Err(QueueError::channel(format!(
                "transaction capacity of {} records exceeded",
                self.transaction_capacity
            )));
        }
        Ok(())
    }

    /// Puts a record into the queue once the transaction commits.
    ///
    /// # Errors
    ///
    /// If the transaction is no longer open, or has reached its capacity, an error is returned.
    pub fn put(&mut self, record: Record) -> Result<(), QueueError> {
        self.ensure_open()?;
        self.ensure_transaction_capacity()?;
        self.puts.push(record);
        Ok(())
    }
}

impl QueueTransaction for MemoryTransaction {
    fn take(&mut self) -> Result<Option<Record>, QueueError> {
        self.ensure_open()?;
        self.ensure_transaction_capacity()?;

        let mut state = lock(&self.state)?;
        let maybe_record = state.records.pop_front();
        if let Some(record) = &maybe_record {
            state.in_flight += 1;
            self.takes.push(record.clone());
        }
        Ok(maybe_record)
    }

    fn commit(&mut self) -> Result<(), QueueError> {
        self.ensure_open()?;

        let mut state = lock(&self.state)?;
        if !self.puts.is_empty() {
            if state.closed {
                return Err(QueueError::channel("queue is closed"));
            }

            let occupied = state.records.len() + state.in_flight - self.takes.len();
            if occupied + self.puts.len() > self.capacity {
                return Err(QueueError::channel(format!(
                    "queue capacity of {} records exceeded",
                    self.capacity
                )));
            }
        }

        state.in_flight -= self.takes.len();
        state.records.extend(self.puts.drain(..));
        self.takes.clear();
        self.phase = Phase::Committed;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), QueueError> {
        self.ensure_open()?;

        let mut state = lock(&self.state)?;
        state.in_flight -= self.takes.len();
        for record in self.takes.drain(..).rev() {
            state.records.push_front(record);
        }
        self.puts.clear();
        self.phase = Phase::RolledBack;
        Ok(())
    }

    fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }

        if self.phase == Phase::Open {
            if let Err(e) = self.rollback() {
                warn!(error = %e, "Failed to roll back transaction on close.");
            }
        }
        self.phase = Phase::Closed;
    }
}
