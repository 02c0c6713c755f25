//! Batch draining.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    counters::SinkCounters,
    queue::{QueueError, QueueTransaction},
    record::Batch,
};

/// How a drain reacts to a take that finds no record.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Always attempt the full number of takes, skipping takes that find no record.
    #[default]
    Exhaustive,

    /// Stop at the first take that finds no record.
    StopOnEmpty,
}

/// Drains up to a fixed number of records from an open transaction.
#[derive(Clone, Debug)]
pub struct BatchDrainer {
    max_count: NonZeroUsize,
    mode: DrainMode,
}

impl BatchDrainer {
    /// Creates a new `BatchDrainer` that takes at most `max_count` records per batch.
    pub fn new(max_count: NonZeroUsize) -> Self {
        Self {
            max_count,
            mode: DrainMode::default(),
        }
    }

    /// Sets the drain mode.
    ///
    /// Defaults to [`DrainMode::Exhaustive`].
    pub fn with_mode(mut self, mode: DrainMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the maximum number of records per batch.
    pub fn max_count(&self) -> usize {
        self.max_count.get()
    }

    /// Drains a batch from the given transaction.
    ///
    /// Every take that returns, whether or not it found a record, counts as a drain attempt. Non-empty batches are
    /// counted as complete when they reached the maximum size and as underflow otherwise. Empty batches are left for
    /// the caller to count.
    ///
    /// # Errors
    ///
    /// If a take fails, the error is returned immediately and any records taken so far are discarded. The caller must
    /// roll back the transaction to return them to the queue.
    pub fn drain<T>(&self, transaction: &mut T, counters: &SinkCounters) -> Result<Batch, QueueError>
    where
        T: QueueTransaction + ?Sized,
    {
        let max_count = self.max_count.get();
        let mut batch = Batch::with_capacity(max_count);

        for _ in 0..max_count {
            let maybe_record = transaction.take()?;
            counters.increment_drain_attempt();

            match maybe_record {
                Some(record) => batch.push(record),
                None => {
                    if self.mode == DrainMode::StopOnEmpty {
                        break;
                    }
                }
            }
        }

        if !batch.is_empty() {
            if batch.len() == max_count {
                counters.increment_batch_complete();
            } else {
                counters.increment_batch_underflow();
            }
        }

        trace!(batch_len = batch.len(), max_count, "Drained batch.");
        Ok(batch)
    }
}
