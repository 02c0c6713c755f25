//! Source queues.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use sluice_error::{generic_error, GenericError};

mod memory;
pub use self::memory::{MemoryQueue, MemoryTransaction};

const fn default_capacity() -> usize {
    10_000
}

const fn default_transaction_capacity() -> usize {
    1_000
}

/// Memory queue configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MemoryQueueConfiguration {
    /// Maximum number of records held by the queue, including records taken by open transactions.
    ///
    /// Defaults to 10000.
    #[serde(default = "default_capacity")]
    capacity: usize,

    /// Maximum number of records a single transaction can put or take.
    ///
    /// Must be at least the sink batch size. Defaults to 1000.
    #[serde(default = "default_transaction_capacity")]
    transaction_capacity: usize,
}

impl Default for MemoryQueueConfiguration {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            transaction_capacity: default_transaction_capacity(),
        }
    }
}

impl MemoryQueueConfiguration {
    /// Builds a memory queue that can serve batches of up to `batch_size` records.
    ///
    /// # Errors
    ///
    /// If the transaction capacity is smaller than `batch_size`, or larger than the queue capacity, an error is
    /// returned.
    pub fn build(&self, batch_size: NonZeroUsize) -> Result<MemoryQueue, GenericError> {
        if self.transaction_capacity < batch_size.get() {
            return Err(generic_error!(
                "Queue transaction capacity ({}) must be at least the batch size ({}).",
                self.transaction_capacity,
                batch_size
            ));
        }

        if self.transaction_capacity > self.capacity {
            return Err(generic_error!(
                "Queue transaction capacity ({}) must not exceed the queue capacity ({}).",
                self.transaction_capacity,
                self.capacity
            ));
        }

        Ok(MemoryQueue::new(self.capacity, self.transaction_capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_size(size: usize) -> NonZeroUsize {
        NonZeroUsize::new(size).unwrap()
    }

    #[test]
    fn transaction_capacity_must_fit_a_batch() {
        let config: MemoryQueueConfiguration =
            serde_json::from_str(r#"{"capacity": 100, "transaction_capacity": 10}"#).unwrap();

        assert!(config.build(batch_size(10)).is_ok());
        assert!(config.build(batch_size(11)).is_err());
    }

    #[test]
    fn transaction_capacity_must_fit_the_queue() {
        let config: MemoryQueueConfiguration =
            serde_json::from_str(r#"{"capacity": 5, "transaction_capacity": 10}"#).unwrap();

        assert!(config.build(batch_size(1)).is_err());
    }

    #[test]
    fn defaults_fit_default_batch_size() {
        assert!(MemoryQueueConfiguration::default().build(batch_size(100)).is_ok());
    }
}
