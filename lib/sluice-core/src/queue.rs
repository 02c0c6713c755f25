//! Transactional source queue interface.

use sluice_error::GenericError;
use snafu::Snafu;

use crate::record::Record;

/// A source queue error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum QueueError {
    /// A transient, queue-level failure.
    ///
    /// The transaction should be rolled back and the operation retried later.
    #[snafu(display("Channel fault: {}", reason))]
    Channel {
        /// Description of the failure.
        reason: String,
    },

    /// A failure the queue cannot recover from, such as corrupted internal state.
    #[snafu(display("Unrecoverable queue failure: {}", source))]
    Unrecoverable {
        /// Error source.
        source: GenericError,
    },
}

impl QueueError {
    /// Creates a transient channel error with the given reason.
    pub fn channel<R>(reason: R) -> Self
    where
        R: Into<String>,
    {
        Self::Channel { reason: reason.into() }
    }

    /// Returns `true` if this error is unrecoverable.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }
}

/// A transactional source of records.
///
/// Records are only ever removed from the queue through a transaction: taking a record within a transaction reserves
/// it, committing the transaction removes reserved records for good, and rolling back returns them to the queue so
/// that they are taken again, in the same order, by a later transaction.
pub trait SourceQueue: Send + Sync {
    /// Transaction type for this queue.
    type Transaction: QueueTransaction;

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// If the queue cannot open a transaction, an error is returned.
    fn begin_transaction(&self) -> Result<Self::Transaction, QueueError>;

    /// Closes the queue.
    ///
    /// Must be idempotent: closing an already-closed queue is a no-op.
    fn close(&self);
}

/// A single queue transaction.
pub trait QueueTransaction: Send {
    /// Takes the next available record, if any.
    ///
    /// Returns `Ok(None)` when no record is currently available. This is not an error.
    ///
    /// # Errors
    ///
    /// If the queue fails while taking a record, an error is returned.
    fn take(&mut self) -> Result<Option<Record>, QueueError>;

    /// Commits the transaction, permanently removing every record taken within it.
    ///
    /// # Errors
    ///
    /// If the commit fails, an error is returned and the transaction must be rolled back.
    fn commit(&mut self) -> Result<(), QueueError>;

    /// Rolls back the transaction, returning every record taken within it to the queue.
    ///
    /// # Errors
    ///
    /// If the rollback fails, an error is returned.
    fn rollback(&mut self) -> Result<(), QueueError>;

    /// Releases the transaction.
    ///
    /// Must be idempotent, and safe to call after either commit or rollback.
    fn close(&mut self);
}
