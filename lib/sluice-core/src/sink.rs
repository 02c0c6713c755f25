//! Asynchronous ingestion sink interface.

use async_trait::async_trait;
use sluice_error::GenericError;
use snafu::Snafu;

use crate::record::Document;

/// An ingestion sink error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SinkError {
    /// The submission failed, but may succeed if retried later.
    #[snafu(display("Submission failed: {}", source))]
    Transient {
        /// Error source.
        source: GenericError,
    },

    /// The sink is in a state it cannot recover from.
    #[snafu(display("Sink failed unrecoverably: {}", source))]
    Unrecoverable {
        /// Error source.
        source: GenericError,
    },
}

impl SinkError {
    /// Creates a transient error from the given source.
    pub fn transient<E>(source: E) -> Self
    where
        E: Into<GenericError>,
    {
        Self::Transient { source: source.into() }
    }

    /// Creates an unrecoverable error from the given source.
    pub fn unrecoverable<E>(source: E) -> Self
    where
        E: Into<GenericError>,
    {
        Self::Unrecoverable { source: source.into() }
    }
}

/// A downstream service that accepts batches of documents.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    /// Submits the documents as a single unit, resolving once the downstream service acknowledges them.
    ///
    /// Returns the number of documents the downstream service reports as accepted, which is not guaranteed to equal the
    /// number submitted.
    ///
    /// # Errors
    ///
    /// If the submission fails, an error is returned.
    async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError>;

    /// Closes the sink, waiting for any outstanding work to finish.
    ///
    /// # Errors
    ///
    /// If the sink fails to shut down cleanly, an error is returned.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
