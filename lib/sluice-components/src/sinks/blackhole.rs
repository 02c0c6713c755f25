use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use async_trait::async_trait;
use sluice_core::{
    record::Document,
    sink::{IngestionSink, SinkError},
};
use tracing::{debug, info};

/// Blackhole sink.
///
/// Accepts every document it receives and discards it, keeping a running count. Useful for testing a queue and cycle
/// without a downstream service.
#[derive(Debug, Default)]
pub struct BlackholeSink {
    batches: AtomicU64,
    documents: AtomicU64,
}

impl BlackholeSink {
    /// Returns the number of documents received so far.
    pub fn documents_received(&self) -> u64 {
        self.documents.load(Relaxed)
    }
}

#[async_trait]
impl IngestionSink for BlackholeSink {
    async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError> {
        let accepted = documents.len();
        self.batches.fetch_add(1, Relaxed);
        let total = self.documents.fetch_add(accepted as u64, Relaxed) + accepted as u64;

        debug!(accepted, total, "Blackhole sink received batch.");
        Ok(accepted)
    }

    async fn close(&self) -> Result<(), SinkError> {
        info!(
            batches = self.batches.load(Relaxed),
            documents = self.documents.load(Relaxed),
            "Blackhole sink closed."
        );
        Ok(())
    }
}
