//! Forwarding documents to an ingestion sink.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use snafu::Snafu;
use tracing::{debug, warn};

use crate::{
    record::Document,
    sink::{IngestionSink, SinkError},
};

/// How a forwarder treats an acknowledgement that accepted fewer documents than were submitted.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptPolicy {
    /// Any acknowledgement counts as success. Mismatches are logged.
    #[default]
    Lenient,

    /// The accepted count must equal the submitted count.
    Strict,
}

/// A forward error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ForwardError {
    /// The sink rejected the submission.
    #[snafu(display("Failed to submit {} documents: {}", submitted, source))]
    Submit {
        /// Number of documents submitted.
        submitted: usize,

        /// Error source.
        source: SinkError,
    },

    /// The sink did not acknowledge the submission in time.
    #[snafu(display("Sink did not acknowledge {} documents within {:?}.", submitted, timeout))]
    TimedOut {
        /// Number of documents submitted.
        submitted: usize,

        /// The bound that elapsed.
        timeout: Duration,
    },

    /// The sink accepted fewer documents than were submitted, and the accept policy is strict.
    #[snafu(display("Sink accepted {} of {} documents.", accepted, submitted))]
    PartialAccept {
        /// Number of documents the sink accepted.
        accepted: usize,

        /// Number of documents submitted.
        submitted: usize,
    },
}

impl ForwardError {
    /// Returns `true` if the sink reported an unrecoverable failure.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            Self::Submit {
                source: SinkError::Unrecoverable { .. },
                ..
            }
        )
    }
}

/// Submits documents to an ingestion sink and waits for the acknowledgement.
///
/// The forwarder never retries: a failed forward is reported to the caller, which rolls back and leaves retrying to
/// the scheduler.
#[derive(Clone)]
pub struct Forwarder {
    sink: Arc<dyn IngestionSink>,
    timeout: Option<Duration>,
    accept_policy: AcceptPolicy,
}

impl Forwarder {
    /// Creates a new `Forwarder` for the given sink, with no timeout and a lenient accept policy.
    pub fn new(sink: Arc<dyn IngestionSink>) -> Self {
        Self {
            sink,
            timeout: None,
            accept_policy: AcceptPolicy::default(),
        }
    }

    /// Sets the maximum time to wait for an acknowledgement.
    ///
    /// `None` waits for as long as the sink takes. Defaults to `None`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the accept policy.
    ///
    /// Defaults to [`AcceptPolicy::Lenient`].
    pub fn with_accept_policy(mut self, accept_policy: AcceptPolicy) -> Self {
        self.accept_policy = accept_policy;
        self
    }

    /// Returns the sink this forwarder submits to.
    pub fn sink(&self) -> &Arc<dyn IngestionSink> {
        &self.sink
    }

    /// Submits the documents as a single unit, preserving their order, and waits for the acknowledgement.
    ///
    /// Returns the number of documents the sink accepted.
    ///
    /// # Errors
    ///
    /// If the sink fails, the timeout elapses, or the accept policy rejects the acknowledgement, an error is returned.
    pub async fn forward(&self, documents: Vec<Document>) -> Result<usize, ForwardError> {
        let submitted = documents.len();
        let submit = self.sink.submit(documents);

        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, submit).await {
                Ok(result) => result,
                Err(_) => return Err(ForwardError::TimedOut { submitted, timeout }),
            },
            None => submit.await,
        };

        let accepted = result.map_err(|source| ForwardError::Submit { submitted, source })?;
        if accepted != submitted {
            match self.accept_policy {
                AcceptPolicy::Lenient => {
                    warn!(accepted, submitted, "Sink acknowledged fewer documents than submitted.")
                }
                AcceptPolicy::Strict => return Err(ForwardError::PartialAccept { accepted, submitted }),
            }
        }

        debug!(accepted, submitted, "Forwarded batch.");
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sluice_error::generic_error;

    use super::*;

    enum Reply {
        AcceptAll,
        Accept(usize),
        Fail,
        FailFatally,
        Hang,
    }

    struct MockSink {
        reply: Reply,
        received: Mutex<Vec<Vec<Document>>>,
    }

    impl MockSink {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl IngestionSink for MockSink {
        async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError> {
            let len = documents.len();
            self.received.lock().unwrap().push(documents);
            match self.reply {
                Reply::AcceptAll => Ok(len),
                Reply::Accept(n) => Ok(n),
                Reply::Fail => Err(SinkError::transient(generic_error!("connection reset"))),
                Reply::FailFatally => Err(SinkError::unrecoverable(generic_error!("schema mismatch"))),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn documents(count: usize) -> Vec<Document> {
        (0..count).map(|i| [("seq", i as u64)].into_iter().collect()).collect()
    }

    #[tokio::test]
    async fn submits_whole_batch_in_order() {
        let sink = MockSink::new(Reply::AcceptAll);
        let forwarder = Forwarder::new(sink.clone());

        let accepted = forwarder.forward(documents(3)).await.unwrap();

        assert_eq!(accepted, 3);
        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], documents(3));
    }

    #[tokio::test]
    async fn lenient_policy_accepts_partial_acknowledgement() {
        let forwarder = Forwarder::new(MockSink::new(Reply::Accept(2)));
        assert_eq!(forwarder.forward(documents(5)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn strict_policy_rejects_partial_acknowledgement() {
        let forwarder = Forwarder::new(MockSink::new(Reply::Accept(2))).with_accept_policy(AcceptPolicy::Strict);

        match forwarder.forward(documents(5)).await {
            Err(ForwardError::PartialAccept { accepted, submitted }) => {
                assert_eq!((accepted, submitted), (2, 5));
            }
            other => panic!("expected partial accept error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn sink_failures_are_classified() {
        let transient = Forwarder::new(MockSink::new(Reply::Fail)).forward(documents(1)).await;
        let fatal = Forwarder::new(MockSink::new(Reply::FailFatally))
            .forward(documents(1))
            .await;

        assert!(!transient.unwrap_err().is_unrecoverable());
        assert!(fatal.unwrap_err().is_unrecoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_sink_times_out() {
        let forwarder =
            Forwarder::new(MockSink::new(Reply::Hang)).with_timeout(Some(Duration::from_secs(30)));

        let result = forwarder.forward(documents(2)).await;

        assert!(matches!(result, Err(ForwardError::TimedOut { submitted: 2, .. })));
    }
}
