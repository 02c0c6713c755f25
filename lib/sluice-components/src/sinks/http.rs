use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sluice_core::{
    record::Document,
    sink::{IngestionSink, SinkError},
};
use sluice_error::{generic_error, ErrorContext as _, GenericError};
use tracing::{debug, trace};

/// Acknowledgement body returned by the ingestion service.
#[derive(Deserialize)]
struct Acknowledgement {
    accepted: usize,
}

/// HTTP ingestion sink.
///
/// Submits each batch as a JSON array of documents in the body of a single `POST` request. The ingestion service
/// acknowledges the batch with a success status. If the response body is a JSON object with an `accepted` field, that
/// count is reported as the number of accepted documents; otherwise every submitted document counts as accepted.
///
/// Connection failures, timeouts, `408`, `429`, and `5xx` responses are transient. Any other non-success response
/// means the service rejected the batch itself, and is unrecoverable.
#[derive(Clone, Debug)]
pub struct HttpIngestionSink {
    client: Client,
    endpoint: String,
}

impl HttpIngestionSink {
    /// Creates a new `HttpIngestionSink` that posts to `endpoint`.
    ///
    /// Requests are bounded by `timeout`, if given.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be built, an error is returned.
    pub fn new<S>(endpoint: S, timeout: Option<Duration>) -> Result<Self, GenericError>
    where
        S: Into<String>,
    {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().error_context("Failed to build HTTP client.")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Returns the endpoint this sink posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify_status(status: StatusCode, body: String) -> SinkError {
    let error = generic_error!("Received non-success response ({}): {}", status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
        SinkError::transient(error)
    } else if status.is_client_error() {
        SinkError::unrecoverable(error)
    } else {
        SinkError::transient(error)
    }
}

fn classify_request_error(e: reqwest::Error) -> SinkError {
    if e.is_builder() {
        SinkError::unrecoverable(e)
    } else {
        SinkError::transient(e)
    }
}

#[async_trait]
impl IngestionSink for HttpIngestionSink {
    async fn submit(&self, documents: Vec<Document>) -> Result<usize, SinkError> {
        let submitted = documents.len();
        trace!(endpoint = %self.endpoint, submitted, "Submitting batch.");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&documents)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| String::from("<no body>"));
            return Err(classify_status(status, body));
        }

        let body = response.bytes().await.map_err(SinkError::transient)?;
        let accepted = match serde_json::from_slice::<Acknowledgement>(&body) {
            Ok(ack) => ack.accepted,
            Err(_) => submitted,
        };

        debug!(endpoint = %self.endpoint, %status, submitted, accepted, "Batch acknowledged.");
        Ok(accepted)
    }
}
