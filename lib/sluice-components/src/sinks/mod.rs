//! Ingestion sinks.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use sluice_core::sink::IngestionSink;
use sluice_error::GenericError;

mod blackhole;
pub use self::blackhole::BlackholeSink;

mod http;
pub use self::http::HttpIngestionSink;

const fn default_http_timeout_secs() -> u64 {
    10
}

/// Ingestion sink selection.
///
/// Deserialized from a map tagged by `type`:
///
/// ```yaml
/// ingest:
///   type: http
///   endpoint: http://localhost:8200/v1/post/events
///   timeout_secs: 5
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestConfiguration {
    /// Discards every document. See [`BlackholeSink`].
    #[default]
    Blackhole,

    /// Posts documents to an HTTP endpoint. See [`HttpIngestionSink`].
    Http {
        /// URL that batches are posted to.
        endpoint: String,

        /// Per-request timeout, in seconds.
        ///
        /// A value of `0` disables the timeout. Defaults to 10 seconds.
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
    },
}

impl IngestConfiguration {
    /// Returns the per-request timeout of the HTTP sink, if one is configured and enabled.
    pub fn http_timeout(&self) -> Option<Duration> {
        match self {
            Self::Blackhole => None,
            Self::Http { timeout_secs, .. } => (*timeout_secs > 0).then(|| Duration::from_secs(*timeout_secs)),
        }
    }

    /// Builds the configured ingestion sink.
    ///
    /// # Errors
    ///
    /// If the sink cannot be built, an error is returned.
    pub fn build(&self) -> Result<Arc<dyn IngestionSink>, GenericError> {
        match self {
            Self::Blackhole => Ok(Arc::new(BlackholeSink::default())),
            Self::Http { endpoint, .. } => Ok(Arc::new(HttpIngestionSink::new(endpoint.clone(), self.http_timeout())?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_configuration_defaults_timeout() {
        let config: IngestConfiguration =
            serde_json::from_str(r#"{"type": "http", "endpoint": "http://localhost:8200/ingest"}"#).unwrap();

        assert_eq!(
            config,
            IngestConfiguration::Http {
                endpoint: "http://localhost:8200/ingest".to_string(),
                timeout_secs: 10,
            }
        );
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(10)));
        assert!(config.build().is_ok());
    }

    #[test]
    fn http_configuration_zero_timeout_builds() {
        let config: IngestConfiguration =
            serde_json::from_str(r#"{"type": "http", "endpoint": "http://localhost:8200/ingest", "timeout_secs": 0}"#)
                .unwrap();

        assert_eq!(config.http_timeout(), None);
        assert!(config.build().is_ok());
    }

    #[test]
    fn http_configuration_requires_endpoint() {
        assert!(serde_json::from_str::<IngestConfiguration>(r#"{"type": "http"}"#).is_err());
    }
}
