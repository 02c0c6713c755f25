//! Record-to-document transformation strategies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Document, Record};

/// Maps a record into a document.
///
/// Implementations must be pure: no I/O, no shared state, and the same record must always produce the same document.
pub trait RecordTransformer: Send + Sync {
    /// Transforms a single record.
    fn transform(&self, record: &Record) -> Document;
}

/// Copies every header into the document verbatim, dropping the body.
#[derive(Clone, Debug, Default)]
pub struct HeadersTransformer;

impl RecordTransformer for HeadersTransformer {
    fn transform(&self, record: &Record) -> Document {
        record
            .headers()
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect()
    }
}

/// Copies every header into the document, and adds the body as a string field.
///
/// The body is decoded as UTF-8, with invalid sequences replaced. A header with the same name as the body field is
/// overwritten by the body.
#[derive(Clone, Debug)]
pub struct HeadersWithBodyTransformer {
    body_field: String,
}

impl HeadersWithBodyTransformer {
    /// Creates a new `HeadersWithBodyTransformer` that stores the body under `body_field`.
    pub fn new<S>(body_field: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            body_field: body_field.into(),
        }
    }
}

impl RecordTransformer for HeadersWithBodyTransformer {
    fn transform(&self, record: &Record) -> Document {
        let mut document = HeadersTransformer.transform(record);
        document.insert(
            self.body_field.clone(),
            String::from_utf8_lossy(record.body()).into_owned(),
        );
        document
    }
}

/// Projects a timestamp header and a fixed list of dimension headers.
///
/// Headers that are not listed are dropped, as are listed headers that are missing from a record. The timestamp is
/// emitted as a JSON number when it parses as an integer (epoch-based timestamps), and as a string otherwise.
#[derive(Clone, Debug)]
pub struct DimensionsTransformer {
    timestamp_field: String,
    dimensions: Vec<String>,
}

impl DimensionsTransformer {
    /// Creates a new `DimensionsTransformer`.
    pub fn new<S>(timestamp_field: S, dimensions: Vec<String>) -> Self
    where
        S: Into<String>,
    {
        Self {
            timestamp_field: timestamp_field.into(),
            dimensions,
        }
    }
}

impl RecordTransformer for DimensionsTransformer {
    fn transform(&self, record: &Record) -> Document {
        let headers = record.headers();
        let mut document = Document::new();

        if let Some(raw) = headers.get(&self.timestamp_field) {
            let value = match raw.trim().parse::<i64>() {
                Ok(millis) => Value::from(millis),
                Err(_) => Value::String(raw.clone()),
            };
            document.insert(self.timestamp_field.clone(), value);
        }

        for dimension in &self.dimensions {
            if *dimension == self.timestamp_field {
                continue;
            }
            if let Some(value) = headers.get(dimension) {
                document.insert(dimension.clone(), value.clone());
            }
        }

        document
    }
}

fn default_body_field() -> String {
    "body".to_string()
}

fn default_timestamp_field() -> String {
    "timestamp".to_string()
}

/// Transformer selection.
///
/// Deserialized from a map tagged by `type`:
///
/// ```yaml
/// transformer:
///   type: dimensions
///   timestamp_field: ts
///   dimensions: [host, service]
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformerConfiguration {
    /// Headers only. See [`HeadersTransformer`].
    #[default]
    Headers,

    /// Headers plus body. See [`HeadersWithBodyTransformer`].
    HeadersWithBody {
        /// Name of the field holding the body.
        ///
        /// Defaults to `body`.
        #[serde(default = "default_body_field")]
        body_field: String,
    },

    /// Timestamp plus selected dimensions. See [`DimensionsTransformer`].
    Dimensions {
        /// Header holding the timestamp.
        ///
        /// Defaults to `timestamp`.
        #[serde(default = "default_timestamp_field")]
        timestamp_field: String,

        /// Headers to project.
        #[serde(default)]
        dimensions: Vec<String>,
    },
}

impl TransformerConfiguration {
    /// Builds the configured transformer.
    pub fn build(&self) -> Arc<dyn RecordTransformer> {
        match self {
            Self::Headers => Arc::new(HeadersTransformer),
            Self::HeadersWithBody { body_field } => Arc::new(HeadersWithBodyTransformer::new(body_field.clone())),
            Self::Dimensions {
                timestamp_field,
                dimensions,
            } => Arc::new(DimensionsTransformer::new(timestamp_field.clone(), dimensions.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn sample_record() -> Record {
        Record::from_body("GET /checkout 200")
            .with_header("timestamp", "1700000000000")
            .with_header("host", "web-1")
            .with_header("service", "checkout")
            .with_header("trace_id", "abc123")
    }

    #[test]
    fn headers_are_copied_verbatim() {
        let document = HeadersTransformer.transform(&sample_record());

        let expected: Document = [
            ("timestamp", "1700000000000"),
            ("host", "web-1"),
            ("service", "checkout"),
            ("trace_id", "abc123"),
        ]
        .into_iter()
        .collect();
        assert_eq!(document, expected);
        assert!(document.get("body").is_none());
    }

    #[test]
    fn body_is_added_under_configured_field() {
        let document = HeadersWithBodyTransformer::new("message").transform(&sample_record());

        assert_eq!(document.len(), 5);
        assert_eq!(document.get("message"), Some(&Value::from("GET /checkout 200")));
    }

    #[test]
    fn invalid_utf8_body_is_replaced_lossily() {
        let record = Record::from_body(vec![0x66, 0x6f, 0xff]);
        let document = HeadersWithBodyTransformer::new("body").transform(&record);

        assert_eq!(document.get("body"), Some(&Value::from("fo\u{FFFD}")));
    }

    #[test]
    fn dimensions_project_listed_headers_only() {
        let transformer = DimensionsTransformer::new(
            "timestamp",
            vec!["service".to_string(), "region".to_string(), "host".to_string()],
        );
        let document = transformer.transform(&sample_record());

        let expected: Document = [
            ("timestamp", Value::from(1_700_000_000_000i64)),
            ("service", Value::from("checkout")),
            ("host", Value::from("web-1")),
        ]
        .into_iter()
        .collect();
        assert_eq!(document, expected);
    }

    #[test]
    fn non_numeric_timestamp_stays_a_string() {
        let record = Record::default().with_header("ts", "2024-05-01T10:00:00Z");
        let document = DimensionsTransformer::new("ts", Vec::new()).transform(&record);

        assert_eq!(document.get("ts"), Some(&Value::from("2024-05-01T10:00:00Z")));
    }

    #[test]
    fn transformation_is_deterministic() {
        let record = sample_record();
        for config in [
            TransformerConfiguration::Headers,
            TransformerConfiguration::HeadersWithBody {
                body_field: default_body_field(),
            },
            TransformerConfiguration::Dimensions {
                timestamp_field: default_timestamp_field(),
                dimensions: vec!["host".to_string()],
            },
        ] {
            let transformer = config.build();
            assert_eq!(transformer.transform(&record), transformer.transform(&record));
        }
    }

    #[test]
    fn configuration_deserializes_tagged_variants() {
        let config: TransformerConfiguration =
            serde_json::from_str(r#"{"type":"dimensions","dimensions":["host"]}"#).unwrap();
        assert_eq!(
            config,
            TransformerConfiguration::Dimensions {
                timestamp_field: "timestamp".to_string(),
                dimensions: vec!["host".to_string()],
            }
        );

        let config: TransformerConfiguration = serde_json::from_str(r#"{"type":"headers_with_body"}"#).unwrap();
        assert_eq!(
            config,
            TransformerConfiguration::HeadersWithBody {
                body_field: "body".to_string()
            }
        );
    }
}
