//! Records, batches, and documents.

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header mapping carried by a record.
pub type Headers = IndexMap<String, String>;

/// A single unit of input taken from a source queue.
///
/// Records carry an opaque body and an ordered set of string headers. Once handed to a queue, a record is never
/// mutated again: the drain, transform, and forward stages only ever read it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    headers: Headers,
    body: Bytes,
}

impl Record {
    /// Creates a new `Record` from the given headers and body.
    pub fn new<B>(headers: Headers, body: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Creates a new `Record` with the given body and no headers.
    pub fn from_body<B>(body: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::new(Headers::new(), body)
    }

    /// Adds a header, replacing any existing header with the same key.
    pub fn with_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Returns the record headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the record body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// An ordered group of records drained within a single transaction.
///
/// Records keep the order in which they were taken from the queue.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Returns the number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the records in drain order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

/// The structured representation of a record sent to an ingestion sink.
///
/// A document is an ordered mapping of field names to JSON values, and serializes as a flat JSON object.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any existing value for the same name.
    pub fn insert<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns the value of the given field, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over the fields, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Document
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
