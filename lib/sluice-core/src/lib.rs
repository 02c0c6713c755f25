//! Transactional batch forwarding.
//!
//! A sink repeatedly opens a transaction on a [`SourceQueue`](queue::SourceQueue), drains a bounded batch of records
//! from it, transforms each record into a [`Document`](record::Document), and forwards the documents to an
//! [`IngestionSink`](sink::IngestionSink). The transaction is committed only once the ingestion sink acknowledges the
//! batch, and rolled back otherwise, so a record is never removed from the queue before it has been delivered.
//!
//! [`BatchCycle`](cycle::BatchCycle) runs a single attempt and reports whether the caller can continue right away or
//! should back off. [`SinkRunner`](runner::SinkRunner) drives a cycle in a loop, applying backoff, and owns the start
//! and stop lifecycle of the sink.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod config;
pub mod counters;
pub mod cycle;
pub mod drain;
pub mod forward;
pub mod queue;
pub mod record;
pub mod runner;
pub mod sink;
pub mod transform;
