//! Component implementations.
//!
//! This crate contains a transactional in-memory source queue and the ingestion sinks that the `sluice` binary can
//! forward to.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod queues;
pub mod sinks;
