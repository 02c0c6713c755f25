//! High-level application primitives.
//!
//! Bootstrapping helpers needed before a sink starts running, such as initializing logging.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod logging;

/// Common imports.
pub mod prelude {
    pub use super::logging::{fatal_and_exit, initialize_logging, LoggingConfiguration};
}
