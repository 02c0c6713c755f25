//! Logging.

use sluice_error::{generic_error, GenericError};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer};

mod config;
pub use self::config::LoggingConfiguration;

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the `tracing` logging subsystem.
///
/// Events are written to standard output, either as flattened JSON objects (when `log_format_json` is set) or in a
/// compact, human-readable format. Filtering follows `log_level`, which accepts any `EnvFilter` directive string such
/// as `info` or `warn,sluice_core=debug`.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging(config: &LoggingConfiguration) -> Result<(), GenericError> {
    let filter = config.log_level.as_env_filter();
    let directives = filter.to_string();

    let output_layer = if config.log_format_json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(true)
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(output_layer.with_filter(filter))
        .try_init()
        .map_err(|e| generic_error!("Failed to initialize logging: {}", e))?;

    debug!(%directives, json = config.log_format_json, "Logging initialized.");
    Ok(())
}
