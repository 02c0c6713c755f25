use sluice_config::GenericConfiguration;
use sluice_error::{generic_error, ErrorContext as _, GenericError};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Logging configuration.
///
/// Read from the `log_level` and `log_format_json` keys, which map to `SLUICE_LOG_LEVEL` and `SLUICE_LOG_FORMAT_JSON`
/// when loaded from the environment.
pub struct LoggingConfiguration {
    pub(super) log_level: LogLevel,
    pub(super) log_format_json: bool,
}

impl LoggingConfiguration {
    /// Creates a new `LoggingConfiguration` from the given configuration.
    ///
    /// Missing keys fall back to `info` level filtering and human-readable output.
    ///
    /// # Errors
    ///
    /// If either key is present but invalid, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let log_level = match config.try_get_typed::<String>("log_level")? {
            Some(raw) => LogLevel::try_from(raw)?,
            None => LevelFilter::INFO.into(),
        };

        Ok(Self {
            log_level,
            log_format_json: config.try_get_typed("log_format_json")?.unwrap_or(false),
        })
    }
}

/// A validated set of `EnvFilter` directives.
pub(super) struct LogLevel(String);

impl LogLevel {
    pub fn as_env_filter(&self) -> EnvFilter {
        // Directives were validated on construction, so lossy parsing drops nothing here.
        EnvFilter::builder().parse_lossy(&self.0)
    }
}

impl From<LevelFilter> for LogLevel {
    fn from(level: LevelFilter) -> Self {
        Self(level.to_string().to_lowercase())
    }
}

impl TryFrom<String> for LogLevel {
    type Error = GenericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(generic_error!("Log level cannot be empty."));
        }

        EnvFilter::builder()
            .parse(&value)
            .error_context("Failed to parse valid log level.")?;
        Ok(Self(value))
    }
}
