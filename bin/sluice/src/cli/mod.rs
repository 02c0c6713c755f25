use std::path::{Path, PathBuf};

use serde::Serialize;
use sluice_components::{queues::MemoryQueueConfiguration, sinks::IngestConfiguration};
use sluice_config::{ConfigurationLoader, GenericConfiguration};
use sluice_core::config::SinkConfiguration;
use sluice_error::{ErrorContext as _, GenericError};

use crate::config::DEFAULT_CONFIG_PATH;

pub mod config;
pub mod run;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "SLUICE";

/// Loads the configuration from the given file, or the default file if it exists, with environment overrides on top.
pub fn load_configuration(path: Option<&Path>) -> Result<GenericConfiguration, GenericError> {
    let loader = match path {
        Some(path) => ConfigurationLoader::default()
            .from_yaml(path)
            .error_context("Failed to load configuration file.")?,
        None => ConfigurationLoader::default().try_from_yaml(PathBuf::from(DEFAULT_CONFIG_PATH)),
    };

    Ok(loader
        .from_environment(ENV_PREFIX)
        .error_context("Environment variable prefix should not be empty.")?
        .into_generic())
}

/// Every setting the `run` command uses, fully resolved.
#[derive(Debug, Serialize)]
pub struct ResolvedConfiguration {
    #[serde(flatten)]
    pub sink: SinkConfiguration,
    pub queue: MemoryQueueConfiguration,
    pub ingest: IngestConfiguration,
}

impl ResolvedConfiguration {
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        Ok(Self {
            sink: SinkConfiguration::from_configuration(config).error_context("Failed to load sink configuration.")?,
            queue: config
                .try_get_typed("queue")
                .error_context("Failed to load queue configuration.")?
                .unwrap_or_default(),
            ingest: config
                .try_get_typed("ingest")
                .error_context("Failed to load ingest configuration.")?
                .unwrap_or_default(),
        })
    }
}
