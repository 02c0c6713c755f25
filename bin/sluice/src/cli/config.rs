use sluice_config::GenericConfiguration;
use sluice_error::{ErrorContext as _, GenericError};

use super::ResolvedConfiguration;

/// Entrypoint for the `config` command.
pub fn handle_config_command(config: &GenericConfiguration) -> Result<(), GenericError> {
    let resolved = ResolvedConfiguration::from_configuration(config)?;

    let yaml = serde_yaml::to_string(&resolved).error_context("Failed to render configuration.")?;
    print!("{}", yaml);
    Ok(())
}
