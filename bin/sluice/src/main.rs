//! Sluice.
//!
//! Reads records from standard input into a transactional in-memory queue, and forwards them in batches to the
//! configured ingestion sink.

#![deny(warnings)]
#![deny(missing_docs)]

use clap::Parser as _;
use sluice_app::prelude::*;
use tracing::{error, info};

mod cli;
use self::cli::{config::handle_config_command, load_configuration, run::handle_run_command};

mod config;
use self::config::{Action, Cli, RunConfig};

mod feeder;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let action = cli.action.unwrap_or(Action::Run(RunConfig {
        config: None,
        exit_when_drained: false,
    }));

    let config_path = match &action {
        Action::Run(args) => args.config.clone(),
        Action::Config(args) => args.config.clone(),
    };
    let configuration = load_configuration(config_path.as_deref())
        .unwrap_or_else(|e| fatal_and_exit(format!("failed to load configuration: {:?}", e)));

    match action {
        Action::Run(args) => {
            let logging_config = LoggingConfiguration::from_configuration(&configuration)
                .unwrap_or_else(|e| fatal_and_exit(format!("failed to load logging configuration: {}", e)));
            if let Err(e) = initialize_logging(&logging_config) {
                fatal_and_exit(format!("failed to initialize logging: {}", e));
            }

            match handle_run_command(configuration, args).await {
                Ok(()) => info!("Sluice stopped."),
                Err(e) => {
                    error!("{:?}", e);
                    std::process::exit(1);
                }
            }
        }
        Action::Config(_) => {
            if let Err(e) = handle_config_command(&configuration) {
                fatal_and_exit(format!("{:?}", e));
            }
        }
    }
}
