use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sluice/sluice.yaml";

#[derive(Parser)]
#[command(about = "Forwards records from a transactional queue to an ingestion service.")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub action: Option<Action>,
}

#[derive(Subcommand)]
pub enum Action {
    /// Runs the sink, feeding the queue from standard input.
    #[command(name = "run")]
    Run(RunConfig),

    /// Prints the resolved configuration.
    #[command(name = "config")]
    Config(ConfigConfig),
}

#[derive(Args, Debug)]
pub struct RunConfig {
    /// Path to the configuration file.
    ///
    /// When not set, `/etc/sluice/sluice.yaml` is loaded if it exists.
    #[arg(long = "config", short = 'c')]
    pub config: Option<PathBuf>,

    /// Stops once standard input is closed and every record has been forwarded.
    #[arg(long = "exit-when-drained", default_value_t = false)]
    pub exit_when_drained: bool,
}

#[derive(Args, Debug)]
pub struct ConfigConfig {
    /// Path to the configuration file.
    ///
    /// When not set, `/etc/sluice/sluice.yaml` is loaded if it exists.
    #[arg(long = "config", short = 'c')]
    pub config: Option<PathBuf>,
}
