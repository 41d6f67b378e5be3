mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    soilcast_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = config::load(&args).context("failed to load configuration")?;
    config.log_summary();

    let model = args.model.as_deref();
    match args.command {
        Command::Process => commands::process(&config),
        Command::Detect { .. } => commands::detect(&config, model),
        Command::Forecast { .. } => commands::forecast(&config, model),
        Command::Evaluate => commands::evaluate(&config, model),
        Command::Report => commands::report(&config),
    }
}
