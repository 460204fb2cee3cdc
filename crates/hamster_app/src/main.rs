mod cli;
mod commands;
mod config;
mod logging;
mod popup;
mod render;

use clap::Parser;
use hamster_logging::hamster_info;

use crate::cli::Cli;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli(&cli);

    logging::initialize(config.log_destination, cli.verbose);
    hamster_info!("Using store {}", config.store_path.display());

    commands::execute(cli.command, &config).await
}
