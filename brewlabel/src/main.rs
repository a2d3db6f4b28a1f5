//! brewlabel - Brewfather batch labels
//!
//! Command-line entry point: loads configuration, opens the store and runs
//! one command.

use anyhow::Result;
use brewlabel::cli::{Cli, Command};
use brewlabel::App;
use brewlabel_common::config::{self, AppConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level comes from the TOML file; RUST_LOG wins over it
    let toml_config = config::load_toml_config();
    let level = toml_config.logging.level.clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("brewlabel={level},brewlabel_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("{}", brewlabel::build_info());

    let config = AppConfig::from_toml(cli.root.as_deref(), toml_config)?;
    info!("Root folder: {}", config.root_folder.display());

    if cli.command.as_ref().is_some_and(Command::needs_remote) {
        config.require_credentials()?;
    }

    let app = App::open(config).await?;
    let result = brewlabel::cli::run(&app, cli.command).await;
    app.db.close().await;
    result
}
