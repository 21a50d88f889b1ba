mod api;
mod config;
mod generate_config;
mod materialize;
mod status_bar;
mod sync;
mod tree;

use std::path::Path;

// Animations and logging
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{
    cli::{self, Commands, DEFAULT_CONFIG_PATH},
    sync_config::{Config, Overrides},
};

pub type Result<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> crate::Result<()> {
    let cli = <cli::Cli as clap::Parser>::parse();

    // Start logging
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    );
    if cli.animations_enabled() {
        let indicatif_layer = IndicatifLayer::new();
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(indicatif_layer.get_stderr_writer())
                    .compact(),
            )
            .with(indicatif_layer)
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_ansi(false).compact())
            .init();
    }

    match cli.command {
        Commands::Sync {
            config_path,
            destination_folder,
            ignore_existing,
            no_animation: _,
        } => {
            let config = Config::load(
                config_path.as_deref(),
                Path::new(DEFAULT_CONFIG_PATH),
                Overrides {
                    destination: destination_folder,
                    ignore_existing,
                },
            )?;
            config.sync().await
        }
        Commands::Setup { config_path } => generate_config::generate_config(&config_path).await,
    }
}
