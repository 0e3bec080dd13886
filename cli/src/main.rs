//! napbridge — record a NapCatQQ WebSocket event stream into Postgres.
//!
//! Usage:
//! ```bash
//! # Defaults, overridden by environment variables
//! WS_URL=ws://127.0.0.1:3001 WS_AUTH_TOKEN=secret napbridge
//!
//! # With a TOML settings file (same keys, lower-cased)
//! napbridge --config /etc/napbridge.toml
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use napbridge_cli::{app, Settings};

#[derive(Parser)]
#[command(author, version, about = "NapCatQQ WebSocket to Postgres bridge")]
struct Cli {
    /// Path to an optional TOML settings file.
    #[arg(short, long, default_value = "napbridge.toml", env = "NAPBRIDGE_CONFIG")]
    config: PathBuf,

    /// Print the effective settings (secrets hidden) and exit.
    #[arg(long)]
    print_settings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings (file {:?})", cli.config))?;
    settings.validate().context("invalid settings")?;

    let default_level = if settings.flask_debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    if cli.print_settings {
        println!("{settings:#?}");
        return Ok(());
    }

    tracing::info!(settings = ?settings, "starting napbridge {}", env!("CARGO_PKG_VERSION"));
    app::run(settings).await
}
