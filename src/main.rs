//! Climate Channel
//!
//! `climate-channel push` refreshes the message once and exits (run it from
//! cron); without an argument it listens for toggle button presses until
//! terminated.

use anyhow::Context;
use clap::Parser;
use climate_channel::{generate_default_config, Channel, Config, Listener, LoggingConfig, TelegramClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "climate-channel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keeps a chat message up to date with home climate readings")]
struct Cli {
    /// `push` (or `1`) refreshes the message once; omit to listen for button presses
    #[arg(value_parser = ["push", "1"])]
    mode: Option<String>,

    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an annotated default config and exit
    #[arg(long)]
    print_default_config: bool,
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("warn,climate_channel={}", config.level))
    });

    let writer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let ansi = config.file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_ansi(ansi).with_writer(writer))
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = Config::load_default(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging)?;
    config.validate().context("invalid configuration")?;

    tracing::info!("Climate Channel v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("State directory: {}", config.state.dir().display());

    let client = Arc::new(TelegramClient::new(&config.telegram)?);
    let channel = Arc::new(Channel::from_config(&config, client.clone())?);

    if cli.mode.is_some() {
        match channel.push().await {
            Ok(detailed) => tracing::info!("Push done (detailed: {})", detailed),
            Err(e) => tracing::error!("Push failed: {}", e),
        }
        return Ok(());
    }

    let mut listener = Listener::new(client, channel);
    if let Some(secs) = config.schedule.push_interval_secs {
        tracing::info!("Pushing every {} seconds", secs);
        listener = listener.push_every(Duration::from_secs(secs));
    }
    listener.run().await;

    tracing::info!("Climate Channel stopped");
    Ok(())
}
