//! Marquette server
//!
//! Run with: cargo run -- --settings config.toml
//!
//! Without `--settings` the config is looked up in the user config dir,
//! `/etc/marquette/config.toml` and `./config.toml`, falling back to
//! defaults. A file that exists but does not load is a startup error.
//! `MARQUETTE_*` environment variables override file values and `RUST_LOG`
//! overrides the configured log level.

use anyhow::Context;
use clap::Parser;
use marquette::config::{generate_default_config, Config, LoggingConfig};
use marquette::{AppState, BroadcastHub, BrokerLink, HubConfig, Relay, TileStore, TopicCache};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// MQTT to browser relay with a tile dashboard
#[derive(Debug, Parser)]
#[command(name = "marquette", version, about)]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Print a default settings file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let settings = args.settings.clone().or_else(Config::locate);
    let mut config = match &settings {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env(),
    };
    config.logging.verbose |= args.verbose;

    init_logging(&config.logging);

    tracing::info!("Starting Marquette v{}", env!("CARGO_PKG_VERSION"));
    match &settings {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("No config file found, using defaults"),
    }

    let tiles = TileStore::load(&config.tiles.path)
        .await
        .context("Failed to load tile layout")?;
    tracing::info!("Tile layout: {:?} ({} tiles)", tiles.path(), tiles.len().await);

    let hub = Arc::new(BroadcastHub::new(HubConfig::from(&config.stream)));
    let cache = Arc::new(TopicCache::new());
    let (link, inbound) = BrokerLink::new(&config.broker);
    let link = Arc::new(link);

    let relay = Arc::new(Relay::new(cache, Arc::clone(&hub), link.clone()));
    let relay_handle = Arc::clone(&relay).run(inbound);
    let keepalive_handle = hub.start_keepalive();

    tracing::info!("MQTT broker: {}", link.addr());
    let establish_handle = {
        let link = Arc::clone(&link);
        let filters = config.broker.subscriptions.clone();
        tokio::spawn(async move { link.establish(&filters).await })
    };

    let state = AppState::new(relay, Arc::new(tiles), config.ui);
    let result = marquette::serve(state).await;

    tracing::info!("Shutting down...");
    establish_handle.abort();
    keepalive_handle.abort();
    link.disconnect().await;
    relay_handle.abort();

    result?;
    tracing::info!("Marquette shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let default_level = if config.verbose {
        "debug"
    } else {
        config.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "marquette={default_level},tower_http={default_level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
