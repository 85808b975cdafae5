//! PWA Lock server - Main entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pwalock_server::{AppState, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "pwalock-server")]
#[command(about = "Configuration and PIN endpoints for PWA Lock")]
struct Args {
    /// Config file (defaults to $PWALOCK_CONFIG or the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to, overriding the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "pwalock_server=debug,pwalock_core=debug,tower_http=debug"
    } else {
        "pwalock_server=info,pwalock_core=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PWA Lock server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.unwrap_or_else(ServerConfig::default_path);
    let mut config = ServerConfig::load_or_create(&config_path)?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    info!("Settings file: {:?}", config.data_path);
    info!("{} seeded session(s)", config.sessions.len());

    let state = Arc::new(AppState::new(config)?);

    pwalock_server::serve(state, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
    })
    .await?;

    info!("Server stopped");
    Ok(())
}
