//! Registry metadata gateway server
//!
//! Run with: cargo run -p gateway --features cli -- --config gateway.toml

use std::net::SocketAddr;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::WrapErr;
use gateway::{GatewayBuilder, GatewayConfig, LogConfig, LogFormat, MemoryRegistry, Seed};
use metadata_store::MemoryStore;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Serve repository, tag and manifest metadata over HTTP.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Address to listen on, overriding the configuration file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// JSON seed file, overriding the configuration file.
    #[arg(long)]
    seed: Option<Utf8PathBuf>,
}

fn init_tracing(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_error::ErrorLayer::default());

    match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_path(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    init_tracing(&config.log);

    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(MemoryRegistry::new());

    if let Some(path) = &config.seed {
        Seed::from_path(path)?
            .apply(&store, &registry)
            .await
            .wrap_err_with(|| format!("seeding from {path}"))?;
    }

    let app = GatewayBuilder::new()
        .store(store)
        .backend(registry)
        .config(&config)
        .build();

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .wrap_err_with(|| format!("binding {}", config.listen))?;

    tracing::info!("Metadata gateway listening on http://{}", config.listen);
    tracing::info!("Try: curl http://{}/api/ping", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
