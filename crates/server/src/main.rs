//! porter gateway binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use porter_core::config::AppConfig;
use porter_server::bootstrap::build_state;
use porter_server::create_router;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// porter - authorization and resilient-access gateway for resumable uploads
#[derive(Parser, Debug)]
#[command(name = "porterd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PORTER_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration. The file is optional; `PORTER_` variables can
/// provide or override everything.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // PORTER_CONFIG only names the file.
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("PORTER_") && key != "PORTER_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: porterd --config /path/to/config.toml\n  \
             2. Environment variables: PORTER_AUTH__SHARED_SECRET=... \
             PORTER_NAMESPACES__ATTACHMENTS__STORAGE__TYPE=memory ... porterd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set PORTER_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("PORTER_").split("__"))
        .extract()
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("porter v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    porter_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let state = build_state(config.clone()).await?;
    tracing::info!(
        storage_retry_attempts = config.retry.storage.max_attempts,
        coordinator_retry_attempts = config.retry.coordinator.max_attempts,
        coordinator_deadline_secs = config.retry.coordinator_deadline_secs,
        cache_enabled = config.cache.enabled,
        "Gateway initialized"
    );

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
