//! Status proxy CLI
//!
//! Serves the cached status document, or checks one service once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use status_proxy::client::{StatusClient, DEFAULT_SERVICE_NAME};
use status_proxy::io::ReqwestHttpClient;
use status_proxy::status::format_availability;
use status_proxy::{load_config, Config, StatusProxyBuilder};
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser)]
#[command(name = "status-proxy")]
#[command(about = "Caching status proxy with HTML payload recovery")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config file)
    #[arg(long)]
    port: Option<u16>,

    /// Upstream status URL (overrides config file)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the status once and print one service's state
    Check {
        /// Public name of the service
        #[arg(short, long, default_value = DEFAULT_SERVICE_NAME)]
        service: String,

        /// Status URL to query (defaults to the configured upstream)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, port={:?}, upstream_url={:?}, log_level={:?}",
        args.config,
        args.port,
        args.upstream_url,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(upstream_url) = args.upstream_url {
        config.upstream.url = upstream_url;
    }

    match args.command {
        Some(Command::Check { service, url }) => check(&config, &service, url).await?,
        None => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: Config) -> status_proxy::Result<()> {
    tracing::info!("Starting status proxy for {}", config.upstream.url);

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
        }
        cancel_for_signal.cancel();
    });

    StatusProxyBuilder::new(config)
        .with_cancellation_token(cancel)
        .build()?
        .start()
        .await
}

async fn check(config: &Config, service: &str, url: Option<String>) -> status_proxy::Result<()> {
    config.validate()?;
    let url = url.unwrap_or_else(|| config.upstream.url.clone());
    let http = Arc::new(ReqwestHttpClient::new(config.upstream.user_agent.clone()));
    let timeout = Duration::from_secs(config.upstream.timeout_seconds);
    let client = StatusClient::new(url, timeout, http);

    let resource = client.fetch_service(service).await?;
    let status = resource.attributes.status;
    println!(
        "{}: {} ({})",
        resource.attributes.public_name,
        status.display_text(),
        format_availability(resource.attributes.availability)
    );
    Ok(())
}
