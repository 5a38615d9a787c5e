//! Gateway entry point: config, logging, wiring, serve loop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shellgate::config::{load_config, GatewayConfig};
use shellgate::dispatch::Dispatcher;
use shellgate::fetch::PassthroughProxy;
use shellgate::http::GatewayServer;
use shellgate::rewrite::{IdentityRewriter, RewritePipeline};
use shellgate::tokens::TokenStore;
use shellgate::transports::{NullBare, NullTunnel};

#[derive(Parser)]
#[command(version, about = "Browser-facing web gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shellgate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        static_root = %config.content.static_root.display(),
        cdn_rules = config.cdn.rules.len(),
        mounts = config.mounts.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => shellgate::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tokens = TokenStore::new(&config.tokens);
    let pipeline = RewritePipeline::new(Arc::new(IdentityRewriter), &config.content.pages_root);
    let proxy = Arc::new(PassthroughProxy::new(&config.cdn)?);
    let dispatcher = Arc::new(Dispatcher::new(&config, tokens, pipeline, proxy));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        port = local_addr.port(),
        version = env!("CARGO_PKG_VERSION"),
        "Website running"
    );

    // Transport collaborators are registered here when their crates are
    // linked in; the null implementations keep the gateway self-contained.
    let server = GatewayServer::new(dispatcher, Arc::new(NullBare), Arc::new(NullTunnel));
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
