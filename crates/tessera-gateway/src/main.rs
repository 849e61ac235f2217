//! Tessera - multi-region S3 routing gateway

use clap::Parser;
use tessera_gateway::{run_server, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(about = "S3 gateway routing requests to regional replica clusters")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "tessera.yaml", env = "TESSERA_CONFIG")]
    config: String,

    /// Address to listen on, overriding the configuration file
    #[arg(short, long, env = "TESSERA_LISTEN")]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "TESSERA_DEBUG")]
    debug: bool,

    /// Log as JSON lines
    #[arg(long, env = "TESSERA_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("tessera={log_level},synclog=info,tower_http=info").into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut config = GatewayConfig::from_file(&args.config)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    tracing::info!("Starting Tessera gateway on {}", config.listen);
    tracing::info!(
        "{} backends, {} regions, {} transport rules",
        config.backends.len(),
        config.regions.len(),
        config.transports.len()
    );

    run_server(config).await
}
