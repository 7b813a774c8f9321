//! Trading dashboard simulator server
//!
//! REST and WebSocket backend that feeds a trading dashboard with synthetic
//! market data, model predictions and strategy status.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sim_server::config::{build_config, CliArgs as ConfigCliArgs, ServerConfig};
use sim_server::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Trading dashboard simulator - REST and WebSocket backend
#[derive(Parser, Debug)]
#[command(name = "sim_server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE", env = "SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long, env = "SIM_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SIM_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SIM_LOG_LEVEL")]
    log_level: Option<String>,
}

impl From<Args> for ConfigCliArgs {
    fn from(args: Args) -> Self {
        ConfigCliArgs {
            config_file: args.config,
            host: args.host,
            port: args.port,
            log_level: args.log_level,
        }
    }
}

fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_filter_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.environment.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn init_metrics(config: &ServerConfig) -> anyhow::Result<()> {
    let Some(port) = config.metrics_port else {
        return Ok(());
    };

    let addr: SocketAddr = format!("{}:{}", config.host, port)
        .parse()
        .with_context(|| format!("invalid metrics address {}:{}", config.host, port))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cli_args: ConfigCliArgs = args.into();
    let config = build_config(&cli_args).context("failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Dashboard simulator v{}", sim_server::VERSION);
    tracing::info!(
        host = %config.host,
        port = %config.port,
        log_level = %config.log_level,
        environment = %config.environment,
        tick_interval_secs = config.tick_interval_secs,
        subscriber_queue_capacity = config.subscriber_queue_capacity,
        metrics_port = ?config.metrics_port,
        "Server configuration loaded"
    );

    init_metrics(&config)?;

    let server = Server::new(config);
    tracing::info!(address = %server.socket_addr(), "Starting server");

    server.run().await.context("server error")?;

    Ok(())
}
