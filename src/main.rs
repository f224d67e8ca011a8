//! Veez.ai forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser                ┌──────────────────────────────────────────────┐
//!     ───────────────────────┼─▶ cors ─▶ request id ─▶ /api/* handler        │
//!                            │                          │                   │
//!                            │          normalize path ─┤                   │
//!                            │          classify body  ─┤                   │
//!                            │          transcode      ─┤                   │
//!                            │          dispatch  ──────┼───────────────────┼──▶ Veez.ai
//!     ◀──────────────────────┼── cors ◀── relay ◀───────┘◀──────────────────┼─── upstream
//!                            │                                              │
//!                            │  config · logging · metrics · shutdown       │
//!                            └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use veez_proxy::config::loader::{apply_env_overrides, read_config, set_port};
use veez_proxy::config::validation::validate_config;
use veez_proxy::config::{ConfigError, ProxyConfig};
use veez_proxy::lifecycle::{signals, Shutdown};
use veez_proxy::observability::{logging, metrics};
use veez_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "veez-proxy")]
#[command(about = "Format-preserving forwarding proxy for the Veez.ai API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "VEEZ_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port (overrides PORT and the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Full listen address, e.g. 127.0.0.1:3001
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("veez-proxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "veez-proxy starting");

    if !config.upstream.has_token() {
        tracing::warn!("No upstream token configured; requests without an Authorization header go out unauthenticated");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        encoding = ?config.upstream.encoding,
        default_timeout_secs = config.timeouts.default_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                    return ExitCode::FAILURE;
                }
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
                return ExitCode::FAILURE;
            }
        }
    }

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                bind_address = %config.listener.bind_address,
                error = %e,
                "Failed to bind listener"
            );
            return ExitCode::FAILURE;
        }
    };

    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream client");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(signals::listen(shutdown));

    if let Err(e) = server.run(listener, shutdown_rx).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Defaults, then the config file, then the environment, then CLI flags.
fn build_config(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    if let Some(port) = args.port {
        set_port(&mut config, port);
    }
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
