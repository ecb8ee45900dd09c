//! tbapi server binary
//!
//! gRPC gateway in front of a TigerBeetle-style ledger.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! tbapi --config config.yaml
//!
//! # With environment variables only
//! TBAPI_BUFFER__ENABLED=true TBAPI_SERVER__PORT=50051 tbapi
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use tbapi_api::grpc::{run_grpc_server_with_shutdown, GrpcServerConfig, TigerBeetleService};
use tbapi_api::observability::{init_logging, LoggingConfig};
use tbapi_ledger::{Ledger, MemoryLedger};
use tbapi_server::ServerConfig;

/// tbapi - gRPC gateway with request-coalescing transfer writes
#[derive(Parser, Debug)]
#[command(name = "tbapi")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::from_env()?,
    };

    init_logging(LoggingConfig::from_settings(&config.logging));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %config.ledger.backend,
        "Starting tbapi"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    match config.ledger.backend.as_str() {
        "memory" => {
            info!("Using in-memory ledger");
            serve(Arc::new(MemoryLedger::new()), addr, &config).await
        }
        other => {
            error!("Unknown ledger backend: {}", other);
            anyhow::bail!("Unknown ledger backend: {}", other);
        }
    }
}

async fn serve<L: Ledger>(
    ledger: Arc<L>,
    addr: SocketAddr,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let service = TigerBeetleService::new(ledger, &config.buffer)?;
    let grpc_config = GrpcServerConfig::from(&config.grpc);

    run_grpc_server_with_shutdown(service, addr, grpc_config, shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("gRPC server error: {}", e))?;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_config_path() {
        let args = Args::try_parse_from(["tbapi", "--config", "tbapi.yaml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("tbapi.yaml"));

        let args = Args::try_parse_from(["tbapi", "-c", "other.yaml"]).unwrap();
        assert_eq!(args.config.as_deref(), Some("other.yaml"));
    }

    #[test]
    fn test_cli_config_is_optional() {
        let args = Args::try_parse_from(["tbapi"]).unwrap();
        assert!(args.config.is_none());
    }

    #[test]
    fn test_cli_rejects_unknown_flags() {
        assert!(Args::try_parse_from(["tbapi", "--port", "1"]).is_err());
    }
}
