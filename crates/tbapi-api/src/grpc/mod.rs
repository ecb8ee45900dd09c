//! gRPC surface of the gateway.
//!
//! ```text
//! gRPC Request → TigerBeetleService ─┬─ CreateTransfers → TransferWriter → Ledger
//!                                    └─ everything else ───────────────→ Ledger
//! ```

mod converters;
mod service;

use std::future::Future;
use std::net::SocketAddr;

use tbapi_ledger::Ledger;
use tbapi_server::config::GrpcSettings;
use tonic::transport::Server;
use tracing::info;

pub use converters::ConvertError;
pub use service::TigerBeetleService;

// Re-export the generated server for service registration
pub use crate::proto::tbapi::v1::tiger_beetle_server::TigerBeetleServer;

/// Optional services registered next to the gateway.
#[derive(Debug, Clone, Default)]
pub struct GrpcServerConfig {
    /// Serve `grpc.reflection.v1`
    pub reflection_enabled: bool,
    /// Serve `grpc.health.v1`, reporting the gateway as SERVING
    pub health_check_enabled: bool,
}

impl From<&GrpcSettings> for GrpcServerConfig {
    fn from(settings: &GrpcSettings) -> Self {
        Self {
            reflection_enabled: settings.reflection,
            health_check_enabled: settings.health_check,
        }
    }
}

/// Serves `service` on `addr` until `shutdown` resolves.
///
/// Once `shutdown` resolves, transfers still waiting in the write buffer are
/// flushed so their requests complete before the server stops.
pub async fn run_grpc_server_with_shutdown<L, F>(
    service: TigerBeetleService<L>,
    addr: SocketAddr,
    config: GrpcServerConfig,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    L: Ledger + ?Sized,
    F: Future<Output = ()> + Send,
{
    let writer = service.transfer_writer();

    let health_service = if config.health_check_enabled {
        let (mut reporter, health_service) = tonic_health::server::health_reporter();
        reporter
            .set_serving::<TigerBeetleServer<TigerBeetleService<L>>>()
            .await;
        Some(health_service)
    } else {
        None
    };

    let reflection_service = if config.reflection_enabled {
        Some(
            tonic_reflection::server::Builder::configure()
                .register_encoded_file_descriptor_set(crate::proto::tbapi::v1::FILE_DESCRIPTOR_SET)
                .build_v1()?,
        )
    } else {
        None
    };

    info!(
        %addr,
        reflection = config.reflection_enabled,
        health_check = config.health_check_enabled,
        buffered = writer.is_buffered(),
        "gRPC server listening"
    );

    let drain = {
        let writer = writer.clone();
        async move {
            shutdown.await;
            info!("Shutting down gRPC server, flushing buffered transfers");
            writer.flush_pending().await;
        }
    };

    Server::builder()
        .add_optional_service(health_service)
        .add_optional_service(reflection_service)
        .add_service(TigerBeetleServer::new(service))
        .serve_with_shutdown(addr, drain)
        .await?;

    if let Some(stats) = writer.stats() {
        info!(
            batches = stats.batches_flushed,
            items = stats.items_flushed,
            capacity_flushes = stats.capacity_flushes,
            deadline_flushes = stats.deadline_flushes,
            failed_batches = stats.failed_batches,
            "Write buffer totals"
        );
    }
    info!("gRPC server stopped");
    Ok(())
}
