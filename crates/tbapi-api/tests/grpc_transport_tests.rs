//! gRPC Transport Layer Integration Tests
//!
//! These tests start an actual gRPC server and talk to it over the network:
//! - Service responses over the wire
//! - Health check and reflection services
//! - Graceful shutdown, including draining buffered transfers
//!
//! `src/grpc/tests.rs` covers the service trait directly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tonic::transport::Channel;

use tbapi_api::grpc::{run_grpc_server_with_shutdown, GrpcServerConfig, TigerBeetleService};
use tbapi_api::proto::tbapi::v1::tiger_beetle_client::TigerBeetleClient;
use tbapi_api::proto::tbapi::v1::*;
use tbapi_ledger::MemoryLedger;
use tbapi_server::config::BufferSettings;

/// Timeout for server startup and shutdown in tests.
const SERVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for client operations in tests.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

type ServerHandle = tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>;

/// Find an available port for testing by binding to port 0.
fn find_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn local_addr() -> SocketAddr {
    format!("127.0.0.1:{}", find_available_port())
        .parse()
        .unwrap()
}

fn service(buffer: BufferSettings) -> TigerBeetleService<MemoryLedger> {
    TigerBeetleService::new(Arc::new(MemoryLedger::new()), &buffer).unwrap()
}

/// Start a gRPC server; sending on the returned channel stops it.
async fn start_test_server(
    service: TigerBeetleService<MemoryLedger>,
    addr: SocketAddr,
    config: GrpcServerConfig,
) -> (ServerHandle, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };
        run_grpc_server_with_shutdown(service, addr, config, shutdown_signal).await
    });

    // Give the server a moment to bind
    tokio::time::sleep(Duration::from_millis(100)).await;

    (handle, shutdown_tx)
}

async fn create_channel(addr: SocketAddr) -> Result<Channel, tonic::transport::Error> {
    Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
}

async fn create_client(
    addr: SocketAddr,
) -> Result<TigerBeetleClient<Channel>, tonic::transport::Error> {
    Ok(TigerBeetleClient::new(create_channel(addr).await?))
}

fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        ledger: 1,
        code: 10,
        ..Default::default()
    }
}

fn transfer(id: &str, amount: u64) -> Transfer {
    Transfer {
        id: id.to_string(),
        debit_account_id: "1".to_string(),
        credit_account_id: "2".to_string(),
        amount,
        ledger: 1,
        code: 1,
        ..Default::default()
    }
}

// ============================================================================
// Section 1: Service over the network
// ============================================================================

#[tokio::test]
async fn test_accounts_and_transfers_over_grpc() {
    let addr = local_addr();
    let (handle, shutdown_tx) =
        start_test_server(service(BufferSettings::default()), addr, GrpcServerConfig::default())
            .await;

    let mut client = create_client(addr).await.expect("Should connect to server");

    let reply = client
        .create_accounts(CreateAccountsRequest {
            accounts: vec![account("1"), account("2")],
        })
        .await
        .unwrap()
        .into_inner();
    assert!(reply.results.is_empty());

    let reply = client
        .create_transfers(CreateTransfersRequest {
            transfers: vec![transfer("a", 10), transfer("a", 11)],
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.results.len(), 1);
    assert_eq!(reply.results[0].index, 1);
    assert_eq!(reply.results[0].result, "TransferExistsWithDifferentAmount");

    let accounts = client
        .lookup_accounts(LookupAccountsRequest {
            account_ids: vec!["1".to_string()],
        })
        .await
        .unwrap()
        .into_inner()
        .accounts;
    assert_eq!(accounts[0].debits_posted, 10);

    let status = client
        .create_transfers(CreateTransfersRequest { transfers: vec![] })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);

    let _ = shutdown_tx.send(());
    let result = timeout(SERVER_TIMEOUT, handle).await;
    assert!(result.is_ok(), "Server should shutdown within timeout");
}

#[tokio::test]
async fn test_concurrent_clients_are_coalesced() {
    let addr = local_addr();
    let buffer = BufferSettings {
        enabled: true,
        capacity: 4,
        delay_ms: 50,
    };
    let service = service(buffer);
    let writer = service.transfer_writer();
    let (handle, shutdown_tx) = start_test_server(service, addr, GrpcServerConfig::default()).await;

    let mut client = create_client(addr).await.unwrap();
    client
        .create_accounts(CreateAccountsRequest {
            accounts: vec![account("1"), account("2")],
        })
        .await
        .unwrap();

    let requests = (0..8).map(|i| {
        let mut client = client.clone();
        async move {
            client
                .create_transfers(CreateTransfersRequest {
                    transfers: vec![transfer(&format!("{:x}", 100 + i), 1)],
                })
                .await
        }
    });
    let replies = timeout(CLIENT_TIMEOUT, futures::future::join_all(requests))
        .await
        .expect("Requests should complete within timeout");

    for reply in replies {
        assert!(reply.unwrap().into_inner().results.is_empty());
    }

    let stats = writer.stats().unwrap();
    assert_eq!(stats.items_flushed, 8);
    assert!(stats.batches_flushed < 8, "requests should share batches");

    let accounts = client
        .lookup_accounts(LookupAccountsRequest {
            account_ids: vec!["2".to_string()],
        })
        .await
        .unwrap()
        .into_inner()
        .accounts;
    assert_eq!(accounts[0].credits_posted, 8);

    let _ = shutdown_tx.send(());
    let _ = timeout(SERVER_TIMEOUT, handle).await;
}

// ============================================================================
// Section 2: Health Check Service Tests
// ============================================================================

#[tokio::test]
async fn test_grpc_health_check_service_enabled() {
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    let addr = local_addr();
    let config = GrpcServerConfig {
        reflection_enabled: false,
        health_check_enabled: true,
    };
    let (handle, shutdown_tx) =
        start_test_server(service(BufferSettings::default()), addr, config).await;

    let channel = create_channel(addr).await.expect("Should connect to server");
    let mut health_client = HealthClient::new(channel);

    for name in ["", "tbapi.v1.TigerBeetle"] {
        let response = timeout(
            CLIENT_TIMEOUT,
            health_client.check(HealthCheckRequest {
                service: name.to_string(),
            }),
        )
        .await
        .expect("Health check should complete within timeout")
        .expect("Health check should succeed");

        assert_eq!(
            response.into_inner().status,
            1,
            "{name:?} should be SERVING (status=1)"
        );
    }

    let _ = shutdown_tx.send(());
    let _ = timeout(SERVER_TIMEOUT, handle).await;
}

#[tokio::test]
async fn test_grpc_health_check_service_disabled() {
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    let addr = local_addr();
    let (handle, shutdown_tx) =
        start_test_server(service(BufferSettings::default()), addr, GrpcServerConfig::default())
            .await;

    let channel = create_channel(addr).await.expect("Should connect to server");
    let mut health_client = HealthClient::new(channel);

    let response = timeout(
        CLIENT_TIMEOUT,
        health_client.check(HealthCheckRequest {
            service: "tbapi.v1.TigerBeetle".to_string(),
        }),
    )
    .await;

    assert!(response.is_ok(), "Request should complete within timeout");
    assert!(
        response.unwrap().is_err(),
        "Health check should fail when disabled"
    );

    let _ = shutdown_tx.send(());
    let _ = timeout(SERVER_TIMEOUT, handle).await;
}

// ============================================================================
// Section 3: Reflection Service Tests
// ============================================================================

#[tokio::test]
async fn test_grpc_reflection_service_enabled() {
    let addr = local_addr();
    let config = GrpcServerConfig {
        reflection_enabled: true,
        health_check_enabled: false,
    };
    let (handle, shutdown_tx) =
        start_test_server(service(BufferSettings::default()), addr, config).await;

    // The server only starts if the descriptor set was accepted
    let mut client = create_client(addr)
        .await
        .expect("Should connect to server with reflection enabled");
    let reply = client.get_id(GetIdRequest {}).await;
    assert!(reply.is_ok());

    let _ = shutdown_tx.send(());
    let result = timeout(SERVER_TIMEOUT, handle).await;
    assert!(result.is_ok(), "Server should shutdown cleanly");
}

// ============================================================================
// Section 4: Graceful Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_graceful_shutdown() {
    let addr = local_addr();
    let (handle, shutdown_tx) =
        start_test_server(service(BufferSettings::default()), addr, GrpcServerConfig::default())
            .await;

    assert!(create_client(addr).await.is_ok());

    shutdown_tx.send(()).unwrap();
    let result = timeout(SERVER_TIMEOUT, handle)
        .await
        .expect("Server should shutdown within timeout")
        .expect("Server task should not panic");
    assert!(result.is_ok(), "Server should exit without error");

    // The port is released
    assert!(create_client(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_flushes_buffered_transfers() {
    let addr = local_addr();
    let buffer = BufferSettings {
        enabled: true,
        capacity: 100,
        // Far beyond the test timeouts: only the drain can answer
        delay_ms: 600_000,
    };
    let service = service(buffer);
    let writer = service.transfer_writer();
    let (handle, shutdown_tx) = start_test_server(service, addr, GrpcServerConfig::default()).await;

    let mut client = create_client(addr).await.unwrap();
    client
        .create_accounts(CreateAccountsRequest {
            accounts: vec![account("1"), account("2")],
        })
        .await
        .unwrap();

    let pending = tokio::spawn(async move {
        client
            .create_transfers(CreateTransfersRequest {
                transfers: vec![transfer("f", 3)],
            })
            .await
    });

    // Let the request reach the buffer
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!pending.is_finished());

    shutdown_tx.send(()).unwrap();

    let reply = timeout(CLIENT_TIMEOUT, pending)
        .await
        .expect("Buffered request should be answered on shutdown")
        .unwrap()
        .expect("Buffered request should succeed");
    assert!(reply.into_inner().results.is_empty());

    let stats = writer.stats().unwrap();
    assert_eq!(stats.batches_flushed, 1);
    assert_eq!(stats.deadline_flushes, 0);
    assert_eq!(stats.capacity_flushes, 0);

    let _ = timeout(SERVER_TIMEOUT, handle).await;
}
