//! End-to-end tests: a real server and real clients on a Unix socket.

use std::time::Duration;

use ipc_core::{ConnectionConfig, ConnectionState};
use ipc_peer::application::{run_echo, run_ping, serve};
use ipc_peer::infrastructure::LocalSocketListener;
use ipc_peer::PeerError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

/// A unique socket path under the temp directory.
fn scratch_endpoint() -> String {
    let tag = unique_tag();
    std::env::temp_dir()
        .join(format!("ipc-{tag}.sock"))
        .to_string_lossy()
        .into_owned()
}

fn unique_tag() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);
    format!("{:x}-{:x}", std::process::id(), NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Starts a server on `endpoint`; send on the returned channel to stop it.
fn start_server(endpoint: &str) -> (oneshot::Sender<()>, JoinHandle<Result<usize, PeerError>>) {
    let listener = LocalSocketListener::bind(endpoint).expect("bind scratch socket");
    let config = ConnectionConfig::for_endpoint(endpoint);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, config, async move {
        let _ = stop_rx.await;
    }));
    (stop_tx, server)
}

#[tokio::test]
async fn test_ping_receives_every_pong() {
    // Arrange
    let endpoint = scratch_endpoint();
    let (stop, server) = start_server(&endpoint);

    // Act
    let report = timeout(WAIT, run_ping(ConnectionConfig::for_endpoint(&endpoint), 5, false))
        .await
        .expect("ping finishes in time")
        .expect("ping succeeds");

    // Assert
    assert_eq!(report.sent, 5);
    assert_eq!(report.received, 5);

    let _ = stop.send(());
    let served = timeout(WAIT, server).await.unwrap().unwrap().unwrap();
    assert_eq!(served, 1);
}

#[tokio::test]
async fn test_echo_returns_the_same_text() {
    let endpoint = scratch_endpoint();
    let (stop, server) = start_server(&endpoint);

    let reply = timeout(
        WAIT,
        run_echo(ConnectionConfig::for_endpoint(&endpoint), "hello".to_string()),
    )
    .await
    .expect("echo finishes in time")
    .expect("echo succeeds");

    assert_eq!(reply, "hello");
    let _ = stop.send(());
    timeout(WAIT, server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_large_echo_survives_fragmentation() {
    // Arrange – far larger than one socket read chunk
    let endpoint = scratch_endpoint();
    let (stop, server) = start_server(&endpoint);
    let text: String = "0123456789abcdef".repeat(64 * 1024);

    // Act
    let reply = timeout(
        WAIT,
        run_echo(ConnectionConfig::for_endpoint(&endpoint), text.clone()),
    )
    .await
    .expect("echo finishes in time")
    .expect("echo succeeds");

    // Assert
    assert_eq!(reply.len(), text.len());
    assert_eq!(reply, text);
    let _ = stop.send(());
    timeout(WAIT, server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_command_stops_the_server() {
    // Arrange
    let endpoint = scratch_endpoint();
    let (_stop, server) = start_server(&endpoint);

    // Act
    let report = timeout(WAIT, run_ping(ConnectionConfig::for_endpoint(&endpoint), 3, true))
        .await
        .expect("ping finishes in time")
        .expect("ping succeeds");

    // Assert – the server returns on its own, without the stop signal
    assert_eq!(report.received, 3);
    let served = timeout(WAIT, server)
        .await
        .expect("server stops after Shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(served, 1);
    assert!(!std::path::Path::new(&endpoint).exists(), "socket file removed");
}

#[tokio::test]
async fn test_connecting_to_missing_endpoint_fails() {
    let endpoint = scratch_endpoint();

    let result = timeout(WAIT, run_ping(ConnectionConfig::for_endpoint(&endpoint), 1, false))
        .await
        .expect("failure is reported in time");

    assert!(matches!(
        result,
        Err(PeerError::ConnectionLost {
            state: ConnectionState::Error
        })
    ));
}

#[tokio::test]
async fn test_sequential_clients_share_one_server() {
    let endpoint = scratch_endpoint();
    let (stop, server) = start_server(&endpoint);

    for round in 0..3 {
        let text = format!("round {round}");
        let reply = timeout(
            WAIT,
            run_echo(ConnectionConfig::for_endpoint(&endpoint), text.clone()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reply, text);
    }

    let _ = stop.send(());
    let served = timeout(WAIT, server).await.unwrap().unwrap().unwrap();
    assert_eq!(served, 3);
}
