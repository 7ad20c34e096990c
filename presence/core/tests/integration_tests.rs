//! Integration tests against a mock presence endpoint
//!
//! Each test binds a real Unix socket named like the desktop client's in a
//! temporary directory and plays the endpoint side of the protocol.
//! Tests cover:
//! - Handshake, activity update and remote close
//! - Candidate probing across occupied and missing slots
//! - Invalid client id handling
//! - Configuration file driving the client
//! - Reconnect against a restarted endpoint

#![cfg(unix)]

use std::io::Write;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::{NamedTempFile, TempDir};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

use presence_core::config::load_config_with_env;
use presence_core::transport::{Opcode, Transport};
use presence_core::{
    Activity, ClientConfig, ClientEvent, ConnectionState, DisconnectReason, EndpointAddress,
    PresenceError, RichClient,
};

const READY: &[u8] = br#"{"cmd":"DISPATCH","evt":"READY","data":{"v":1,"user":{"id":"1"}}}"#;

/// Accept one connection on `<dir>/discord-ipc-<slot>`
fn mock_endpoint(dir: &Path, slot: u8) -> JoinHandle<Transport> {
    let path = dir.join(format!("discord-ipc-{slot}"));
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        Transport::from_stream(EndpointAddress::new(path), Box::new(stream))
    })
}

/// Read the handshake and acknowledge it
async fn accept_handshake(endpoint: &mut Transport) -> serde_json::Value {
    let frame = endpoint.read().await.unwrap();
    assert_eq!(frame.opcode, Opcode::Handshake);
    endpoint.write(Opcode::Frame, Some(READY)).await.unwrap();
    serde_json::from_slice(&frame.payload).unwrap()
}

fn client_for(dir: &Path) -> RichClient {
    RichClient::new(ClientConfig::new("1234567890").with_endpoint_bases([dir]))
}

// =============================================================================
// Test 1: Full Session
// =============================================================================

#[tokio::test]
async fn test_handshake_update_and_remote_close() {
    let temp_dir = TempDir::new().unwrap();
    let server = mock_endpoint(temp_dir.path(), 0);
    let client = client_for(temp_dir.path());
    let mut events = client.subscribe();

    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let mut endpoint = server.await.unwrap();
    let handshake = accept_handshake(&mut endpoint).await;
    connecting.await.unwrap().unwrap();

    assert_eq!(
        handshake,
        serde_json::json!({"v": 1, "client_id": "1234567890"})
    );
    assert_eq!(events.recv().await.unwrap(), ClientEvent::Ready);
    assert_eq!(client.state(), ConnectionState::HandshakeComplete);

    let activity = Activity::builder().details("x").build().unwrap();
    client.update(Some(activity)).await.unwrap();

    let frame = endpoint.read().await.unwrap();
    assert_eq!(frame.opcode, Opcode::Frame);
    let command: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
    assert_eq!(command["cmd"], "SET_ACTIVITY");
    assert_eq!(command["args"]["pid"], std::process::id());
    assert_eq!(command["args"]["activity"]["details"], "x");
    assert!(command["nonce"].is_string());

    endpoint
        .write(Opcode::Close, Some(br#"{"code":1000,"message":"closing"}"#))
        .await
        .unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        ClientEvent::Disconnected {
            reason: DisconnectReason::ClosedByPeer("closing".to_string())
        }
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.shutdown().await;
    assert!(events.try_recv().is_err());
}

// =============================================================================
// Test 2: Candidate Probing
// =============================================================================

#[tokio::test]
async fn test_probing_skips_missing_slots() {
    let temp_dir = TempDir::new().unwrap();
    let server = mock_endpoint(temp_dir.path(), 3);
    let client = client_for(temp_dir.path());

    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let mut endpoint = server.await.unwrap();
    accept_handshake(&mut endpoint).await;
    connecting.await.unwrap().unwrap();

    let address = client.address().unwrap();
    assert_eq!(address.slot(), Some(3));
    assert_eq!(address.as_path(), temp_dir.path().join("discord-ipc-3"));
}

#[tokio::test]
async fn test_no_endpoint_leaves_client_disconnected() {
    let temp_dir = TempDir::new().unwrap();
    let client = client_for(temp_dir.path());

    let result = client.connect().await;
    assert!(matches!(result, Err(PresenceError::Transport(_))));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.address().is_none());
}

// =============================================================================
// Test 3: Invalid Client Id
// =============================================================================

#[tokio::test]
async fn test_invalid_client_id_then_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let server = mock_endpoint(temp_dir.path(), 0);
    let client = client_for(temp_dir.path());

    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let mut endpoint = server.await.unwrap();
    endpoint.read().await.unwrap();
    endpoint
        .write(
            Opcode::Frame,
            Some(br#"{"evt":"ERROR","data":{"code":4000,"message":"Invalid client ID"}}"#),
        )
        .await
        .unwrap();

    let result = connecting.await.unwrap();
    assert!(matches!(result, Err(PresenceError::InvalidClientId(_))));
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(matches!(
        client.update(None).await,
        Err(PresenceError::NotConnected)
    ));

    client.shutdown().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    let close = endpoint.read().await.unwrap();
    assert_eq!(close.opcode, Opcode::Close);
}

// =============================================================================
// Test 4: Configuration File
// =============================================================================

#[tokio::test]
async fn test_config_file_drives_client() {
    let temp_dir = TempDir::new().unwrap();
    let server = mock_endpoint(temp_dir.path(), 1);

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[client]\nclient_id = \"42\"\nwait_for_ready = false\n\n[ipc]\npaths = [{:?}]",
        temp_dir.path().display().to_string()
    )
    .unwrap();

    let config = load_config_with_env(Some(file.path().to_path_buf()), |_| None).unwrap();
    config.validate().unwrap();
    let client = RichClient::new(config);
    let mut events = client.subscribe();

    // Returns before the acknowledgement
    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    let mut endpoint = server.await.unwrap();
    let handshake = accept_handshake(&mut endpoint).await;
    assert_eq!(handshake["client_id"], "42");

    assert_eq!(events.recv().await.unwrap(), ClientEvent::Ready);
    assert_eq!(client.state(), ConnectionState::HandshakeComplete);
    client.shutdown().await;
}

// =============================================================================
// Test 5: Reconnect
// =============================================================================

#[tokio::test]
async fn test_reconnect_after_endpoint_restart() {
    let temp_dir = TempDir::new().unwrap();
    let first_server = mock_endpoint(temp_dir.path(), 0);
    let client = client_for(temp_dir.path());

    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let mut first = first_server.await.unwrap();
    accept_handshake(&mut first).await;
    connecting.await.unwrap().unwrap();

    // The endpoint moves to the next slot
    let second_server = mock_endpoint(temp_dir.path(), 1);
    std::fs::remove_file(temp_dir.path().join("discord-ipc-0")).unwrap();

    let reconnecting = tokio::spawn({
        let client = client.clone();
        async move { client.reconnect().await }
    });
    assert_eq!(first.read().await.unwrap().opcode, Opcode::Close);

    let mut second = second_server.await.unwrap();
    accept_handshake(&mut second).await;
    reconnecting.await.unwrap().unwrap();

    assert_eq!(client.address().and_then(|a| a.slot()), Some(1));
    client.clear().await.unwrap();
    let frame = second.read().await.unwrap();
    let command: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
    assert!(command["args"]["activity"].is_null());

    client.shutdown().await;
}
