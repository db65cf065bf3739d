//! Integration tests for the TCP chat server.
//!
//! These tests run a real `ChatServer` on an ephemeral loopback port and
//! drive it through the client library, covering presence announcements,
//! renames, private and public messages, idle eviction, and shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use chat_client::ChatClient;
use chatd::config::ServerConfig;
use chatd::hub::spawn_hub;
use chatd::registry::{spawn_registry, RegistryHandle};
use chatd::server::ChatServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Idle window for servers that should never evict during a test
const LONG_IDLE: Duration = Duration::from_secs(30);

/// Idle window for eviction tests
const SHORT_IDLE: Duration = Duration::from_millis(300);

/// Maximum wait for any single expected line
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a client must stay quiet to count as "received nothing"
const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server on 127.0.0.1 with the given idle window.
    async fn spawn(idle_timeout: Duration) -> Self {
        let config = ServerConfig {
            port: 0,
            idle_timeout_ms: u64::try_from(idle_timeout.as_millis()).unwrap(),
            ..Default::default()
        };

        let registry = spawn_registry();
        let hub = spawn_hub(registry.clone(), config.hub_capacity);
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(&config, registry.clone(), hub, cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            registry,
            cancel_token,
        }
    }

    /// Connects a client and waits until it is online.
    async fn connect(&self) -> TestClient {
        let client = ChatClient::connect(&self.addr.to_string())
            .await
            .expect("connect to server");
        let name = client.local_addr().to_string();
        let mut client = TestClient { client, name };

        let online = client.online_line();
        client.recv_until(&online).await;
        client
    }

    /// Opens a raw socket without waiting for anything.
    async fn connect_raw(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.expect("connect raw")
    }

    /// Shuts down the server gracefully.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

/// Client connection with assertion helpers.
struct TestClient {
    client: ChatClient,
    /// Default display name (the client's address as the server sees it)
    name: String,
}

impl TestClient {
    fn online_line(&self) -> String {
        format!("[{0}]{0}: is online", self.name)
    }

    fn offline_line(&self) -> String {
        format!("[{0}]{0}: is offline", self.name)
    }

    async fn send(&mut self, line: &str) {
        self.client.send_line(line).await.expect("send line");
    }

    /// Receives the next line, failing the test if none arrives.
    async fn recv(&mut self) -> String {
        timeout(RECV_TIMEOUT, self.client.recv_line())
            .await
            .expect("line within timeout")
            .expect("read line")
            .expect("connection open")
    }

    /// Skips lines until `expected` arrives.
    async fn recv_until(&mut self, expected: &str) {
        let deadline = Instant::now() + RECV_TIMEOUT;
        loop {
            let line = timeout(deadline.saturating_duration_since(Instant::now()), self.client.recv_line())
                .await
                .unwrap_or_else(|_| panic!("never received {expected:?}"))
                .expect("read line")
                .unwrap_or_else(|| panic!("closed before {expected:?}"));
            if line == expected {
                return;
            }
        }
    }

    /// Discards whatever arrives until the connection goes quiet.
    async fn drain(&mut self) {
        while let Ok(Ok(Some(_))) = timeout(QUIET_PERIOD, self.client.recv_line()).await {}
    }

    /// Asserts nothing arrives for a while.
    async fn assert_silent(&mut self) {
        let result = timeout(QUIET_PERIOD, self.client.recv_line()).await;
        assert!(result.is_err(), "expected silence, got {result:?}");
    }

    /// Reads until the server closes the connection.
    async fn expect_closed(&mut self) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            match timeout(RECV_TIMEOUT, self.client.recv_line())
                .await
                .expect("connection closed within timeout")
            {
                Ok(Some(line)) => seen.push(line),
                Ok(None) | Err(_) => return seen,
            }
        }
    }
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_online_notice_uses_address_identity() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let bob = server.connect().await;

    // Existing users see the newcomer under its address.
    alice.recv_until(&bob.online_line()).await;

    let online = server.registry.snapshot().await;
    assert_eq!(online.len(), 2);
    assert!(online.iter().all(|entry| entry.name == entry.addr));

    server.shutdown().await;
}

#[tokio::test]
async fn test_who_lists_everyone_sorted() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    alice.send("rename|alice").await;
    alice.recv_until("Update user name to alice.").await;
    bob.send("rename|bob").await;
    bob.recv_until("Update user name to bob.").await;
    alice.drain().await;

    alice.send("who").await;
    assert_eq!(alice.recv().await, format!("[{}]alice is online.", alice.name));
    assert_eq!(alice.recv().await, format!("[{}]bob is online.", bob.name));
    alice.assert_silent().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_announces_offline_once() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let bob = server.connect().await;
    alice.drain().await;

    let offline = bob.offline_line();
    drop(bob);

    alice.recv_until(&offline).await;
    alice.assert_silent().await;
    assert_eq!(server.registry.snapshot().await.len(), 1);

    server.shutdown().await;
}

// ============================================================================
// Rename
// ============================================================================

#[tokio::test]
async fn test_rename_conflict_keeps_old_name() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    alice.send("rename|alice").await;
    alice.recv_until("Update user name to alice.").await;

    bob.drain().await;
    bob.send("rename|alice").await;
    assert_eq!(bob.recv().await, "The new name has been used.");

    assert!(server.registry.lookup(bob.name.clone()).await.is_ok());
    assert_eq!(server.registry.lookup("alice").await.unwrap().addr, alice.name);

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_renames_have_one_winner() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut clients = Vec::new();
    for _ in 0..8 {
        clients.push(server.connect().await);
    }
    for client in clients.iter_mut() {
        client.drain().await;
    }

    for client in clients.iter_mut() {
        client.send("rename|popular").await;
    }

    let mut winners = 0;
    let mut losers = 0;
    for client in clients.iter_mut() {
        match client.recv().await.as_str() {
            "Update user name to popular." => winners += 1,
            "The new name has been used." => losers += 1,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(losers, 7);
    assert_eq!(server.registry.snapshot().await.len(), 8);

    server.shutdown().await;
}

#[tokio::test]
async fn test_renamed_user_goes_offline_under_new_name() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    bob.send("rename|bob").await;
    bob.recv_until("Update user name to bob.").await;
    alice.drain().await;

    let addr = bob.name.clone();
    drop(bob);

    alice.recv_until(&format!("[{addr}]bob: is offline")).await;
    assert!(server.registry.lookup("bob").await.is_err());

    server.shutdown().await;
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn test_private_message_and_unknown_user() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    let mut carol = server.connect().await;
    alice.send("rename|alice").await;
    alice.recv_until("Update user name to alice.").await;
    bob.send("rename|bob").await;
    bob.recv_until("Update user name to bob.").await;
    alice.drain().await;
    bob.drain().await;
    carol.drain().await;

    alice.send("to|bob|secret").await;
    assert_eq!(bob.recv().await, "alice say: secret");
    carol.assert_silent().await;
    alice.assert_silent().await;

    alice.send("to|dave|hello?").await;
    assert_eq!(alice.recv().await, "User dave is not exist.");
    bob.assert_silent().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_public_message_reaches_everyone() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    alice.drain().await;

    alice.send("hello everyone").await;
    let expected = format!("[{0}]{0}: hello everyone", alice.name);
    assert_eq!(bob.recv().await, expected);
    assert_eq!(alice.recv().await, expected);

    server.shutdown().await;
}

#[tokio::test]
async fn test_messages_from_one_sender_arrive_in_order() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    alice.drain().await;

    for i in 0..50 {
        alice.send(&format!("message {i}")).await;
    }

    for i in 0..50 {
        assert_eq!(bob.recv().await, format!("[{0}]{0}: message {i}", alice.name));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_commands_are_reported_to_sender_only() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    alice.drain().await;

    alice.send("to|bob").await;
    assert_eq!(alice.recv().await, "Msg format error, please use to|name|content");

    alice.send(&format!("to|{}|", bob.name)).await;
    assert_eq!(alice.recv().await, "Msg is empty.");

    alice.send("rename|a|b").await;
    assert_eq!(alice.recv().await, "Rename format error, please use rename|name");

    bob.assert_silent().await;

    server.shutdown().await;
}

// ============================================================================
// Framing
// ============================================================================

#[tokio::test]
async fn test_crlf_terminated_commands() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut raw = BufReader::new(server.connect_raw().await);
    let mut line = String::new();
    raw.read_line(&mut line).await.unwrap();
    assert!(line.ends_with(": is online\n"));

    raw.get_mut().write_all(b"who\r\n").await.unwrap();
    line.clear();
    raw.read_line(&mut line).await.unwrap();
    assert!(line.ends_with(" is online.\n"), "got {line:?}");

    server.shutdown().await;
}

#[tokio::test]
async fn test_overlong_line_is_rejected_but_session_survives() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let huge = "x".repeat(chat_protocol::MAX_LINE_LENGTH + 10);
    alice.send(&huge).await;
    assert_eq!(alice.recv().await, "Line too long (max: 65536 bytes).");

    alice.send("who").await;
    assert_eq!(alice.recv().await, format!("[{0}]{0} is online.", alice.name));

    server.shutdown().await;
}

#[tokio::test]
async fn test_final_unterminated_line_is_handled() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut alice = server.connect().await;
    let mut raw = BufReader::new(server.connect_raw().await);
    let mut line = String::new();
    raw.read_line(&mut line).await.unwrap();
    alice.drain().await;

    raw.get_mut().write_all(b"last words").await.unwrap();
    raw.get_mut().shutdown().await.unwrap();

    let addr = raw.get_ref().local_addr().unwrap();
    alice.recv_until(&format!("[{addr}]{addr}: last words")).await;
    alice.recv_until(&format!("[{addr}]{addr}: is offline")).await;

    server.shutdown().await;
}

// ============================================================================
// Idle Eviction
// ============================================================================

#[tokio::test]
async fn test_silent_client_is_evicted() {
    let server = TestServer::spawn(SHORT_IDLE).await;

    let mut quiet = server.connect().await;
    let started = Instant::now();

    let seen = quiet.expect_closed().await;
    assert!(started.elapsed() >= SHORT_IDLE - Duration::from_millis(50));
    assert_eq!(seen.last().map(String::as_str), Some("You will be offline."));
    assert!(server.registry.lookup(quiet.name.clone()).await.is_err());

    server.shutdown().await;
}

#[tokio::test]
async fn test_others_see_evicted_client_go_offline() {
    let server = TestServer::spawn(SHORT_IDLE).await;

    let quiet = server.connect().await;
    let mut watcher = server.connect().await;

    let offline = quiet.offline_line();
    // The watcher keeps itself alive while waiting.
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        assert!(Instant::now() < deadline, "never saw {offline:?}");
        watcher.send("who").await;
        let mut seen = false;
        while let Ok(Ok(Some(line))) = timeout(Duration::from_millis(100), watcher.client.recv_line()).await {
            if line == offline {
                seen = true;
            }
        }
        if seen {
            break;
        }
    }

    assert_eq!(server.registry.snapshot().await.len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_active_client_stays_online() {
    let server = TestServer::spawn(SHORT_IDLE).await;

    let mut chatty = server.connect().await;
    for i in 0..8 {
        chatty.send(&format!("ping {i}")).await;
        sleep(SHORT_IDLE / 3).await;
    }

    chatty.send("who").await;
    chatty
        .recv_until(&format!("[{0}]{0} is online.", chatty.name))
        .await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_partial_line_counts_as_activity() {
    let server = TestServer::spawn(SHORT_IDLE).await;

    let mut raw = BufReader::new(server.connect_raw().await);
    let mut line = String::new();
    raw.read_line(&mut line).await.unwrap();

    for _ in 0..6 {
        raw.get_mut().write_all(b"ab").await.unwrap();
        sleep(SHORT_IDLE / 3).await;
    }
    raw.get_mut().write_all(b"\n").await.unwrap();

    line.clear();
    raw.read_line(&mut line).await.unwrap();
    assert!(line.ends_with(&format!(": {}\n", "ab".repeat(6))), "got {line:?}");

    server.shutdown().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_disconnects_clients() {
    let server = TestServer::spawn(LONG_IDLE).await;
    let registry = server.registry.clone();

    let mut alice = server.connect().await;
    server.shutdown().await;

    alice.expect_closed().await;
    assert!(registry.snapshot().await.is_empty());
}
