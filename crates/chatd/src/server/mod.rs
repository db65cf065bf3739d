//! TCP server for the chat daemon.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a `Session` for each client
//! - Hands every session the registry and hub capabilities
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │     Session     │────▶│  RegistryHandle │
//! │   (per client)  │     └─────────────────┘
//! └───────┬─────────┘
//!         │ publish
//!         ▼
//! ┌─────────────────┐
//! │    HubHandle    │──▶ every Mailbox
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the server keeps accepting

mod session;

pub use session::{ConnectionError, OfflineReason, Session, SessionContext};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::hub::HubHandle;
use crate::registry::{RegistryHandle, SessionId};

/// How long shutdown waits for sessions to say goodbye
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP chat server.
///
/// Owns the listener and spawns one session task per connection.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Capabilities handed to every session
    ctx: SessionContext,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating session IDs
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        registry: RegistryHandle,
        hub: HubHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.ip.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr(),
                source,
            })?;

        let ctx = SessionContext {
            registry,
            hub,
            idle_timeout: config.idle_timeout(),
            mailbox_capacity: config.mailbox_capacity.max(1),
        };

        Ok(Self {
            listener,
            ctx,
            cancel_token,
            connection_counter: AtomicU64::new(1),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// waits (bounded) for every session to go offline.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr()?,
            idle_timeout = ?self.ctx.idle_timeout,
            "Chat server listening"
        );

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let id = SessionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));
                            debug!(id = %id, peer = %peer, "Accepted connection");

                            let ctx = self.ctx.clone();
                            let cancel = self.cancel_token.child_token();
                            sessions.spawn(async move {
                                match Session::run(stream, id, ctx, cancel).await {
                                    Ok(reason) => debug!(id = %id, reason = %reason, "Session ended"),
                                    Err(e) => debug!(id = %id, error = %e, "Session failed"),
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        drop(self.listener);
        Self::drain_sessions(sessions).await;
        info!("Server shutdown complete");
        Ok(())
    }

    async fn drain_sessions(mut sessions: JoinSet<()>) {
        let remaining = sessions.len();
        if remaining == 0 {
            return;
        }

        debug!(sessions = remaining, "Waiting for sessions to go offline");
        let drained = timeout(SHUTDOWN_GRACE_PERIOD, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(sessions = sessions.len(), "Sessions still running after grace period, aborting");
            sessions.abort_all();
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}
