//! Session handling for individual client connections.
//!
//! Each accepted connection gets its own `Session` that:
//! - Registers under its remote address and announces itself
//! - Reads inbound lines and interprets them as commands
//! - Drains its mailbox to the socket from a dedicated writer task
//! - Goes offline on EOF, read/write failure, idle timeout, or shutdown
//!
//! ```text
//!             ┌──────────── Session ────────────┐
//!  socket ──▶ │ read duty ── Command::parse ──┐ │
//!   (read)    │   ▲ idle deadline             │ │──▶ RegistryHandle / HubHandle
//!             │                               ▼ │
//!  socket ◀── │ drain duty ◀── Mailbox ◀── producers (hub, other sessions)
//!   (write)   └─────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in the session going offline

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chat_protocol::{
    Command, Inbound, LineCodec, ServerLine, IDLE_TIMEOUT_NOTICE, OFFLINE, ONLINE,
};

use crate::hub::{BroadcastMessage, HubHandle};
use crate::mailbox::{mailbox, DeliveryError, Mailbox, MailboxReceiver};
use crate::registry::{RegistryError, RegistryHandle, SessionHandle, SessionId};

/// Write timeout for a single outbound line (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// What a session needs from the rest of the server.
///
/// Sessions get these capabilities at construction instead of a reference
/// back to the server.
#[derive(Clone)]
pub struct SessionContext {
    /// Presence registry
    pub registry: RegistryHandle,

    /// Public message hub
    pub hub: HubHandle,

    /// Inactivity window before eviction
    pub idle_timeout: Duration,

    /// Mailbox capacity for each session
    pub mailbox_capacity: usize,
}

/// Why a session went offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReason {
    /// The client closed the connection.
    Closed,

    /// Reading from the socket failed.
    ReadError,

    /// No inbound bytes within the idle window.
    IdleTimeout,

    /// Writing to the socket failed or timed out.
    WriteFailed,

    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for OfflineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "client closed connection"),
            Self::ReadError => write!(f, "read error"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Server-side state of one connected client.
pub struct Session {
    /// Connection identifier
    id: SessionId,

    /// Remote address
    addr: String,

    /// Current display name (registry key)
    name: String,

    /// Own outbound queue
    mailbox: Mailbox,

    /// Registry and hub capabilities
    ctx: SessionContext,

    /// Cancelled when the server shuts down
    cancel: CancellationToken,
}

impl Session {
    fn new(
        id: SessionId,
        addr: String,
        mailbox: Mailbox,
        ctx: SessionContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            name: addr.clone(),
            addr,
            mailbox,
            ctx,
            cancel,
        }
    }

    /// Runs a session over `stream` until it goes offline.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Io` if the peer address cannot be read
    /// - `ConnectionError::Registry` if the session could not be registered
    pub async fn run(
        stream: TcpStream,
        id: SessionId,
        ctx: SessionContext,
        cancel: CancellationToken,
    ) -> Result<OfflineReason, ConnectionError> {
        let addr = stream.peer_addr()?.to_string();
        let (reader, writer) = stream.into_split();

        let (mailbox, mailbox_rx) = mailbox(ctx.mailbox_capacity);
        let close = CancellationToken::new();
        let mut drain = tokio::spawn(drain_mailbox(writer, mailbox_rx, close.clone(), id));

        let mut session = Session::new(id, addr, mailbox, ctx, cancel);

        if let Err(e) = session.go_online().await {
            warn!(id = %id, addr = %session.addr, error = %e, "Session could not go online");
            let notice = format!("Cannot join: {e}");
            session.notify(ServerLine::Notice(&notice)).await;
            drop(session);
            close.cancel();
            finish_drain(drain, id).await;
            return Err(ConnectionError::Registry(e));
        }

        let reason = session.read_loop(reader, &mut drain).await;
        session.go_offline(reason).await;
        drop(session);

        if reason != OfflineReason::WriteFailed {
            close.cancel();
            finish_drain(drain, id).await;
        }

        Ok(reason)
    }

    /// Returns the current display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Registers under the remote address (or `addr#id` if that is taken)
    /// and announces the session.
    async fn go_online(&mut self) -> Result<(), RegistryError> {
        let handle = SessionHandle::new(self.id, self.addr.clone(), self.mailbox.clone());
        let candidates = [self.addr.clone(), format!("{}#{}", self.addr, self.id)];
        let mut last_error = RegistryError::NameConflict(self.addr.clone());

        for name in candidates {
            match self.ctx.registry.register(name.clone(), handle.clone()).await {
                Ok(()) => {
                    self.name = name;
                    info!(id = %self.id, name = %self.name, addr = %self.addr, "Session online");
                    self.publish(ONLINE).await;
                    return Ok(());
                }
                Err(RegistryError::NameConflict(taken)) => {
                    debug!(id = %self.id, name = %taken, "Default name taken");
                    last_error = RegistryError::NameConflict(taken);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    /// Unregisters and announces departure.
    ///
    /// The announcement is only published if this call actually removed the
    /// entry, so a session is reported offline at most once.
    async fn go_offline(&mut self, reason: OfflineReason) {
        if reason == OfflineReason::IdleTimeout {
            self.notify(ServerLine::Notice(IDLE_TIMEOUT_NOTICE)).await;
        }

        if self.ctx.registry.unregister(self.name.clone(), self.id).await {
            self.publish(OFFLINE).await;
        }

        info!(id = %self.id, name = %self.name, reason = %reason, "Session offline");
    }

    // ========================================================================
    // Read Duty
    // ========================================================================

    /// Reads frames until the connection ends, the idle deadline passes,
    /// the drain duty fails, or the server shuts down.
    ///
    /// Any inbound bytes push the deadline out, including partial and
    /// malformed lines.
    async fn read_loop(&mut self, reader: OwnedReadHalf, drain: &mut JoinHandle<()>) -> OfflineReason {
        let mut frames = FramedRead::new(reader, LineCodec::new());
        let idle = sleep(self.ctx.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return OfflineReason::Shutdown,

                _ = &mut idle => {
                    debug!(id = %self.id, name = %self.name, "Idle deadline reached");
                    return OfflineReason::IdleTimeout;
                }

                _ = &mut *drain => return OfflineReason::WriteFailed,

                frame = frames.next() => {
                    idle.as_mut().reset(Instant::now() + self.ctx.idle_timeout);

                    match frame {
                        None => return OfflineReason::Closed,
                        Some(Err(e)) => {
                            debug!(id = %self.id, error = %e, "Read failed");
                            return OfflineReason::ReadError;
                        }
                        Some(Ok(Inbound::Line(line))) => self.handle_line(&line).await,
                        Some(Ok(Inbound::Partial)) => {}
                        Some(Ok(Inbound::TooLong)) => {
                            let max = frames.decoder().max_length();
                            self.notify(ServerLine::LineTooLong { max }).await;
                        }
                        Some(Ok(Inbound::InvalidUtf8)) => self.notify(ServerLine::InvalidUtf8).await,
                    }
                }
            }
        }
    }

    // ========================================================================
    // Command Interpreter
    // ========================================================================

    /// Interprets one inbound line.
    async fn handle_line(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(Command::Who) => self.handle_who().await,
            Ok(Command::Rename { name }) => self.handle_rename(name).await,
            Ok(Command::Private { to, content }) => self.handle_private(to, content).await,
            Ok(Command::Public { text }) => self.publish(text).await,
            Err(e) => {
                debug!(id = %self.id, error = %e, "Malformed command");
                let notice = e.to_string();
                self.notify(ServerLine::Notice(&notice)).await;
            }
        }
    }

    async fn handle_who(&self) {
        for entry in self.ctx.registry.snapshot().await {
            self.notify(ServerLine::Presence {
                addr: &entry.addr,
                name: &entry.name,
            })
            .await;
        }
    }

    async fn handle_rename(&mut self, new_name: &str) {
        match self
            .ctx
            .registry
            .rename(self.name.clone(), new_name, self.id)
            .await
        {
            Ok(()) => {
                self.name = new_name.to_string();
                self.notify(ServerLine::Renamed { name: new_name }).await;
            }
            Err(RegistryError::NameConflict(_)) => self.notify(ServerLine::NameTaken).await,
            Err(e) => {
                warn!(id = %self.id, name = %self.name, error = %e, "Rename failed");
                let notice = format!("Rename failed: {e}");
                self.notify(ServerLine::Notice(&notice)).await;
            }
        }
    }

    async fn handle_private(&self, to: &str, content: &str) {
        let recipient = match self.ctx.registry.lookup(to).await {
            Ok(recipient) => recipient,
            Err(RegistryError::NotFound(_)) => {
                self.notify(ServerLine::UnknownUser { name: to }).await;
                return;
            }
            Err(e) => {
                warn!(id = %self.id, error = %e, "Recipient lookup failed");
                return;
            }
        };

        let line = ServerLine::Private {
            from: &self.name,
            content,
        };
        match recipient.mailbox.deliver(line.to_string()) {
            Ok(()) => {}
            Err(DeliveryError::Full) => {
                warn!(from = %self.name, to = %to, "Recipient mailbox full, private message dropped");
                self.notify(ServerLine::Undelivered { name: to }).await;
            }
            Err(DeliveryError::Closed) => {
                debug!(from = %self.name, to = %to, "Recipient gone, private message dropped");
                self.notify(ServerLine::Undelivered { name: to }).await;
            }
        }
    }

    // ========================================================================
    // Outbound helpers
    // ========================================================================

    /// Queues a reply for this session's own client.
    ///
    /// Waits for room instead of dropping, so a reply is never cut short.
    /// A stalled client cannot hold this forever: the drain duty gives up
    /// after `WRITE_TIMEOUT` and the mailbox closes.
    async fn notify(&self, line: ServerLine<'_>) {
        if let Err(e) = self.mailbox.send(line.to_string()).await {
            debug!(id = %self.id, error = %e, "Reply dropped");
        }
    }

    /// Publishes a public message under the current name.
    async fn publish(&self, text: &str) {
        self.ctx
            .hub
            .publish(BroadcastMessage::new(&self.name, &self.addr, text))
            .await;
    }
}

// ============================================================================
// Drain Duty
// ============================================================================

/// Writes mailbox lines to the socket until the mailbox closes or `close`
/// is cancelled, then flushes what is still queued and shuts the write
/// half down. This task is the only writer of the connection.
async fn drain_mailbox(
    writer: OwnedWriteHalf,
    mut mailbox: MailboxReceiver,
    close: CancellationToken,
    id: SessionId,
) {
    let mut sink = FramedWrite::new(writer, LineCodec::new());

    let result = async {
        loop {
            tokio::select! {
                biased;

                line = mailbox.recv() => match line {
                    Some(line) => write_line(&mut sink, line).await?,
                    None => break,
                },

                _ = close.cancelled() => {
                    mailbox.close();
                    while let Ok(line) = mailbox.try_recv() {
                        write_line(&mut sink, line).await?;
                    }
                    break;
                }
            }
        }

        timeout(WRITE_TIMEOUT, SinkExt::<String>::close(&mut sink))
            .await
            .map_err(|_| ConnectionError::WriteTimeout)??;
        Ok::<(), ConnectionError>(())
    }
    .await;

    match result {
        Ok(()) => debug!(id = %id, "Drain finished"),
        Err(e) => debug!(id = %id, error = %e, "Drain stopped"),
    }
}

async fn write_line(
    sink: &mut FramedWrite<OwnedWriteHalf, LineCodec>,
    line: String,
) -> Result<(), ConnectionError> {
    match timeout(WRITE_TIMEOUT, sink.send(line)).await {
        Ok(result) => result.map_err(ConnectionError::from),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Waits for the drain duty to flush, aborting it if the client stalls.
async fn finish_drain(mut drain: JoinHandle<()>, id: SessionId) {
    if timeout(WRITE_TIMEOUT, &mut drain).await.is_err() {
        warn!(id = %id, "Drain did not finish in time, aborting");
        drain.abort();
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
