//! Per-session outbound mailbox.
//!
//! A bounded FIFO of outbound lines with exactly one consumer (the session's
//! drain duty). Other producers never wait: [`Mailbox::deliver`] is a
//! non-blocking enqueue, so a slow client can only lose its own messages and
//! never stalls the hub or the registry. Replies from the owning session use
//! [`Mailbox::send`], which waits for room.

use tokio::sync::mpsc;

/// Default number of lines a mailbox can hold before deliveries are dropped.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Why a delivery was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("mailbox is full")]
    Full,

    #[error("mailbox is closed")]
    Closed,
}

/// Sending side of a session mailbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<String>,
}

/// Receiving side of a session mailbox, owned by the drain duty.
pub type MailboxReceiver = mpsc::Receiver<String>;

/// Creates a mailbox with the given capacity.
pub fn mailbox(capacity: usize) -> (Mailbox, MailboxReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Mailbox { sender }, receiver)
}

impl Mailbox {
    /// Enqueues a line without waiting.
    ///
    /// # Errors
    ///
    /// - `DeliveryError::Full` if the consumer is behind by `capacity` lines
    /// - `DeliveryError::Closed` if the session has gone away
    pub fn deliver(&self, line: impl Into<String>) -> Result<(), DeliveryError> {
        self.sender.try_send(line.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Enqueues a line, waiting for room if the mailbox is full.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Closed` if the session has gone away.
    pub async fn send(&self, line: impl Into<String>) -> Result<(), DeliveryError> {
        self.sender
            .send(line.into())
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Returns true if the drain duty has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
