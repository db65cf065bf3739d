//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor. Sessions and the hub only ever hold this
//! handle, never the map itself.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use super::commands::{PresenceEntry, RegistryCommand, RegistryError, SessionHandle, SessionId};
use crate::mailbox::Mailbox;

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// let registry = spawn_registry();
///
/// registry.register("alice", session).await?;
/// registry.rename("alice", "alice2", id).await?;
/// let online = registry.snapshot().await;
/// registry.unregister("alice2", id).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Put a session online under `name`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameConflict` if the name is taken
    /// - `RegistryError::RegistryFull` if the registry is at maximum capacity
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        name: impl Into<String>,
        session: SessionHandle,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                name: name.into(),
                session,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Take `name` offline if session `id` still holds it.
    ///
    /// Safe to call any number of times. Returns whether an entry was
    /// removed; `false` when the name was absent, held by someone else,
    /// or the actor is gone.
    pub async fn unregister(&self, name: impl Into<String>, id: SessionId) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Unregister {
                name: name.into(),
                id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Atomically move session `id` from `old` to `new`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameConflict` if `new` belongs to another session
    /// - `RegistryError::NotFound` if `old` is not held by session `id`
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn rename(
        &self,
        old: impl Into<String>,
        new: impl Into<String>,
        id: SessionId,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Rename {
                old: old.into(),
                new: new.into(),
                id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Resolve a display name to its session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NotFound` if nobody online has that name
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn lookup(&self, name: impl Into<String>) -> Result<SessionHandle, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Lookup {
                name: name.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Everyone online right now, sorted by name.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<PresenceEntry> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Every online mailbox right now, keyed by display name.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn mailboxes(&self) -> Vec<(String, Mailbox)> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Mailboxes { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }
}
