//! Registry actor commands, errors, and the values it hands out.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `SessionHandle` / `PresenceEntry`: what the registry stores and reports
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::mailbox::Mailbox;

// ============================================================================
// Session Identity
// ============================================================================

/// Identifier of one accepted connection.
///
/// Unlike the display name it never changes, so the registry uses it to make
/// sure a session only ever removes or renames its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the registry keeps for each online session.
///
/// A non-owning reference: dropping it never closes the connection, it only
/// releases one sender of the session's mailbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Connection identifier
    pub id: SessionId,

    /// Remote address, fixed for the life of the connection
    pub addr: String,

    /// Outbound queue of the session
    pub mailbox: Mailbox,
}

impl SessionHandle {
    pub fn new(id: SessionId, addr: impl Into<String>, mailbox: Mailbox) -> Self {
        Self {
            id,
            addr: addr.into(),
            mailbox,
        }
    }
}

/// One row of a presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub name: String,
    pub addr: String,
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Put a session online under `name`.
    ///
    /// # Errors
    /// - `RegistryError::NameConflict` if the name is taken
    /// - `RegistryError::RegistryFull` if at maximum capacity
    Register {
        name: String,
        session: SessionHandle,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Take `name` offline if it still belongs to session `id`.
    ///
    /// Responds with whether an entry was removed; absence is not an error.
    Unregister {
        name: String,
        id: SessionId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Move session `id` from `old` to `new` in one step.
    ///
    /// # Errors
    /// - `RegistryError::NameConflict` if `new` belongs to another session
    /// - `RegistryError::NotFound` if `old` is not held by session `id`
    Rename {
        old: String,
        new: String,
        id: SessionId,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Resolve a display name.
    ///
    /// # Errors
    /// - `RegistryError::NotFound` if nobody online has that name
    Lookup {
        name: String,
        respond_to: oneshot::Sender<Result<SessionHandle, RegistryError>>,
    },

    /// Point-in-time copy of everyone online, sorted by name.
    Snapshot {
        respond_to: oneshot::Sender<Vec<PresenceEntry>>,
    },

    /// Point-in-time copy of every online mailbox, used for fan-out.
    Mailboxes {
        respond_to: oneshot::Sender<Vec<(String, Mailbox)>>,
    },

    /// Drop entries whose session has stopped draining its mailbox.
    ///
    /// Fire-and-forget, sent by the periodic cleanup task.
    CleanupClosed,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The requested name is already held by another session.
    #[error("name already in use: {0}")]
    NameConflict(String),

    /// No online session has this name.
    #[error("name not found: {0}")]
    NotFound(String),

    /// The registry has reached its maximum capacity.
    #[error("registry is full (max: {max} sessions)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}
