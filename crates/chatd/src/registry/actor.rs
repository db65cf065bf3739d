//! Registry actor - owns the presence map and processes commands.
//!
//! The RegistryActor is the single owner of presence state. It receives
//! commands via an mpsc channel and answers over oneshot channels. Because
//! commands are handled one at a time, every operation (rename included) is
//! one critical section, and no reader can observe a half-applied rename.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Response send failures are ignored (the caller went away)

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::commands::{PresenceEntry, RegistryCommand, RegistryError, SessionHandle, SessionId};
use crate::mailbox::Mailbox;

/// Maximum number of sessions the registry can hold.
pub const MAX_SESSIONS: usize = 10_000;

/// The registry actor - owns all presence state.
///
/// The actor never touches a socket; the only outbound effect it has is
/// handing out mailbox senders, which callers use after the reply arrives.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Display name → online session
    sessions: HashMap<String, SessionHandle>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.sessions.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                name,
                session,
                respond_to,
            } => {
                let result = self.handle_register(name, session);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister {
                name,
                id,
                respond_to,
            } => {
                let removed = self.handle_unregister(&name, id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Rename {
                old,
                new,
                id,
                respond_to,
            } => {
                let result = self.handle_rename(old, new, id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Lookup { name, respond_to } => {
                let result = self.handle_lookup(name);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.handle_snapshot());
            }
            RegistryCommand::Mailboxes { respond_to } => {
                let _ = respond_to.send(self.handle_mailboxes());
            }
            RegistryCommand::CleanupClosed => {
                self.handle_cleanup_closed();
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register(&mut self, name: String, session: SessionHandle) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&name) {
            debug!(name = %name, id = %session.id, "Name already registered");
            return Err(RegistryError::NameConflict(name));
        }

        if self.sessions.len() >= MAX_SESSIONS {
            warn!(
                name = %name,
                current = self.sessions.len(),
                max = MAX_SESSIONS,
                "Registry is full, rejecting registration"
            );
            return Err(RegistryError::RegistryFull { max: MAX_SESSIONS });
        }

        info!(
            name = %name,
            id = %session.id,
            addr = %session.addr,
            online = self.sessions.len() + 1,
            "Session registered"
        );
        self.sessions.insert(name, session);
        Ok(())
    }

    /// Removes `name` only if it is still held by session `id`.
    fn handle_unregister(&mut self, name: &str, id: SessionId) -> bool {
        match self.sessions.get(name) {
            Some(session) if session.id == id => {
                self.sessions.remove(name);
                info!(
                    name = %name,
                    id = %id,
                    online = self.sessions.len(),
                    "Session unregistered"
                );
                true
            }
            Some(other) => {
                debug!(
                    name = %name,
                    id = %id,
                    holder = %other.id,
                    "Unregister ignored: name held by another session"
                );
                false
            }
            None => {
                debug!(name = %name, id = %id, "Unregister ignored: name not present");
                false
            }
        }
    }

    fn handle_rename(&mut self, old: String, new: String, id: SessionId) -> Result<(), RegistryError> {
        let owns_old = matches!(self.sessions.get(&old), Some(session) if session.id == id);
        if !owns_old {
            return Err(RegistryError::NotFound(old));
        }

        if old == new {
            return Ok(());
        }

        if self.sessions.contains_key(&new) {
            debug!(old = %old, new = %new, id = %id, "Rename rejected: name in use");
            return Err(RegistryError::NameConflict(new));
        }

        let session = self
            .sessions
            .remove(&old)
            .ok_or_else(|| RegistryError::NotFound(old.clone()))?;
        self.sessions.insert(new.clone(), session);

        info!(old = %old, new = %new, id = %id, "Session renamed");
        Ok(())
    }

    fn handle_lookup(&self, name: String) -> Result<SessionHandle, RegistryError> {
        self.sessions
            .get(&name)
            .cloned()
            .ok_or(RegistryError::NotFound(name))
    }

    fn handle_snapshot(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self
            .sessions
            .iter()
            .map(|(name, session)| PresenceEntry {
                name: name.clone(),
                addr: session.addr.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    fn handle_mailboxes(&self) -> Vec<(String, Mailbox)> {
        self.sessions
            .iter()
            .map(|(name, session)| (name.clone(), session.mailbox.clone()))
            .collect()
    }

    /// Removes sessions whose drain duty has exited without unregistering.
    fn handle_cleanup_closed(&mut self) {
        let closed: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.mailbox.is_closed())
            .map(|(name, _)| name.clone())
            .collect();

        if closed.is_empty() {
            debug!("No closed sessions to clean up");
            return;
        }

        for name in closed {
            if let Some(session) = self.sessions.remove(&name) {
                warn!(
                    name = %name,
                    id = %session.id,
                    "Session removed by cleanup: mailbox closed"
                );
            }
        }
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of sessions currently registered.
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
