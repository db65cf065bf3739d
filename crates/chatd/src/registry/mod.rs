//! Presence registry using the Actor pattern.
//!
//! The registry is the single source of truth for who is online. It receives
//! commands via a tokio mpsc channel and owns the name → session map
//! exclusively, so every operation is serialized without a lock and never
//! waits on network I/O.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Sessions     │────▶│  RegistryActor  │
//! │   BroadcastHub  │     │ HashMap<name,   │
//! └─────────────────┘     │  SessionHandle> │
//!         │               └─────────────────┘
//!         │   RegistryCommand      │
//!         │   (mpsc channel)       │ oneshot replies
//!         ▼                        ▼
//!  register / rename /      snapshot / lookup /
//!  unregister               mailboxes
//! ```

use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::debug;

mod actor;
mod commands;
mod handle;

pub use actor::{RegistryActor, MAX_SESSIONS};
pub use commands::{PresenceEntry, RegistryCommand, RegistryError, SessionHandle, SessionId};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Cleanup interval in seconds
pub const CLEANUP_INTERVAL_SECS: u64 = 30;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates the command channel
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Spawns a background cleanup task
/// 4. Returns a RegistryHandle for client use
///
/// The actor stops once every handle has been dropped.
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    spawn_cleanup_task(cmd_tx.downgrade());

    RegistryHandle::new(cmd_tx)
}

/// Spawn a background task that periodically drops dead entries.
///
/// Holds only a weak sender so it never keeps the actor alive on its own.
fn spawn_cleanup_task(sender: mpsc::WeakSender<RegistryCommand>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(sender) = sender.upgrade() else {
                debug!("Cleanup task stopping: registry channel closed");
                break;
            };

            if sender.send(RegistryCommand::CleanupClosed).await.is_err() {
                debug!("Cleanup task stopping: registry channel closed");
                break;
            }
        }
    });
}
