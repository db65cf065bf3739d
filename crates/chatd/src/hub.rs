//! Broadcast hub - serializes public messages and fans them out.
//!
//! A single hub task receives every public message in order. For each one
//! it takes a mailbox snapshot from the registry and enqueues the formatted
//! line into every mailbox without waiting. A full or closed mailbox loses
//! that one delivery; the rest of the fan-out carries on.
//!
//! ```text
//! Session ──publish──▶ mpsc ──▶ BroadcastHub ──snapshot──▶ RegistryHandle
//!                                   │
//!                                   └──try_send──▶ every Mailbox
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chat_protocol::ServerLine;

use crate::mailbox::DeliveryError;
use crate::registry::RegistryHandle;

/// Default number of queued public messages before `publish` waits.
pub const DEFAULT_HUB_CAPACITY: usize = 1024;

/// An immutable public message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    /// Display name of the sender at publish time
    pub name: String,

    /// Remote address of the sender
    pub addr: String,

    /// Message text
    pub text: String,
}

impl BroadcastMessage {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            text: text.into(),
        }
    }

    /// Formats the message as `[<addr>]<name>: <text>`.
    pub fn to_line(&self) -> String {
        ServerLine::Broadcast {
            addr: &self.addr,
            name: &self.name,
            text: &self.text,
        }
        .to_string()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Publishing side of the hub. Cheap to clone.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<BroadcastMessage>,
}

impl HubHandle {
    /// Queue a message for fan-out.
    ///
    /// Returns once the message is queued; it does not wait for any
    /// delivery. If the hub has stopped the message is dropped.
    pub async fn publish(&self, message: BroadcastMessage) {
        if self.sender.send(message).await.is_err() {
            debug!("Hub stopped, broadcast dropped");
        }
    }
}

/// The hub task state.
pub struct BroadcastHub {
    receiver: mpsc::Receiver<BroadcastMessage>,
    registry: RegistryHandle,
}

impl BroadcastHub {
    pub fn new(receiver: mpsc::Receiver<BroadcastMessage>, registry: RegistryHandle) -> Self {
        Self { receiver, registry }
    }

    /// Runs until every `HubHandle` has been dropped.
    pub async fn run(mut self) {
        info!("Broadcast hub starting");

        while let Some(message) = self.receiver.recv().await {
            let result = self.fan_out(&message).await;
            debug!(
                from = %message.name,
                delivered = result.delivered,
                dropped = result.dropped,
                "Broadcast fanned out"
            );
        }

        info!("Broadcast hub stopped");
    }

    /// Delivers one message to every mailbox online right now.
    pub async fn fan_out(&self, message: &BroadcastMessage) -> FanOut {
        let line = message.to_line();
        let mut result = FanOut::default();

        for (name, mailbox) in self.registry.mailboxes().await {
            match mailbox.deliver(line.as_str()) {
                Ok(()) => result.delivered += 1,
                Err(DeliveryError::Full) => {
                    warn!(recipient = %name, "Mailbox full, broadcast dropped");
                    result.dropped += 1;
                }
                Err(DeliveryError::Closed) => {
                    debug!(recipient = %name, "Mailbox closed, broadcast dropped");
                    result.dropped += 1;
                }
            }
        }

        result
    }
}

/// Spawn the hub task and return a publishing handle.
pub fn spawn_hub(registry: RegistryHandle, capacity: usize) -> HubHandle {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(BroadcastHub::new(rx, registry).run());
    HubHandle { sender: tx }
}
