//! Dispatch events.
//!
//! The dispatch loop never acts on undeliverable messages or failed sends. It
//! reports them here instead, so an operator can layer a policy (such as evicting
//! dead subscribers) on top without changing routing semantics.
//!
//! [`EventBus`] is a thin wrapper around [`tokio::sync::broadcast`]; publishing
//! with no receivers is fine.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::router::message::Message;
use crate::router::subscriber::SubscriberHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Broadcast to a topic nobody is registered for.
    NoSubscribers,
    /// Point-to-point message to an identity that is not registered.
    UnknownRecipient,
}

#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// The message resolved to no subscriber and was discarded.
    Dropped {
        message: Arc<Message>,
        reason: DropReason,
    },
    /// `send` returned `false`. The subscriber stays registered.
    DeliveryFailed {
        subscriber: SubscriberHandle,
        message: Arc<Message>,
    },
    /// The dispatch loop stopped and closed `closed` subscribers.
    Shutdown { closed: usize },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RouterEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.tx.subscribe()
    }
}
