use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::router::message::Message;

/// Anything holding a live connection that the router can deliver to.
///
/// Implementations must be cheap to call from the dispatch loop: `send` should
/// hand the message off (for example to a channel) rather than perform network
/// I/O inline.
pub trait Subscriber: Send + Sync + 'static {
    /// Stable, caller-unique identity. Point-to-point messages address this.
    fn identity(&self) -> &str;

    /// Accepts a message for delivery. `false` means the peer is gone.
    fn send(&self, message: &Message) -> bool;

    /// Releases the underlying connection. May be called more than once.
    fn close(&self);
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique key identifying one [`SubscriberHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey(u64);

impl HandleKey {
    fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// The router's reference to a subscriber.
///
/// Equality and hashing go through the [`HandleKey`], so two handles wrapping
/// different connections are distinct even when they report the same identity.
/// Clones share the key.
#[derive(Clone)]
pub struct SubscriberHandle {
    key: HandleKey,
    subscriber: Arc<dyn Subscriber>,
}

impl SubscriberHandle {
    pub fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            key: HandleKey::next(),
            subscriber,
        }
    }

    pub fn key(&self) -> HandleKey {
        self.key
    }

    pub fn identity(&self) -> &str {
        self.subscriber.identity()
    }

    pub fn send(&self, message: &Message) -> bool {
        self.subscriber.send(message)
    }

    pub fn close(&self) {
        self.subscriber.close()
    }
}

impl<S: Subscriber> From<Arc<S>> for SubscriberHandle {
    fn from(subscriber: Arc<S>) -> Self {
        Self::new(subscriber)
    }
}

impl PartialEq for SubscriberHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SubscriberHandle {}

impl Hash for SubscriberHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("key", &self.key.0)
            .field("identity", &self.identity())
            .finish()
    }
}
