//! Router engine
//!
//! The [`Router`] owns the topic index and a bounded message queue drained by a
//! single dispatch loop ([`Router::run`]). Responsibilities:
//! - registering and unregistering subscribers and their topic interests
//! - resolving queued messages to subscribers (broadcast or point-to-point)
//! - shutting down: stop dispatching, release the queue, close every subscriber
//!
//! Concurrency notes:
//! - Every index mutation happens under one write lock, so `rtable` and `rrtable`
//!   are never observed out of sync. The dispatch loop only takes the read lock
//!   to snapshot its targets and calls `send` after releasing it; a subscriber
//!   removed mid-dispatch may still get one last message.
//! - `publish` waits while the queue is full. Nothing is dropped on the producer
//!   side.
//! - Delivery is best-effort. Unknown destinations and failed sends are reported
//!   as [`RouterEvent`]s and otherwise ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{Notify, broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::router::event::{DropReason, EventBus, RouterEvent};
use crate::router::message::{Message, MessageKind};
use crate::router::subscriber::SubscriberHandle;
use crate::router::topic::TopicIndex;
use crate::utils::error::RouterError;

pub struct Router {
    pub(crate) index: RwLock<TopicIndex>,
    queue: mpsc::Sender<Message>,
    receiver: Mutex<Option<mpsc::Receiver<Message>>>,
    shutdown: Notify,
    closed: AtomicBool,
    events: EventBus,
    capacity: usize,
}

impl Router {
    /// Capacity of the dispatch event channel. Slow event receivers lag behind
    /// and skip events; routing is unaffected.
    const EVENT_CAPACITY: usize = 256;

    /// Creates a router whose queue holds up to `queue_capacity` messages.
    /// A capacity of zero is raised to one.
    pub fn new(queue_capacity: usize) -> Self {
        let capacity = queue_capacity.max(1);
        let (queue, receiver) = mpsc::channel(capacity);
        Self {
            index: RwLock::new(TopicIndex::new()),
            queue,
            receiver: Mutex::new(Some(receiver)),
            shutdown: Notify::new(),
            closed: AtomicBool::new(false),
            events: EventBus::new(Self::EVENT_CAPACITY),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Receives drop, delivery-failure and shutdown events from the dispatch loop.
    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    /// Registers `handle` for `topics`.
    ///
    /// The first call for a handle inserts it into the index, even with no topics.
    /// Later calls with the same handle only add topics it does not hold yet.
    /// Fails with [`RouterError::IdentityConflict`] if another handle already owns
    /// the identity, leaving the index unchanged.
    pub fn register<I, S>(&self, handle: &SubscriberHandle, topics: I) -> Result<(), RouterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = self.write();
        if self.is_closed() {
            return Err(RouterError::Closed);
        }
        match index.register(handle, topics) {
            Ok(added) => {
                debug!(subscriber = handle.identity(), added, "registered topics");
                Ok(())
            }
            Err(err) => {
                warn!(subscriber = handle.identity(), error = err.as_label(), "registration rejected");
                Err(err)
            }
        }
    }

    /// Removes `topics` from the handle's interests. Dropping the last topic
    /// removes the subscriber entirely.
    pub fn unregister<I, S>(&self, handle: &SubscriberHandle, topics: I) -> Result<(), RouterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = self.write();
        if self.is_closed() {
            return Err(RouterError::Closed);
        }
        let removed = index.unregister(handle, topics);
        debug!(subscriber = handle.identity(), removed, "unregistered topics");
        Ok(())
    }

    /// Removes the handle from the index regardless of the topics it holds.
    pub fn unregister_subscriber(&self, handle: &SubscriberHandle) -> Result<(), RouterError> {
        let mut index = self.write();
        if self.is_closed() {
            return Err(RouterError::Closed);
        }
        if let Some(topics) = index.unregister_subscriber(handle) {
            debug!(subscriber = handle.identity(), topics = topics.len(), "unregistered subscriber");
        }
        Ok(())
    }

    /// Queues `message` for dispatch, waiting while the queue is full.
    ///
    /// A publish racing with [`close`](Self::close) can pass the closed check and
    /// still land in the queue; such a message is discarded at shutdown even
    /// though this returned `Ok`.
    pub async fn publish(&self, message: Message) -> Result<(), RouterError> {
        if self.is_closed() {
            return Err(RouterError::Closed);
        }
        self.queue
            .send(message)
            .await
            .map_err(|_| RouterError::Closed)
    }

    /// Runs the dispatch loop until [`close`](Self::close) is called.
    ///
    /// On shutdown the queue is closed (queued messages are discarded, blocked
    /// publishers get [`RouterError::Closed`]) and every subscriber still in the
    /// index is closed once before this returns.
    pub async fn run(&self) -> Result<(), RouterError> {
        let mut receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RouterError::AlreadyRunning)?;

        info!(capacity = self.capacity, "router dispatch loop started");

        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Some(message) => self.dispatch(message),
                    None => break,
                },
                _ = self.shutdown.notified() => break,
            }
        }

        receiver.close();
        drop(receiver);

        let handles = self.read().handles();
        for handle in &handles {
            handle.close();
        }
        self.events.publish(RouterEvent::Shutdown {
            closed: handles.len(),
        });
        info!(closed = handles.len(), "router stopped");
        Ok(())
    }

    /// Signals the dispatch loop to stop. Only the first call has an effect.
    ///
    /// Does not wait for shutdown; await [`run`](Self::run) for that. If the loop
    /// has not started yet it stops as soon as it does. Publishers blocked on a
    /// full queue are released with [`RouterError::Closed`] either way.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("router shutdown requested");
            // Release publishers waiting on a full queue even if the loop has not
            // started. The receiver stays in place so `run` still closes subscribers.
            if let Some(receiver) = self
                .receiver
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_mut()
            {
                receiver.close();
            }
            self.shutdown.notify_one();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().subscriber_count()
    }

    pub fn topic_count(&self) -> usize {
        self.read().topic_count()
    }

    /// Topics currently held by the handle, sorted.
    pub fn topics_of(&self, handle: &SubscriberHandle) -> Vec<String> {
        let mut topics: Vec<String> = self
            .read()
            .topics_of(handle)
            .map(|held| held.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    fn dispatch(&self, message: Message) {
        let message = Arc::new(message);
        match message.kind {
            MessageKind::Broadcast => {
                let targets = self.read().subscribers_of(&message.destination);
                if targets.is_empty() {
                    debug!(topic = %message.destination, "no subscribers, dropping message");
                    self.dropped(message, DropReason::NoSubscribers);
                    return;
                }
                for target in &targets {
                    self.deliver(target, &message);
                }
            }
            MessageKind::PointToPoint => {
                debug!(
                    sender = %message.sender,
                    destination = %message.destination,
                    "point-to-point message"
                );
                let target = self.read().subscriber(&message.destination);
                match target {
                    Some(target) => self.deliver(&target, &message),
                    None => {
                        debug!(destination = %message.destination, "unknown recipient, dropping message");
                        self.dropped(message, DropReason::UnknownRecipient);
                    }
                }
            }
        }
    }

    // A failed send leaves the subscriber registered; eviction is up to whoever
    // listens on the event bus.
    fn deliver(&self, target: &SubscriberHandle, message: &Arc<Message>) {
        if !target.send(message) {
            debug!(subscriber = target.identity(), "delivery failed");
            self.events.publish(RouterEvent::DeliveryFailed {
                subscriber: target.clone(),
                message: Arc::clone(message),
            });
        }
    }

    fn dropped(&self, message: Arc<Message>, reason: DropReason) {
        self.events.publish(RouterEvent::Dropped { message, reason });
    }

    fn read(&self) -> RwLockReadGuard<'_, TopicIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TopicIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
