use std::collections::{HashMap, HashSet};

use crate::router::subscriber::SubscriberHandle;
use crate::utils::error::RouterError;

/// The router's bidirectional topic index.
///
/// - `subscribers`: identity -> handle, at most one live handle per identity.
/// - `rtable`: topic -> handles interested in it.
/// - `rrtable`: handle -> topics it holds.
///
/// `rtable` and `rrtable` are exact inverses. Empty topic sets are removed from
/// `rtable`; `rrtable` keeps an empty set only for a subscriber registered with no
/// topics, which stays reachable point-to-point.
///
/// The index itself is not synchronized; [`Router`](crate::router::Router) keeps it
/// behind one `RwLock` so every compound mutation is atomic to readers.
#[derive(Debug, Default)]
pub struct TopicIndex {
    pub(crate) subscribers: HashMap<String, SubscriberHandle>,
    pub(crate) rtable: HashMap<String, HashSet<SubscriberHandle>>,
    pub(crate) rrtable: HashMap<SubscriberHandle, HashSet<String>>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `topics` to the handle's interests, registering it on first use.
    ///
    /// Fails without touching any table when the identity is already held by a
    /// different handle. Returns the number of topics that were newly added.
    pub fn register<I, S>(&mut self, handle: &SubscriberHandle, topics: I) -> Result<usize, RouterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(existing) = self.subscribers.get(handle.identity()) {
            if existing != handle {
                return Err(RouterError::IdentityConflict {
                    identity: handle.identity().to_string(),
                });
            }
        }

        self.subscribers
            .insert(handle.identity().to_string(), handle.clone());

        let held = self.rrtable.entry(handle.clone()).or_default();
        let mut added = 0;
        for topic in topics {
            let topic = topic.as_ref();
            if held.insert(topic.to_string()) {
                self.rtable
                    .entry(topic.to_string())
                    .or_default()
                    .insert(handle.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes `topics` from the handle's interests.
    ///
    /// Topics the handle does not hold are skipped. Removing the last topic drops
    /// the handle from the index entirely. A handle that holds no topics is left
    /// untouched. Returns the number of topics removed.
    pub fn unregister<I, S>(&mut self, handle: &SubscriberHandle, topics: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(held) = self.rrtable.get_mut(handle) else {
            return 0;
        };
        if held.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for topic in topics {
            let topic = topic.as_ref();
            if !held.remove(topic) {
                continue;
            }
            removed += 1;
            if let Some(interested) = self.rtable.get_mut(topic) {
                interested.remove(handle);
                if interested.is_empty() {
                    self.rtable.remove(topic);
                }
            }
        }

        if held.is_empty() {
            self.rrtable.remove(handle);
            self.forget(handle);
        }
        removed
    }

    /// Removes the handle from every table, whatever topics it held.
    ///
    /// Returns the topics it was registered for, or `None` if it was unknown.
    pub fn unregister_subscriber(&mut self, handle: &SubscriberHandle) -> Option<Vec<String>> {
        let topics: Vec<String> = self.rrtable.get(handle)?.iter().cloned().collect();
        if topics.is_empty() {
            self.rrtable.remove(handle);
            self.forget(handle);
        } else {
            self.unregister(handle, &topics);
        }
        Some(topics)
    }

    /// Snapshot of the handles currently interested in `topic`.
    pub fn subscribers_of(&self, topic: &str) -> Vec<SubscriberHandle> {
        self.rtable
            .get(topic)
            .map(|interested| interested.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The handle registered under `identity`, if any.
    pub fn subscriber(&self, identity: &str) -> Option<SubscriberHandle> {
        self.subscribers.get(identity).cloned()
    }

    /// Topics currently held by the handle.
    pub fn topics_of(&self, handle: &SubscriberHandle) -> Option<&HashSet<String>> {
        self.rrtable.get(handle)
    }

    /// Every handle present in the reverse index.
    pub fn handles(&self) -> Vec<SubscriberHandle> {
        self.rrtable.keys().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn topic_count(&self) -> usize {
        self.rtable.len()
    }

    fn forget(&mut self, handle: &SubscriberHandle) {
        if self.subscribers.get(handle.identity()) == Some(handle) {
            self.subscribers.remove(handle.identity());
        }
    }
}
