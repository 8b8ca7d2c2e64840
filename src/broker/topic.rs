use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::message::ServerMessage;
use crate::broker::ring_buffer::RingBuffer;
use crate::client::Client;

/// Capacity of the per-topic history ring served to `last_n` subscribers.
pub const HISTORY_CAPACITY: usize = 1000;

/// A named logical channel with an independent subscriber set and history
/// ring.
///
/// Subscribers and the message counter live behind the topic-local lock; the
/// history ring is only mutated while that lock is held, which serialises
/// publishes per topic and lets a subscription install its handle and
/// snapshot history in one critical section.
#[derive(Debug)]
pub struct Topic {
    pub name: String,
    pub created_at: DateTime<Utc>,
    history: RingBuffer<ServerMessage>,
    inner: RwLock<TopicInner>,
}

#[derive(Debug)]
struct TopicInner {
    subscribers: HashMap<String, Arc<Client>>,
    message_count: u64,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            history: RingBuffer::new(HISTORY_CAPACITY),
            inner: RwLock::new(TopicInner {
                subscribers: HashMap::new(),
                message_count: 0,
            }),
        }
    }

    /// Installs `handle` as the subscriber for `client_id` (overwriting any
    /// previous handle) and returns up to `last_n` history events. Install
    /// and snapshot happen under the same lock, so no concurrent publish can
    /// slip between them.
    pub fn add_subscriber(
        &self,
        client_id: &str,
        handle: Arc<Client>,
        last_n: usize,
    ) -> Vec<ServerMessage> {
        let mut inner = self.inner.write();
        inner.subscribers.insert(client_id.to_string(), handle);

        if last_n > 0 {
            self.history.last_n(last_n)
        } else {
            Vec::new()
        }
    }

    /// Removes the subscriber; no error if absent.
    pub fn remove_subscriber(&self, client_id: &str) {
        self.inner.write().subscribers.remove(client_id);
    }

    /// Appends `event` to history, bumps the message counter, and fans out
    /// to every connected subscriber except `skip`. Runs entirely under the
    /// topic lock, which guarantees per-topic delivery order.
    pub fn publish(&self, event: ServerMessage, skip: Option<&str>) {
        let mut inner = self.inner.write();
        inner.message_count += 1;

        self.history.push(event.clone());

        for (client_id, subscriber) in &inner.subscribers {
            if skip == Some(client_id.as_str()) {
                continue;
            }
            subscriber.deliver(event.clone());
        }
    }

    /// Offers `notice` to every subscriber's outbox (best effort), empties
    /// the subscriber map, and returns the evicted client ids.
    pub fn evict_all(&self, notice: &ServerMessage) -> Vec<String> {
        let mut inner = self.inner.write();

        let mut evicted = Vec::with_capacity(inner.subscribers.len());
        for (client_id, subscriber) in inner.subscribers.drain() {
            subscriber.offer(notice.clone());
            evicted.push(client_id);
        }
        evicted
    }

    /// Snapshot of the current subscriber ids.
    pub fn snapshot_subscribers(&self) -> Vec<String> {
        self.inner.read().subscribers.keys().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }

    pub fn message_count(&self) -> u64 {
        self.inner.read().message_count
    }

    /// The most recent `n` history events in publish order.
    pub fn last_n(&self, n: usize) -> Vec<ServerMessage> {
        self.history.last_n(n)
    }

    /// Current history length.
    pub fn history_size(&self) -> usize {
        self.history.size()
    }
}
