//! Broker engine
//!
//! This module contains the in-memory pub/sub core responsible for:
//! - managing the topic registry and per-topic subscriber sets
//! - maintaining the client registry and the client -> topics index
//! - publishing messages with per-topic FIFO fan-out
//! - serving the read-only topics/stats/health/subscriptions queries
//!
//! Concurrency notes:
//! - Registries sit behind reader/writer locks; each topic carries its own
//!   lock. When more than one lock is held the order is always
//!   topics -> clients -> topic, never reversed.
//! - Operations take locks, perform bounded work, and return; nothing in
//!   here suspends or blocks on I/O. Delivery to a slow subscriber is a
//!   non-blocking offer, so a stalled consumer cannot hold up a publisher.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broker::message::{MessageData, ServerMessage};
use crate::broker::topic::Topic;
use crate::client::Client;
use crate::utils::error::{BrokerError, Result};

/// Fan-out policy: whether a publisher receives its own message back as an
/// event. The protocol documents no echo-back, so the sender is filtered at
/// fan-out time.
const DELIVER_TO_SELF: bool = false;

/// Notice text sent to subscribers evicted by topic deletion.
const TOPIC_DELETED_NOTICE: &str = "topic_deleted";

/// A topic name with its current subscriber count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub name: String,
    pub subscribers: usize,
}

/// Per-topic counters reported by the stats query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub messages: u64,
    pub subscribers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub topics: HashMap<String, TopicStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub uptime_sec: u64,
    pub topics: usize,
    pub subscribers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSubscription {
    pub client_id: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsResponse {
    pub total_clients: usize,
    pub total_topics: usize,
    pub subscriptions: Vec<ClientSubscription>,
    pub topic_breakdown: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct ClientRegistry {
    clients: HashMap<String, Arc<Client>>,
    client_topics: HashMap<String, HashSet<String>>,
}

/// The single source of truth for topics, clients, and subscription edges.
#[derive(Debug)]
pub struct Broker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    clients: RwLock<ClientRegistry>,
    started_at: Instant,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            clients: RwLock::new(ClientRegistry::default()),
            started_at: Instant::now(),
        }
    }

    /// Creates a topic with an empty subscriber set and a fresh history
    /// ring. Fails without state change if the name is taken.
    pub fn create_topic(&self, name: &str) -> Result<()> {
        let mut topics = self.topics.write();

        if topics.contains_key(name) {
            return Err(BrokerError::TopicExists(name.to_string()));
        }

        topics.insert(name.to_string(), Arc::new(Topic::new(name)));
        info!(topic = %name, "topic created");
        Ok(())
    }

    /// Deletes a topic, notifying and evicting all of its subscribers.
    ///
    /// The client registry lock is held across the entire eviction, so a
    /// client resubscribing concurrently serialises after the deletion and
    /// cannot observe a half-evicted edge. Evicted clients stay connected;
    /// they simply receive no further events for this name.
    pub fn delete_topic(&self, name: &str) -> Result<()> {
        let mut topics = self.topics.write();

        let topic = topics
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;

        {
            let mut registry = self.clients.write();
            let notice = ServerMessage::info(Some(name.to_string()), TOPIC_DELETED_NOTICE);

            for client_id in topic.evict_all(&notice) {
                if let Some(set) = registry.client_topics.get_mut(&client_id) {
                    set.remove(name);
                    if set.is_empty() {
                        registry.client_topics.remove(&client_id);
                    }
                }
            }
        }

        topics.remove(name);
        info!(topic = %name, "topic deleted");
        Ok(())
    }

    /// Subscribes `client_id` to `topic_name`, binding `outbox` as the
    /// client's delivery channel, and returns up to `last_n` history events
    /// for the session to forward after its ack.
    ///
    /// Repeat subscriptions are a no-op on the edge but refresh the outbox
    /// binding; this is how a reconnecting client adopts its previous
    /// identity.
    pub fn subscribe(
        &self,
        client_id: &str,
        topic_name: &str,
        last_n: usize,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> Result<Vec<ServerMessage>> {
        let topic = self
            .topics
            .read()
            .get(topic_name)
            .cloned()
            .ok_or_else(|| BrokerError::TopicNotFound(topic_name.to_string()))?;

        let handle = {
            let mut registry = self.clients.write();

            registry
                .client_topics
                .entry(client_id.to_string())
                .or_default()
                .insert(topic_name.to_string());

            match registry.clients.get(client_id) {
                Some(existing) => {
                    existing.rebind(outbox);
                    existing.clone()
                }
                None => {
                    let client = Arc::new(Client::new(client_id, outbox));
                    registry
                        .clients
                        .insert(client_id.to_string(), client.clone());
                    client
                }
            }
        };

        debug!(client_id = %client_id, topic = %topic_name, "subscribed");
        Ok(topic.add_subscriber(client_id, handle, last_n))
    }

    /// Removes the subscription edge from both indices.
    pub fn unsubscribe(&self, client_id: &str, topic_name: &str) -> Result<()> {
        {
            let mut registry = self.clients.write();

            let removed = match registry.client_topics.get_mut(client_id) {
                Some(set) => {
                    let removed = set.remove(topic_name);
                    if set.is_empty() {
                        registry.client_topics.remove(client_id);
                    }
                    removed
                }
                None => false,
            };

            if !removed {
                return Err(BrokerError::NotSubscribed {
                    client: client_id.to_string(),
                    topic: topic_name.to_string(),
                });
            }
        }

        let topic = self
            .topics
            .read()
            .get(topic_name)
            .cloned()
            .ok_or_else(|| BrokerError::TopicNotFound(topic_name.to_string()))?;

        topic.remove_subscriber(client_id);
        debug!(client_id = %client_id, topic = %topic_name, "unsubscribed");
        Ok(())
    }

    /// Publishes `message` to every subscriber of `topic_name` except the
    /// sender, appending it to the topic history. An ack from this call
    /// confirms enqueueing into the core, not delivery.
    pub fn publish(&self, topic_name: &str, message: MessageData, sender: &str) -> Result<()> {
        let topic = self
            .topics
            .read()
            .get(topic_name)
            .cloned()
            .ok_or_else(|| BrokerError::TopicNotFound(topic_name.to_string()))?;

        let event = ServerMessage::event(topic_name, message);
        let skip = (!DELIVER_TO_SELF).then_some(sender);
        topic.publish(event, skip);
        Ok(())
    }

    /// Marks the client disconnected and removes it from every subscribed
    /// topic. The client state itself is retained so a later subscribe under
    /// the same id rebinds instead of starting over; deliveries in the
    /// meantime are suppressed by the connected flag.
    pub fn disconnect(&self, client_id: &str) {
        let subscribed = {
            let mut registry = self.clients.write();

            if let Some(client) = registry.clients.get(client_id) {
                client.set_connected(false);
            }

            registry.client_topics.remove(client_id)
        };

        let Some(subscribed) = subscribed else {
            return;
        };

        let topics = self.topics.read();
        for topic_name in subscribed {
            if let Some(topic) = topics.get(&topic_name) {
                topic.remove_subscriber(client_id);
            }
        }

        debug!(client_id = %client_id, "client disconnected");
    }

    /// All topics with their subscriber counts.
    pub fn topics(&self) -> Vec<TopicInfo> {
        let topics = self.topics.read();

        topics
            .values()
            .map(|topic| TopicInfo {
                name: topic.name.clone(),
                subscribers: topic.subscriber_count(),
            })
            .collect()
    }

    /// Per-topic message and subscriber counters.
    pub fn stats(&self) -> StatsResponse {
        let topics = self.topics.read();

        StatsResponse {
            topics: topics
                .iter()
                .map(|(name, topic)| {
                    (
                        name.clone(),
                        TopicStats {
                            messages: topic.message_count(),
                            subscribers: topic.subscriber_count(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Uptime and aggregate counts.
    pub fn health(&self) -> HealthResponse {
        let topics = self.topics.read();

        HealthResponse {
            uptime_sec: self.started_at.elapsed().as_secs(),
            topics: topics.len(),
            subscribers: topics.values().map(|t| t.subscriber_count()).sum(),
        }
    }

    /// Detailed subscription state: per-client topic lists and the reverse
    /// per-topic client breakdown.
    pub fn subscriptions(&self) -> SubscriptionsResponse {
        let topics = self.topics.read();
        let registry = self.clients.read();

        let subscriptions = registry
            .client_topics
            .iter()
            .map(|(client_id, set)| ClientSubscription {
                client_id: client_id.clone(),
                topics: set.iter().cloned().collect(),
            })
            .collect();

        let topic_breakdown = topics
            .iter()
            .map(|(name, topic)| (name.clone(), topic.snapshot_subscribers()))
            .collect();

        SubscriptionsResponse {
            total_clients: registry.client_topics.len(),
            total_topics: topics.len(),
            subscriptions,
            topic_breakdown,
        }
    }

    /// The topics a single client is subscribed to.
    pub fn client_topics(&self, client_id: &str) -> Vec<String> {
        let registry = self.clients.read();

        registry
            .client_topics
            .get(client_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Looks up the shared client state for `client_id`.
    pub fn client(&self, client_id: &str) -> Option<Arc<Client>> {
        self.clients.read().clients.get(client_id).cloned()
    }
}
