use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::engine::Broker;
use super::message::{MessageData, ServerMessage};
use super::ring_buffer::RingBuffer;
use super::topic::{Topic, HISTORY_CAPACITY};
use crate::client::pubsub_client::OVERFLOW_CAPACITY;
use crate::utils::error::BrokerError;

fn message(payload: serde_json::Value) -> MessageData {
    MessageData {
        id: Uuid::new_v4().to_string(),
        payload,
    }
}

fn event_payload(frame: &ServerMessage) -> &serde_json::Value {
    match frame {
        ServerMessage::Event { message, .. } => &message.payload,
        other => panic!("expected event frame, got {other:?}"),
    }
}

#[test]
fn test_ring_buffer_starts_empty() {
    let ring: RingBuffer<i32> = RingBuffer::new(5);
    assert_eq!(ring.size(), 0);
    assert!(!ring.is_full());
    assert!(ring.last_n(3).is_empty());
    assert_eq!(ring.pop(), None);
}

#[test]
fn test_ring_buffer_push_pop() {
    let ring = RingBuffer::new(3);
    ring.push(1);
    ring.push(2);
    assert_eq!(ring.size(), 2);

    assert_eq!(ring.pop(), Some(1));
    assert_eq!(ring.size(), 1);
    assert_eq!(ring.pop(), Some(2));
    assert_eq!(ring.pop(), None);
}

#[test]
fn test_ring_buffer_overflow_drops_oldest() {
    let ring = RingBuffer::new(2);
    ring.push(1);
    ring.push(2);
    assert!(ring.is_full());

    ring.push(3);
    assert_eq!(ring.size(), 2);
    assert_eq!(ring.pop(), Some(2));
    assert_eq!(ring.pop(), Some(3));
}

#[test]
fn test_ring_buffer_last_n() {
    let ring = RingBuffer::new(5);
    for i in 1..=4 {
        ring.push(i);
    }

    assert_eq!(ring.last_n(2), vec![3, 4]);
    assert_eq!(ring.last_n(10), vec![1, 2, 3, 4]);
    assert!(ring.last_n(0).is_empty());
    // Non-mutating
    assert_eq!(ring.size(), 4);
}

#[test]
fn test_ring_buffer_last_n_after_wraparound() {
    let ring = RingBuffer::new(3);
    for i in 1..=5 {
        ring.push(i);
    }
    assert_eq!(ring.last_n(3), vec![3, 4, 5]);
}

#[test]
fn test_ring_buffer_capacity_one_keeps_newest() {
    let ring = RingBuffer::new(1);
    for i in 1..=3 {
        ring.push(i);
    }
    assert_eq!(ring.last_n(1), vec![3]);
}

#[test]
fn test_ring_buffer_pop_all() {
    let ring = RingBuffer::new(3);
    for i in 1..=3 {
        ring.push(i);
    }

    assert_eq!(ring.pop_all(), vec![1, 2, 3]);
    assert_eq!(ring.size(), 0);
    assert!(!ring.is_full());
    assert!(ring.pop_all().is_empty());
}

#[test]
fn test_ring_buffer_clear() {
    let ring = RingBuffer::new(3);
    ring.push(1);
    ring.push(2);
    ring.clear();

    assert_eq!(ring.size(), 0);
    assert!(!ring.is_full());
    assert_eq!(ring.pop(), None);
}

#[test]
fn test_topic_new() {
    let topic = Topic::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert_eq!(topic.subscriber_count(), 0);
    assert_eq!(topic.message_count(), 0);
}

#[test]
fn test_topic_publish_with_zero_subscribers_still_records_history() {
    let topic = Topic::new("quiet");
    topic.publish(ServerMessage::event("quiet", message(json!({"n": 1}))), None);
    topic.publish(ServerMessage::event("quiet", message(json!({"n": 2}))), None);

    assert_eq!(topic.message_count(), 2);
    assert_eq!(topic.history_size(), 2);
    assert_eq!(topic.last_n(5).len(), 2);
}

#[test]
fn test_topic_subscribe_returns_recent_history_in_order() {
    let topic = Topic::new("history");
    for seq in 1..=5 {
        topic.publish(
            ServerMessage::event("history", message(json!({"seq": seq}))),
            None,
        );
    }

    let (tx, _rx) = mpsc::channel(8);
    let client = std::sync::Arc::new(crate::client::Client::new("late", tx));
    let history = topic.add_subscriber("late", client, 3);

    let seqs: Vec<i64> = history
        .iter()
        .map(|frame| event_payload(frame)["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![3, 4, 5]);
    assert_eq!(topic.subscriber_count(), 1);
}

#[test]
fn test_broker_new() {
    let broker = Broker::default();
    assert!(broker.topics().is_empty());
    assert_eq!(broker.health().topics, 0);
    assert_eq!(broker.health().subscribers, 0);
}

#[test]
fn test_create_topic_rejects_duplicates() {
    let broker = Broker::new();
    broker.create_topic("dup").unwrap();

    assert_eq!(
        broker.create_topic("dup"),
        Err(BrokerError::TopicExists("dup".to_string()))
    );
    assert_eq!(broker.topics().len(), 1);
}

#[test]
fn test_delete_missing_topic() {
    let broker = Broker::new();
    assert_eq!(
        broker.delete_topic("ghost"),
        Err(BrokerError::TopicNotFound("ghost".to_string()))
    );
}

#[test]
fn test_subscribe_to_missing_topic() {
    let broker = Broker::new();
    let (tx, _rx) = mpsc::channel(8);

    let result = broker.subscribe("c1", "ghost", 0, tx);
    assert_eq!(result, Err(BrokerError::TopicNotFound("ghost".to_string())));
    assert!(broker.subscriptions().subscriptions.is_empty());
}

#[test]
fn test_publish_fans_out_to_all_subscribers() {
    let broker = Broker::new();
    broker.create_topic("news").unwrap();

    let (tx1, mut rx1) = mpsc::channel(8);
    let (tx2, mut rx2) = mpsc::channel(8);
    broker.subscribe("c1", "news", 0, tx1).unwrap();
    broker.subscribe("c2", "news", 0, tx2).unwrap();

    broker
        .publish("news", message(json!({"text": "Hello World"})), "publisher")
        .unwrap();

    for rx in [&mut rx1, &mut rx2] {
        let frame = rx.try_recv().expect("subscriber should receive the event");
        match frame {
            ServerMessage::Event { topic, message, .. } => {
                assert_eq!(topic, "news");
                assert_eq!(message.payload["text"], "Hello World");
            }
            other => panic!("expected event frame, got {other:?}"),
        }
    }
}

#[test]
fn test_publish_does_not_echo_to_sender() {
    let broker = Broker::new();
    broker.create_topic("echo").unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    broker.subscribe("c1", "echo", 0, tx).unwrap();

    broker
        .publish("echo", message(json!({"m": "self"})), "c1")
        .unwrap();

    assert!(rx.try_recv().is_err());
    // The publish still counts and lands in history.
    assert_eq!(broker.stats().topics["echo"].messages, 1);
}

#[test]
fn test_publish_to_missing_topic() {
    let broker = Broker::new();
    assert_eq!(
        broker.publish("ghost", message(json!(null)), "c1"),
        Err(BrokerError::TopicNotFound("ghost".to_string()))
    );
}

#[test]
fn test_unsubscribe_removes_edge_from_both_indices() {
    let broker = Broker::new();
    broker.create_topic("t").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    broker.subscribe("c1", "t", 0, tx).unwrap();

    broker.unsubscribe("c1", "t").unwrap();

    let status = broker.subscriptions();
    assert!(status.subscriptions.is_empty());
    assert!(status.topic_breakdown["t"].is_empty());
}

#[test]
fn test_unsubscribe_without_subscription() {
    let broker = Broker::new();
    broker.create_topic("t").unwrap();

    assert_eq!(
        broker.unsubscribe("c1", "t"),
        Err(BrokerError::NotSubscribed {
            client: "c1".to_string(),
            topic: "t".to_string(),
        })
    );
}

#[test]
fn test_resubscribe_rebinds_outbox() {
    let broker = Broker::new();
    broker.create_topic("t").unwrap();

    let (old_tx, mut old_rx) = mpsc::channel(8);
    let (new_tx, mut new_rx) = mpsc::channel(8);
    broker.subscribe("c1", "t", 0, old_tx).unwrap();
    broker.subscribe("c1", "t", 0, new_tx).unwrap();

    broker
        .publish("t", message(json!({"n": 1})), "publisher")
        .unwrap();

    assert!(old_rx.try_recv().is_err());
    assert!(new_rx.try_recv().is_ok());
    // Still a single subscription edge.
    assert_eq!(broker.topics()[0].subscribers, 1);
}

#[test]
fn test_disconnect_scrubs_all_subscriptions() {
    let broker = Broker::new();
    broker.create_topic("a").unwrap();
    broker.create_topic("b").unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    broker.subscribe("c1", "a", 0, tx.clone()).unwrap();
    broker.subscribe("c1", "b", 0, tx).unwrap();

    broker.disconnect("c1");

    let status = broker.subscriptions();
    assert_eq!(status.total_clients, 0);
    assert!(status.topic_breakdown["a"].is_empty());
    assert!(status.topic_breakdown["b"].is_empty());
    assert!(broker.client_topics("c1").is_empty());

    broker
        .publish("a", message(json!({"n": 1})), "publisher")
        .unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_reconnect_after_disconnect_revives_client() {
    let broker = Broker::new();
    broker.create_topic("t").unwrap();

    let (tx1, _rx1) = mpsc::channel(8);
    broker.subscribe("c1", "t", 0, tx1).unwrap();
    broker.disconnect("c1");
    assert!(!broker.client("c1").unwrap().is_connected());

    let (tx2, mut rx2) = mpsc::channel(8);
    broker.subscribe("c1", "t", 0, tx2).unwrap();
    assert!(broker.client("c1").unwrap().is_connected());

    broker
        .publish("t", message(json!({"n": 1})), "publisher")
        .unwrap();
    assert!(rx2.try_recv().is_ok());
}

#[test]
fn test_delete_topic_notifies_and_evicts_subscribers() {
    let broker = Broker::new();
    broker.create_topic("doomed").unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    broker.subscribe("c1", "doomed", 0, tx).unwrap();

    broker.delete_topic("doomed").unwrap();

    match rx.try_recv().expect("subscriber should receive a notice") {
        ServerMessage::Info { topic, msg, .. } => {
            assert_eq!(topic.as_deref(), Some("doomed"));
            assert_eq!(msg, "topic_deleted");
        }
        other => panic!("expected info frame, got {other:?}"),
    }

    assert!(broker.topics().is_empty());
    assert!(broker.client_topics("c1").is_empty());
    assert_eq!(
        broker.publish("doomed", message(json!(null)), "c1"),
        Err(BrokerError::TopicNotFound("doomed".to_string()))
    );
}

#[test]
fn test_last_n_is_clamped_to_available_history() {
    let broker = Broker::new();
    broker.create_topic("short").unwrap();

    for seq in 1..=3 {
        broker
            .publish("short", message(json!({"seq": seq})), "publisher")
            .unwrap();
    }

    let (tx, mut rx) = mpsc::channel(HISTORY_CAPACITY + 16);
    let history = broker
        .subscribe("late", "short", HISTORY_CAPACITY + 10, tx)
        .unwrap();

    assert_eq!(history.len(), 3);
    let seqs: Vec<i64> = history
        .iter()
        .map(|frame| event_payload(frame)["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    // History is returned to the caller, not pushed to the outbox.
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_slow_subscriber_never_blocks_publish() {
    let broker = Broker::new();
    broker.create_topic("burst").unwrap();

    // A stalled consumer: channel capacity 2, never drained during publish.
    let (tx, mut rx) = mpsc::channel(2);
    broker.subscribe("slow", "burst", 0, tx).unwrap();

    for seq in 1..=5 {
        broker
            .publish("burst", message(json!({"seq": seq})), "publisher")
            .unwrap();
    }

    // The direct path kept the first two offers; the rest were dropped
    // without blocking the publisher.
    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(event_payload(&first)["seq"], 1);
    assert_eq!(event_payload(&second)["seq"], 2);
    assert!(rx.try_recv().is_err());

    // The overflow ring still holds the full burst, newest included.
    let client = broker.client("slow").unwrap();
    assert_eq!(client.buffered(), 5);
    let recent = client.recent_events(5);
    assert_eq!(event_payload(recent.last().unwrap())["seq"], 5);
}

#[test]
fn test_overflow_ring_is_bounded() {
    let broker = Broker::new();
    broker.create_topic("flood").unwrap();

    let (tx, _rx) = mpsc::channel(2);
    broker.subscribe("slow", "flood", 0, tx).unwrap();

    for seq in 0..(OVERFLOW_CAPACITY + 10) {
        broker
            .publish("flood", message(json!({"seq": seq})), "publisher")
            .unwrap();
    }

    let client = broker.client("slow").unwrap();
    assert_eq!(client.buffered(), OVERFLOW_CAPACITY);
    let newest = client.recent_events(1);
    assert_eq!(
        event_payload(&newest[0])["seq"],
        (OVERFLOW_CAPACITY + 9) as i64
    );
}

#[test]
fn test_topics_listing_and_stats() {
    let broker = Broker::new();
    broker.create_topic("a").unwrap();
    broker.create_topic("b").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    broker.subscribe("c1", "a", 0, tx).unwrap();
    broker
        .publish("a", message(json!({"n": 1})), "publisher")
        .unwrap();

    let mut topics = broker.topics();
    topics.sort_by(|x, y| x.name.cmp(&y.name));
    assert_eq!(topics[0].name, "a");
    assert_eq!(topics[0].subscribers, 1);
    assert_eq!(topics[1].name, "b");
    assert_eq!(topics[1].subscribers, 0);

    let stats = broker.stats();
    assert_eq!(stats.topics["a"].messages, 1);
    assert_eq!(stats.topics["a"].subscribers, 1);
    assert_eq!(stats.topics["b"].messages, 0);
}

#[test]
fn test_health_reports_aggregate_counts() {
    let broker = Broker::new();
    broker.create_topic("a").unwrap();
    broker.create_topic("b").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    broker.subscribe("c1", "a", 0, tx.clone()).unwrap();
    broker.subscribe("c2", "a", 0, tx.clone()).unwrap();
    broker.subscribe("c2", "b", 0, tx).unwrap();

    let health = broker.health();
    assert_eq!(health.topics, 2);
    assert_eq!(health.subscribers, 3);
}

#[test]
fn test_subscriptions_status_breakdown() {
    let broker = Broker::new();
    broker.create_topic("a").unwrap();
    broker.create_topic("b").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    broker.subscribe("c1", "a", 0, tx.clone()).unwrap();
    broker.subscribe("c1", "b", 0, tx.clone()).unwrap();
    broker.subscribe("c2", "a", 0, tx).unwrap();

    let status = broker.subscriptions();
    assert_eq!(status.total_clients, 2);
    assert_eq!(status.total_topics, 2);

    let c1 = status
        .subscriptions
        .iter()
        .find(|s| s.client_id == "c1")
        .unwrap();
    let mut c1_topics = c1.topics.clone();
    c1_topics.sort();
    assert_eq!(c1_topics, vec!["a", "b"]);

    let mut on_a = status.topic_breakdown["a"].clone();
    on_a.sort();
    assert_eq!(on_a, vec!["c1", "c2"]);
    assert_eq!(status.topic_breakdown["b"], vec!["c1"]);
}
