//! Status Broadcaster: per-customer and per-agent topics.
//!
//! ```text
//! lifecycle / dispatcher
//!       │ StatusEvent
//!       ▼
//! StatusBroadcaster
//!   └── topics: Topic → broadcast::Sender<StatusEvent>
//!         │
//!         ▼
//!   Subscription (one per connected client)
//! ```
//!
//! Delivery reaches whoever is subscribed at publish time. Nothing is
//! persisted: a client that reconnects re-reads the order instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use dashmap::DashMap;
use domain::OrderStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An addressable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Customer(UserId),
    Agent(UserId),
}

/// What happened to the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The order moved to a new status (`pending` means it was created).
    Status { status: OrderStatus },
    /// The bound agent reported a new position.
    Location {
        lat: f64,
        lng: f64,
        reported_at: DateTime<Utc>,
    },
}

/// Event pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub order_id: AggregateId,
    pub order_number: String,
    #[serde(flatten)]
    pub payload: EventPayload,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn status(
        order_id: AggregateId,
        order_number: impl Into<String>,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            order_number: order_number.into(),
            payload: EventPayload::Status { status },
            at,
        }
    }

    pub fn location(
        order_id: AggregateId,
        order_number: impl Into<String>,
        lat: f64,
        lng: f64,
        reported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            order_number: order_number.into(),
            payload: EventPayload::Location {
                lat,
                lng,
                reported_at,
            },
            at: reported_at,
        }
    }
}

/// Topic-based fan-out of order events.
#[derive(Clone)]
pub struct StatusBroadcaster {
    topics: Arc<DashMap<Topic, broadcast::Sender<StatusEvent>>>,
    capacity: usize,
}

impl StatusBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per topic.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Starts listening on a topic.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let receiver = self
            .topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Subscription { topic, receiver }
    }

    /// Publishes an event. Returns how many subscribers it reached.
    pub fn publish(&self, topic: Topic, event: StatusEvent) -> usize {
        let sent = match self.topics.get(&topic) {
            Some(sender) => sender.send(event),
            None => return 0,
        };

        match sent {
            Ok(delivered) => {
                metrics::counter!("status_events_published_total").increment(1);
                delivered
            }
            Err(_) => {
                // Every receiver is gone: forget the topic unless someone
                // subscribed in the meantime.
                self.topics
                    .remove_if(&topic, |_, sender| sender.receiver_count() == 0);
                0
            }
        }
    }

    /// Number of live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics
            .get(&topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics currently tracked.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

/// A live subscription to one topic. Dropping it unsubscribes.
pub struct Subscription {
    topic: Topic,
    receiver: broadcast::Receiver<StatusEvent>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Waits for the next event. Returns `None` once the topic is closed.
    ///
    /// A subscriber too slow to keep up skips the events it missed.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = ?self.topic, skipped, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = ?self.topic, skipped, "subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: OrderStatus) -> StatusEvent {
        StatusEvent::status(AggregateId::new(), "ORD-1", status, Utc::now())
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let broadcaster = StatusBroadcaster::new(8);
        let topic = Topic::Customer(UserId::new());
        let mut a = broadcaster.subscribe(topic);
        let mut b = broadcaster.subscribe(topic);

        let delivered = broadcaster.publish(topic, event(OrderStatus::Confirmed));

        assert_eq!(delivered, 2);
        assert_eq!(
            a.recv().await.unwrap().payload,
            EventPayload::Status {
                status: OrderStatus::Confirmed
            }
        );
        assert!(b.recv().await.is_some());
    }

    #[test]
    fn test_topics_are_isolated() {
        let broadcaster = StatusBroadcaster::new(8);
        let customer = UserId::new();
        let mut mine = broadcaster.subscribe(Topic::Customer(customer));
        let mut other = broadcaster.subscribe(Topic::Customer(UserId::new()));
        let mut agent = broadcaster.subscribe(Topic::Agent(customer));

        broadcaster.publish(Topic::Customer(customer), event(OrderStatus::Ready));

        assert!(mine.try_recv().is_some());
        assert!(other.try_recv().is_none());
        assert!(agent.try_recv().is_none());
    }

    #[test]
    fn test_no_subscribers_means_no_delivery() {
        let broadcaster = StatusBroadcaster::new(8);
        let topic = Topic::Agent(UserId::new());
        assert_eq!(broadcaster.publish(topic, event(OrderStatus::Ready)), 0);
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[test]
    fn test_abandoned_topic_is_dropped_on_publish() {
        let broadcaster = StatusBroadcaster::new(8);
        let topic = Topic::Customer(UserId::new());
        let subscription = broadcaster.subscribe(topic);
        assert_eq!(broadcaster.subscriber_count(topic), 1);

        drop(subscription);
        assert_eq!(broadcaster.subscriber_count(topic), 0);

        broadcaster.publish(topic, event(OrderStatus::Cancelled));
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let broadcaster = StatusBroadcaster::new(8);
        let topic = Topic::Customer(UserId::new());
        let _early = broadcaster.subscribe(topic);
        broadcaster.publish(topic, event(OrderStatus::Confirmed));

        let mut late = broadcaster.subscribe(topic);
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_lagging_subscriber_skips_to_oldest_retained() {
        let broadcaster = StatusBroadcaster::new(2);
        let topic = Topic::Customer(UserId::new());
        let mut slow = broadcaster.subscribe(topic);

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
        ] {
            broadcaster.publish(topic, event(status));
        }

        assert_eq!(
            slow.try_recv().unwrap().payload,
            EventPayload::Status {
                status: OrderStatus::Preparing
            }
        );
    }

    #[test]
    fn test_event_serializes_flat() {
        let e = StatusEvent::location(AggregateId::new(), "ORD-1", 41.4, 2.2, Utc::now());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "location");
        assert_eq!(json["lat"], 41.4);
        assert_eq!(json["order_number"], "ORD-1");
    }
}
