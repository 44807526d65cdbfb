//! Subscription management for notification clients.
//!
//! Each notification connection is attached to the registry once and gets a
//! [`Subscriber`] handle plus the receiving end of an unbounded channel. The
//! connection's writer task drains that channel onto the socket, so acks and
//! pushes for one connection never interleave.
//!
//! The registry maps every topic to the set of subscribers interested in it.
//! All mutations and every broadcast run under one registry-wide lock.
//! Broadcasting prunes dead subscribers with `retain`, so the set is never
//! resized while it is being iterated.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use reabed_core::Topic;
use reabed_protocol::{encode_line, Notification};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Identifier of one notification connection.
pub type ConnectionId = u64;

/// Outbound handle for one notification connection.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<String>,
}

impl Subscriber {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue a line for this connection.
    ///
    /// Fails once the connection's writer has gone away.
    pub fn send(&self, line: String) -> Result<(), mpsc::error::SendError<String>> {
        self.tx.send(line)
    }
}

/// Per-topic sets of live subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    topics: Mutex<HashMap<Topic, HashMap<ConnectionId, Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle for a new connection.
    ///
    /// The handle is not subscribed to anything yet.
    pub fn attach(&self, peer: SocketAddr) -> (Subscriber, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        (Subscriber { id, peer, tx }, rx)
    }

    /// Add `subscriber` to `topic`. Subscribing twice is harmless.
    ///
    /// Returns `true` if the subscriber was not yet a member.
    pub async fn subscribe(&self, topic: Topic, subscriber: &Subscriber) -> bool {
        let mut topics = self.topics.lock().await;
        let added = topics
            .entry(topic)
            .or_default()
            .insert(subscriber.id, subscriber.clone())
            .is_none();
        debug!(
            "{} subscribed to {} (new: {})",
            subscriber.peer, topic, added
        );
        added
    }

    /// Remove connection `id` from `topic`. Removing a non-member is a no-op.
    ///
    /// Returns `true` if the connection was a member.
    pub async fn unsubscribe(&self, topic: Topic, id: ConnectionId) -> bool {
        let mut topics = self.topics.lock().await;
        topics
            .get_mut(&topic)
            .map(|set| set.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// Remove connection `id` from every topic.
    pub async fn remove_connection(&self, id: ConnectionId) {
        let mut topics = self.topics.lock().await;
        for set in topics.values_mut() {
            set.remove(&id);
        }
    }

    /// Topics connection `id` is subscribed to.
    pub async fn topics_of(&self, id: ConnectionId) -> Vec<Topic> {
        let topics = self.topics.lock().await;
        Topic::ALL
            .into_iter()
            .filter(|t| topics.get(t).is_some_and(|set| set.contains_key(&id)))
            .collect()
    }

    /// Number of subscribers on `topic`.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        let topics = self.topics.lock().await;
        topics.get(&topic).map_or(0, HashMap::len)
    }

    /// Push `notification` to every subscriber of its topic.
    ///
    /// A subscriber whose connection is gone is removed from every topic and
    /// the remaining subscribers still receive the message. Returns the
    /// number of subscribers the message was queued for.
    pub async fn broadcast(&self, notification: &Notification) -> usize {
        let topic = notification.topic();
        let line = encode_line(notification);
        let mut topics = self.topics.lock().await;

        let mut dead = Vec::new();
        if let Some(set) = topics.get_mut(&topic) {
            set.retain(|id, subscriber| match subscriber.send(line.clone()) {
                Ok(()) => true,
                Err(_) => {
                    warn!("Dropping dead subscriber {} from {}", subscriber.peer, topic);
                    dead.push(*id);
                    false
                }
            });
        }

        for set in topics.values_mut() {
            for id in &dead {
                set.remove(id);
            }
        }

        topics.get(&topic).map_or(0, HashMap::len)
    }
}
