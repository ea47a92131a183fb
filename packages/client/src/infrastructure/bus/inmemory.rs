//! Process-local signaling bus.
//!
//! Every subscriber gets its own unbounded FIFO, so messages from one sender
//! reach each receiver in publish order. Like a browser broadcast channel, a
//! published message is also delivered back to the publisher's own
//! subscription.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::{RoomId, SignalMessage, SignalingBus, Subscription, SubscriptionId};

type RoomSubscribers = HashMap<SubscriptionId, mpsc::UnboundedSender<SignalMessage>>;

pub struct InMemorySignalingBus {
    rooms: Mutex<HashMap<RoomId, RoomSubscribers>>,
    available: bool,
}

impl InMemorySignalingBus {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            available: true,
        }
    }

    /// A bus on a platform without broadcast support: every subscription is
    /// degraded and every publish is dropped.
    pub fn unavailable() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            available: false,
        }
    }

    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.rooms.lock().get(room_id).map_or(0, HashMap::len)
    }
}

impl Default for InMemorySignalingBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingBus for InMemorySignalingBus {
    async fn subscribe(&self, room_id: &RoomId) -> Subscription {
        if !self.available {
            tracing::warn!(room_id = %room_id, "Broadcast unavailable; subscription is degraded");
            return Subscription::degraded(room_id.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::next();
        self.rooms
            .lock()
            .entry(room_id.clone())
            .or_default()
            .insert(id, tx);
        tracing::debug!(room_id = %room_id, subscription = %id, "Subscribed");
        Subscription::active(id, room_id.clone(), rx)
    }

    fn publish(&self, room_id: &RoomId, message: SignalMessage) {
        let mut rooms = self.rooms.lock();
        let Some(subscribers) = rooms.get_mut(room_id) else {
            tracing::debug!(room_id = %room_id, kind = message.payload.kind(), "No subscribers; message dropped");
            return;
        };
        subscribers.retain(|_, tx| tx.send(message.clone()).is_ok());
        if subscribers.is_empty() {
            rooms.remove(room_id);
        }
    }

    fn unsubscribe(&self, subscription: &Subscription) {
        let mut rooms = self.rooms.lock();
        if let Some(subscribers) = rooms.get_mut(subscription.room_id()) {
            subscribers.remove(&subscription.id());
            if subscribers.is_empty() {
                rooms.remove(subscription.room_id());
            }
        }
    }
}
