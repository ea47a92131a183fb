//! Signaling bus port.
//!
//! A room-scoped broadcast channel. Delivery is best-effort and at-most-once,
//! ordered per sender. Nothing is persisted: a participant only sees messages
//! published after it subscribed.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{signal::SignalMessage, value_object::RoomId};

pub type SignalInbox = mpsc::UnboundedReceiver<SignalMessage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A subscription to one room.
///
/// A *degraded* subscription is returned when the bus could not open the
/// room; it has no inbox and publishing to its room is a no-op.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    room_id: RoomId,
    inbox: Option<SignalInbox>,
    active: bool,
}

impl Subscription {
    pub fn active(id: SubscriptionId, room_id: RoomId, inbox: SignalInbox) -> Self {
        Self {
            id,
            room_id,
            inbox: Some(inbox),
            active: true,
        }
    }

    pub fn degraded(room_id: RoomId) -> Self {
        Self {
            id: SubscriptionId::next(),
            room_id,
            inbox: None,
            active: false,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Take the receiving end. Returns `None` for degraded subscriptions and
    /// on every call after the first.
    pub fn take_inbox(&mut self) -> Option<SignalInbox> {
        self.inbox.take()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalingBus: Send + Sync {
    /// Open the room. Never fails; see [`Subscription::degraded`].
    async fn subscribe(&self, room_id: &RoomId) -> Subscription;

    /// Fire-and-forget. No acknowledgement, no retry.
    fn publish(&self, room_id: &RoomId, message: SignalMessage);

    /// Release the room. Idempotent.
    fn unsubscribe(&self, subscription: &Subscription);
}
