//! Shared helpers for call scenario tests.

#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tsunagu_client::{
    CallConfig, CallDependencies, SessionCoordinator,
    domain::{
        CallState, NegotiationId, ParticipantId, RoomId, SignalInbox, SignalMessage,
        SignalPayload, SignalingBus, Subscription,
    },
    infrastructure::{SimulatedMediaCapture, SimulatedTransport, StaticIdentityProvider},
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn room() -> RoomId {
    RoomId::new("R1".to_string()).unwrap()
}

pub fn config() -> CallConfig {
    CallConfig {
        ticker_interval: Duration::from_millis(50),
        ..CallConfig::default()
    }
}

/// One participant with its simulated devices.
pub struct Peer {
    pub coordinator: SessionCoordinator,
    pub capture: Arc<SimulatedMediaCapture>,
    pub transport: Arc<SimulatedTransport>,
}

pub async fn join_peer(
    bus: Arc<dyn SignalingBus>,
    id: &str,
    capture: SimulatedMediaCapture,
) -> Peer {
    let capture = Arc::new(capture);
    let transport = Arc::new(SimulatedTransport::new());
    let identity = StaticIdentityProvider::from_parts(id, &id.to_uppercase()).unwrap();
    let coordinator = SessionCoordinator::join(
        "R1",
        &identity,
        CallDependencies {
            bus,
            transport: transport.clone(),
            media: capture.clone(),
        },
        config(),
    )
    .await
    .unwrap();
    Peer {
        coordinator,
        capture,
        transport,
    }
}

/// Poll `condition` until it holds.
pub async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = timeout(WAIT, async {
        while !condition().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_for_state(peer: &Peer, expected: CallState) {
    eventually(&format!("state {expected}"), move || async move {
        peer.coordinator.state().await == expected
    })
    .await;
}

/// Wait until the call is up and the transport reports the peer connected.
pub async fn wait_connected(peer: &Peer) {
    wait_for_state(peer, CallState::Connected).await;
    eventually("remote connection", move || async move {
        peer.coordinator.snapshot().await.remote_connected
    })
    .await;
}

/// A bus subscriber that records everything published in the room.
pub struct Spy {
    inbox: SignalInbox,
    _subscription: Subscription,
    pub seen: Vec<SignalMessage>,
}

impl Spy {
    pub async fn attach(bus: &dyn SignalingBus) -> Spy {
        let mut subscription = bus.subscribe(&room()).await;
        let inbox = subscription.take_inbox().unwrap();
        Spy {
            inbox,
            _subscription: subscription,
            seen: Vec::new(),
        }
    }

    /// Move everything delivered so far into `seen`.
    pub fn collect(&mut self) -> &[SignalMessage] {
        while let Ok(message) = self.inbox.try_recv() {
            self.seen.push(message);
        }
        &self.seen
    }

    pub fn count(&mut self, kind: &str) -> usize {
        self.collect()
            .iter()
            .filter(|m| m.payload.kind() == kind)
            .count()
    }

    pub fn count_from(&mut self, sender: &str, kind: &str) -> usize {
        let sender = ParticipantId::new(sender.to_string()).unwrap();
        self.collect()
            .iter()
            .filter(|m| m.sender_id == sender && m.payload.kind() == kind)
            .count()
    }

    /// Negotiation ids of every answer seen.
    pub fn answers(&mut self) -> Vec<(ParticipantId, NegotiationId)> {
        self.collect()
            .iter()
            .filter_map(|m| match &m.payload {
                SignalPayload::Answer { negotiation_id, .. } => {
                    Some((m.sender_id.clone(), *negotiation_id))
                }
                _ => None,
            })
            .collect()
    }

    /// Distinct negotiation ids offered, with their offerer.
    pub fn offers(&mut self) -> Vec<(ParticipantId, NegotiationId)> {
        let mut offers: Vec<(ParticipantId, NegotiationId)> = Vec::new();
        for message in self.collect() {
            if let SignalPayload::Offer { negotiation_id, .. } = &message.payload
                && !offers.iter().any(|(_, id)| id == negotiation_id)
            {
                offers.push((message.sender_id.clone(), *negotiation_id));
            }
        }
        offers
    }
}
