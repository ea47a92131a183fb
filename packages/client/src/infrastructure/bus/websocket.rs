//! Signaling bus backed by the `tsunagu-server` WebSocket relay.
//!
//! Each subscribed room gets its own connection to
//! `/ws?room_id=..&client_id=..`. Messages travel as JSON text frames. The
//! relay forwards a frame to the other participants of the room only, so the
//! publisher does not receive its own messages back.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::domain::{
    ParticipantId, RoomId, SignalMessage, SignalingBus, Subscription, SubscriptionId,
};

struct RoomConnection {
    subscription: SubscriptionId,
    outbound: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
}

pub struct WebSocketSignalingBus {
    base_url: Url,
    participant_id: ParticipantId,
    connections: Mutex<HashMap<RoomId, RoomConnection>>,
}

impl WebSocketSignalingBus {
    /// `server_url` is the relay origin, e.g. `ws://127.0.0.1:8080`.
    pub fn new(server_url: &str, participant_id: ParticipantId) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(server_url)?,
            participant_id,
            connections: Mutex::new(HashMap::new()),
        })
    }

    fn room_url(&self, room_id: &RoomId) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join("/ws")?;
        url.query_pairs_mut()
            .clear()
            .append_pair("room_id", room_id.as_str())
            .append_pair("client_id", self.participant_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl SignalingBus for WebSocketSignalingBus {
    async fn subscribe(&self, room_id: &RoomId) -> Subscription {
        let url = match self.room_url(room_id) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(room_id = %room_id, "Invalid relay URL: {}", e);
                return Subscription::degraded(room_id.clone());
            }
        };

        let socket = match connect_async(url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(e) => {
                tracing::warn!(url = %url, "Failed to connect to signaling relay: {}", e);
                return Subscription::degraded(room_id.clone());
            }
        };
        tracing::info!(url = %url, "Connected to signaling relay");

        let (mut sink, mut stream) = socket.split();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let reader_room = room_id.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<SignalMessage>(text.as_str()) {
                            Ok(message) => {
                                if inbox_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(room_id = %reader_room, "Dropping malformed frame: {}", e);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(room_id = %reader_room, "Relay connection error: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!(room_id = %reader_room, "Relay reader stopped");
        });

        // Ends once the outbound sender is dropped (unsubscribe or bus drop).
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    tracing::warn!("Failed to send frame to relay: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let id = SubscriptionId::next();
        let previous = self.connections.lock().insert(
            room_id.clone(),
            RoomConnection {
                subscription: id,
                outbound,
                reader,
            },
        );
        if let Some(previous) = previous {
            previous.reader.abort();
        }

        Subscription::active(id, room_id.clone(), inbox_rx)
    }

    fn publish(&self, room_id: &RoomId, message: SignalMessage) {
        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to encode signaling message: {}", e);
                return;
            }
        };

        let connections = self.connections.lock();
        match connections.get(room_id) {
            Some(connection) => {
                if connection.outbound.send(frame).is_err() {
                    tracing::debug!(room_id = %room_id, "Relay connection closed; message dropped");
                }
            }
            None => {
                tracing::debug!(room_id = %room_id, "Not connected to room; message dropped");
            }
        }
    }

    fn unsubscribe(&self, subscription: &Subscription) {
        let mut connections = self.connections.lock();
        let matches = connections
            .get(subscription.room_id())
            .is_some_and(|c| c.subscription == subscription.id());
        if matches && let Some(connection) = connections.remove(subscription.room_id()) {
            connection.reader.abort();
            tracing::debug!(room_id = %subscription.room_id(), "Disconnected from relay");
        }
    }
}

impl Drop for WebSocketSignalingBus {
    fn drop(&mut self) {
        for (_, connection) in self.connections.lock().drain() {
            connection.reader.abort();
        }
    }
}
