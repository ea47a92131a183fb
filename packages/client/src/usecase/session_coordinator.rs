//! UseCase: ルームセッションの調整
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SessionCoordinator の join / start_call / end_call / toggle / send_chat / leave
//! - エンジンからの通知が RoomSession とイベントストリームに反映されること
//!
//! ### なぜこのテストが必要か
//! - UI が参照するのは RoomSession のスナップショットとイベントのみ
//! - 入力検証（空のルーム ID、空のチャット、ID なし）は状態を変えずに拒否する必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：入室、チャット送信、カメラ・マイクの切り替え
//! - 異常系：ID のない利用者、空のルーム ID、空白のみのチャット
//! - エッジケース：シグナリングが使えない環境

use std::sync::Arc;

use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    config::CallConfig,
    domain::{
        CallError, CallState, ChatEntry, ChatText, FailureReason, IdentityProvider, MediaKind,
        MediaPreference, ParticipantId, RemoteTrack, RoomId, RoomSession, SignalMessage,
        SignalPayload, SignalingBus, Subscription, Timestamp,
    },
};

use super::negotiation::{
    CallDependencies, EngineNotification, EngineSettings, NegotiationEngine, NotificationSender,
};

/// Upward notifications of a room session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        state: CallState,
        reason: Option<FailureReason>,
    },
    ChatMessage(ChatEntry),
    RemoteMediaAvailable(RemoteTrack),
    RemoteMediaEnded,
    RemoteConnectionChanged(bool),
    LocalMediaChanged(MediaPreference),
    /// Seconds since the call connected
    CallElapsed(u64),
}

/// Room-level façade over the negotiation engine.
///
/// Owns the [`RoomSession`] (chat log and call UI state) and the bus
/// subscription of one participant in one room.
pub struct SessionCoordinator {
    session: Arc<Mutex<RoomSession>>,
    events: broadcast::Sender<SessionEvent>,
    engine: NegotiationEngine,
    bus: Arc<dyn SignalingBus>,
    subscription: Subscription,
    notifications: NotificationSender,
    pump: Option<JoinHandle<()>>,
    observer: JoinHandle<()>,
}

impl SessionCoordinator {
    /// Join a room.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidOperation` if the room id is invalid or the
    /// identity provider has no user. A bus that cannot open the room does
    /// not fail the join; see [`signaling_available`](Self::signaling_available).
    pub async fn join(
        room_id: &str,
        identity_provider: &dyn IdentityProvider,
        dependencies: CallDependencies,
        config: CallConfig,
    ) -> Result<Self, CallError> {
        let room_id = RoomId::new(room_id.to_string())?;
        let identity = identity_provider.current_identity().ok_or_else(|| {
            CallError::InvalidOperation("no identity available; not permitted to join".to_string())
        })?;

        let mut subscription = dependencies.bus.subscribe(&room_id).await;
        let signaling_available = subscription.is_active();
        if !signaling_available {
            tracing::warn!(room_id = %room_id, "Signaling unavailable; no peer is reachable");
        }

        let session = Arc::new(Mutex::new(RoomSession::new(
            room_id.clone(),
            identity.clone(),
            config.default_media,
            signaling_available,
        )));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        let observer = tokio::spawn(observe(notifications_rx, session.clone(), events.clone()));

        let bus = dependencies.bus.clone();
        let engine = NegotiationEngine::spawn(
            EngineSettings {
                identity: identity.clone(),
                room_id: room_id.clone(),
                signaling_available,
                session_config: config.session_config(),
                ticker_interval: config.ticker_interval,
                preference: config.default_media,
            },
            dependencies,
            notifications.clone(),
        );
        let pump = subscription
            .take_inbox()
            .map(|inbox| engine.forward_inbox(inbox));

        let coordinator = Self {
            session,
            events,
            engine,
            bus,
            subscription,
            notifications,
            pump,
            observer,
        };
        coordinator.engine.sync().await;
        coordinator.flush().await;

        tracing::info!(
            room_id = %room_id,
            participant = %identity.id,
            signaling_available,
            "Joined room"
        );
        Ok(coordinator)
    }

    /// Start a call, or restart one after `Ended`/`Failed`.
    ///
    /// Returns once the attempt has begun; its outcome arrives as
    /// [`SessionEvent::StateChanged`].
    pub async fn start_call(&self) -> Result<(), CallError> {
        let result = self.engine.start_call().await;
        self.flush().await;
        result
    }

    /// Tear down the current call. Safe in any state.
    pub async fn end_call(&self) {
        self.engine.end_call().await;
        self.flush().await;
    }

    pub async fn toggle_camera(&self) -> MediaPreference {
        self.toggle(MediaKind::Video).await
    }

    pub async fn toggle_microphone(&self) -> MediaPreference {
        self.toggle(MediaKind::Audio).await
    }

    async fn toggle(&self, kind: MediaKind) -> MediaPreference {
        // Held until the engine has applied it, so toggles reach the tracks
        // in the same order they reach the session.
        let mut session = self.session.lock().await;
        let preference = session.local_media_enabled.toggled(kind);
        session.local_media_enabled = preference;
        self.engine
            .set_media_enabled(kind, preference.is_enabled(kind))
            .await;
        let _ = self.events.send(SessionEvent::LocalMediaChanged(preference));
        preference
    }

    /// Append a local chat entry and publish it to the room.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidOperation` for blank or oversized text.
    pub async fn send_chat(&self, text: &str) -> Result<ChatEntry, CallError> {
        let text = ChatText::new(text.to_string())?;

        let entry = {
            let mut session = self.session.lock().await;
            let entry = ChatEntry {
                id: uuid::Uuid::new_v4().to_string(),
                sender_display_name: session.local_participant.display_name.clone(),
                text: text.into_string(),
                is_local: true,
                sent_at: Timestamp::now(),
            };
            session.append_chat(entry.clone());

            // Published under the lock so the log order matches the wire order.
            self.bus.publish(
                &session.room_id,
                SignalMessage {
                    sender_id: session.local_participant.id.clone(),
                    timestamp: entry.sent_at,
                    payload: SignalPayload::Chat {
                        message_id: entry.id.clone(),
                        display_name: entry.sender_display_name.clone(),
                        text: entry.text.clone(),
                    },
                },
            );
            entry
        };

        let _ = self.events.send(SessionEvent::ChatMessage(entry.clone()));
        Ok(entry)
    }

    /// End the call, announce departure and release the room.
    pub async fn leave(self) {
        self.engine.leave().await;
        self.flush().await;
        self.bus.unsubscribe(&self.subscription);
        let room_id = self.subscription.room_id().clone();
        drop(self);
        tracing::info!(room_id = %room_id, "Left room");
    }

    /// A consistent copy of the room session.
    pub async fn snapshot(&self) -> RoomSession {
        self.session.lock().await.clone()
    }

    pub async fn state(&self) -> CallState {
        self.session.lock().await.state
    }

    pub async fn chat_log(&self) -> Vec<ChatEntry> {
        self.session.lock().await.chat_log().to_vec()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn signaling_available(&self) -> bool {
        self.subscription.is_active()
    }

    pub fn room_id(&self) -> &RoomId {
        self.subscription.room_id()
    }

    /// Wait until every engine notification sent so far is reflected in
    /// the session.
    async fn flush(&self) {
        let (done, rx) = oneshot::channel();
        if self
            .notifications
            .send(EngineNotification::Flush(done))
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub async fn participant_id(&self) -> ParticipantId {
        self.session.lock().await.local_participant.id.clone()
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.subscription);
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.observer.abort();
    }
}

async fn observe(
    mut notifications: mpsc::UnboundedReceiver<EngineNotification>,
    session: Arc<Mutex<RoomSession>>,
    events: broadcast::Sender<SessionEvent>,
) {
    while let Some(notification) = notifications.recv().await {
        let event = {
            let mut session = session.lock().await;
            apply(&mut session, notification)
        };
        if let Some(event) = event {
            // No receivers is fine.
            let _ = events.send(event);
        }
    }
}

fn apply(session: &mut RoomSession, notification: EngineNotification) -> Option<SessionEvent> {
    match notification {
        EngineNotification::StateChanged(state) => {
            if state == CallState::Negotiating {
                session.call_elapsed_secs = 0;
            }
            session.state = state;
            Some(SessionEvent::StateChanged {
                state,
                reason: state.failure_reason(),
            })
        }
        EngineNotification::RemoteConnected(connected) => {
            if session.remote_connected == connected {
                return None;
            }
            session.remote_connected = connected;
            Some(SessionEvent::RemoteConnectionChanged(connected))
        }
        EngineNotification::RemoteMedia(Some(track)) => {
            session.remote_media = Some(track.clone());
            Some(SessionEvent::RemoteMediaAvailable(track))
        }
        EngineNotification::RemoteMedia(None) => session
            .remote_media
            .take()
            .map(|_| SessionEvent::RemoteMediaEnded),
        EngineNotification::ChatReceived(entry) => {
            session.append_chat(entry.clone());
            Some(SessionEvent::ChatMessage(entry))
        }
        EngineNotification::CallElapsed(secs) => {
            session.call_elapsed_secs = secs;
            Some(SessionEvent::CallElapsed(secs))
        }
        EngineNotification::Flush(done) => {
            let _ = done.send(());
            None
        }
    }
}
