//! UseCase: 通話ネゴシエーションエンジン
//!
//! One task per participant owns the call state machine. Every input (user
//! commands, bus messages, transport events and completions of suspended
//! operations) goes through a single inbox and is handled to completion
//! before the next one, so transitions never interleave.
//!
//! Suspended operations carry the epoch of the context that started them.
//! A completion whose epoch is no longer current is discarded and the
//! resources it carries are released on the spot.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::Instrument;

use crate::domain::{
    CallError, CallState, ChatEntry, ChatText, ConnectionState, DisplayName, FailureReason,
    IceCandidate, Identity, LocalMedia, MediaCapture, MediaKind, MediaPreference, NegotiationId,
    NegotiationRole, ParticipantId, PresenceKind, RemoteTrack, RoomId, SdpKind, SessionConfig,
    SessionDescription, SignalInbox, SignalMessage, SignalPayload, SignalingBus, Timestamp,
    Transport, TransportError, TransportEvent,
};

use super::{
    context::{CandidateBuffer, NegotiationContext, RemoteOffer},
    prepare::{PrepareError, PrepareRequest, PreparedSession, close_quietly, prepare_session},
};

/// Collaborators consumed by the call core.
#[derive(Clone)]
pub struct CallDependencies {
    pub bus: Arc<dyn SignalingBus>,
    pub transport: Arc<dyn Transport>,
    pub media: Arc<dyn MediaCapture>,
}

/// Per-room engine settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub identity: Identity,
    pub room_id: RoomId,
    /// `false` when the bus handed out a degraded subscription
    pub signaling_available: bool,
    pub session_config: SessionConfig,
    pub ticker_interval: Duration,
    pub preference: MediaPreference,
}

/// What the engine reports upward, in the order it happened.
#[derive(Debug)]
pub enum EngineNotification {
    StateChanged(CallState),
    RemoteConnected(bool),
    /// `None` once the remote track is gone
    RemoteMedia(Option<RemoteTrack>),
    ChatReceived(ChatEntry),
    /// Whole seconds since the call connected
    CallElapsed(u64),
    /// Ordering barrier; answered by whoever consumes the notifications
    Flush(oneshot::Sender<()>),
}

pub type NotificationSender = mpsc::UnboundedSender<EngineNotification>;

enum EngineCommand {
    StartCall {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    EndCall {
        done: oneshot::Sender<()>,
    },
    SetMediaEnabled {
        kind: MediaKind,
        enabled: bool,
        done: oneshot::Sender<()>,
    },
    Sync {
        done: oneshot::Sender<()>,
    },
    Leave {
        done: Option<oneshot::Sender<()>>,
    },
}

enum EngineInput {
    Command(EngineCommand),
    Signal(SignalMessage),
    Transport {
        epoch: u64,
        event: TransportEvent,
    },
    Prepared {
        epoch: u64,
        result: Result<PreparedSession, PrepareError>,
    },
    RemoteApplied {
        epoch: u64,
        result: Result<(), TransportError>,
    },
    Tick {
        epoch: u64,
    },
}

/// A preparation waiting for an earlier one to hand back the devices.
struct QueuedPreparation {
    epoch: u64,
    request: PrepareRequest,
}

/// Handle to a running engine. Dropping it makes the engine leave the room.
pub struct NegotiationEngine {
    inbox: mpsc::UnboundedSender<EngineInput>,
}

impl NegotiationEngine {
    /// Start the engine. It enters the room right away: state becomes
    /// `AwaitingPeer` and a `join` presence is published.
    pub fn spawn(
        settings: EngineSettings,
        dependencies: CallDependencies,
        notifications: NotificationSender,
    ) -> Self {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!(
            "negotiation",
            room_id = %settings.room_id,
            participant = %settings.identity.id
        );

        let actor = EngineActor {
            identity: settings.identity,
            room_id: settings.room_id,
            bus: dependencies.bus,
            signaling_available: settings.signaling_available,
            transport: dependencies.transport,
            media_capture: dependencies.media,
            session_config: settings.session_config,
            ticker_interval: settings.ticker_interval,
            preference: settings.preference,
            state: CallState::Idle,
            peer: None,
            context: None,
            next_epoch: 1,
            preparing_epoch: None,
            queued_preparation: None,
            inbox: inbox.clone(),
            notifications,
        };
        tokio::spawn(actor.run(inbox_rx).instrument(span));

        Self { inbox }
    }

    /// Feed a subscription inbox into the engine.
    pub fn forward_inbox(&self, mut signals: SignalInbox) -> JoinHandle<()> {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            while let Some(message) = signals.recv().await {
                if inbox.send(EngineInput::Signal(message)).is_err() {
                    break;
                }
            }
        })
    }

    pub async fn start_call(&self) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::StartCall { reply })?;
        rx.await.map_err(|_| engine_stopped())?
    }

    /// Never fails; a stopped engine has nothing left to end.
    pub async fn end_call(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(EngineCommand::EndCall { done }).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn set_media_enabled(&self, kind: MediaKind, enabled: bool) {
        let (done, rx) = oneshot::channel();
        if self
            .send(EngineCommand::SetMediaEnabled {
                kind,
                enabled,
                done,
            })
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Resolves once every input queued before it has been handled.
    pub async fn sync(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(EngineCommand::Sync { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// End the call, announce departure and stop the engine.
    pub async fn leave(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(EngineCommand::Leave { done: Some(done) }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: EngineCommand) -> Result<(), CallError> {
        self.inbox
            .send(EngineInput::Command(command))
            .map_err(|_| engine_stopped())
    }
}

impl Drop for NegotiationEngine {
    fn drop(&mut self) {
        let _ = self
            .inbox
            .send(EngineInput::Command(EngineCommand::Leave { done: None }));
    }
}

fn discard_preparation(queued: QueuedPreparation) {
    tracing::debug!(epoch = queued.epoch, "Dropping queued preparation");
    if let Some(media) = queued.request.reuse_media {
        media.stop();
    }
}

fn engine_stopped() -> CallError {
    CallError::InvalidOperation("negotiation engine has stopped".to_string())
}

struct EngineActor {
    identity: Identity,
    room_id: RoomId,
    bus: Arc<dyn SignalingBus>,
    signaling_available: bool,
    transport: Arc<dyn Transport>,
    media_capture: Arc<dyn MediaCapture>,
    session_config: SessionConfig,
    ticker_interval: Duration,
    preference: MediaPreference,
    state: CallState,
    /// The remote participant this engine negotiates with
    peer: Option<ParticipantId>,
    /// Present exactly while the state is `Negotiating` or `Connected`
    context: Option<NegotiationContext>,
    next_epoch: u64,
    /// Epoch of the preparation task still running, current or not
    preparing_epoch: Option<u64>,
    queued_preparation: Option<QueuedPreparation>,
    inbox: mpsc::UnboundedSender<EngineInput>,
    notifications: NotificationSender,
}

impl EngineActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<EngineInput>) {
        self.enter_room();

        while let Some(input) = inbox.recv().await {
            match input {
                EngineInput::Command(EngineCommand::Leave { done }) => {
                    self.leave().await;
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    break;
                }
                EngineInput::Command(command) => self.on_command(command).await,
                EngineInput::Signal(message) => self.on_signal(message).await,
                EngineInput::Transport { epoch, event } => {
                    self.on_transport_event(epoch, event).await
                }
                EngineInput::Prepared { epoch, result } => self.on_prepared(epoch, result).await,
                EngineInput::RemoteApplied { epoch, result } => {
                    self.on_remote_applied(epoch, result).await
                }
                EngineInput::Tick { epoch } => self.on_tick(epoch),
            }
        }

        // Completions already queued may still hold media or sessions.
        inbox.close();
        while let Ok(input) = inbox.try_recv() {
            if let EngineInput::Prepared {
                result: Ok(prepared),
                ..
            } = input
            {
                prepared.release().await;
            }
        }
        tracing::debug!("Negotiation engine stopped");
    }

    // ========================================
    // Commands
    // ========================================

    async fn on_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::StartCall { reply } => {
                let result = self.start_call();
                let _ = reply.send(result);
            }
            EngineCommand::EndCall { done } => {
                self.end_call().await;
                let _ = done.send(());
            }
            EngineCommand::SetMediaEnabled {
                kind,
                enabled,
                done,
            } => {
                self.preference = self.preference.with(kind, enabled);
                if let Some(media) = self.context.as_ref().and_then(|c| c.media.as_ref()) {
                    media.set_enabled(kind, enabled);
                }
                tracing::debug!(kind = %kind, enabled, "Local media preference updated");
                let _ = done.send(());
            }
            EngineCommand::Sync { done } => {
                let _ = done.send(());
            }
            EngineCommand::Leave { .. } => {}
        }
    }

    fn enter_room(&mut self) {
        self.set_state(CallState::AwaitingPeer);
        self.publish(SignalPayload::Presence {
            presence: PresenceKind::Join,
            display_name: self.identity.display_name.clone(),
        });
    }

    fn start_call(&mut self) -> Result<(), CallError> {
        if self.state.is_in_call() {
            tracing::debug!(state = %self.state, "Call already in progress");
            return Ok(());
        }
        if !self.signaling_available {
            tracing::warn!("Cannot start a call without signaling");
            self.set_state(CallState::Failed(FailureReason::NoSignaling));
            return Err(CallError::SignalingUnavailable);
        }
        if self.state != CallState::AwaitingPeer {
            self.set_state(CallState::AwaitingPeer);
        }
        self.begin_offer();
        Ok(())
    }

    async fn end_call(&mut self) {
        if matches!(self.state, CallState::Idle | CallState::Ended) {
            tracing::debug!(state = %self.state, "Nothing to end");
            return;
        }
        if self.teardown().await {
            self.publish_call_ended();
        }
        self.set_state(CallState::Ended);
    }

    async fn fail(&mut self, reason: FailureReason) {
        if self.teardown().await {
            self.publish_call_ended();
        }
        self.set_state(CallState::Failed(reason));
    }

    async fn leave(&mut self) {
        self.end_call().await;
        self.publish(SignalPayload::Presence {
            presence: PresenceKind::Leave,
            display_name: self.identity.display_name.clone(),
        });
        tracing::info!("Left room");
    }

    // ========================================
    // Negotiation lifecycle
    // ========================================

    fn begin_offer(&mut self) {
        self.begin_negotiation(
            NegotiationRole::Offerer,
            NegotiationId::generate(),
            None,
            None,
            CandidateBuffer::default(),
        );
    }

    fn begin_answer(
        &mut self,
        offer: RemoteOffer,
        reuse_media: Option<LocalMedia>,
        buffered: CandidateBuffer,
    ) {
        self.begin_negotiation(
            NegotiationRole::Answerer,
            offer.negotiation_id,
            Some(offer.description),
            reuse_media,
            buffered,
        );
    }

    fn begin_negotiation(
        &mut self,
        role: NegotiationRole,
        negotiation_id: NegotiationId,
        remote_offer: Option<SessionDescription>,
        reuse_media: Option<LocalMedia>,
        buffered: CandidateBuffer,
    ) {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let (events, mut events_rx) = mpsc::unbounded_channel();
        let inbox = self.inbox.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if inbox.send(EngineInput::Transport { epoch, event }).is_err() {
                    break;
                }
            }
        });

        let request = PrepareRequest {
            role,
            remote_offer,
            reuse_media,
            preference: self.preference,
            session_config: self.session_config.clone(),
            events,
        };
        if let Some(previous) = self.preparing_epoch {
            tracing::debug!(epoch, previous, "Waiting for the previous preparation to finish");
            if let Some(stale) = self
                .queued_preparation
                .replace(QueuedPreparation { epoch, request })
            {
                discard_preparation(stale);
            }
        } else {
            self.spawn_preparation(epoch, request);
        }

        tracing::info!(epoch, role = %role, negotiation_id = %negotiation_id, "Negotiation started");
        self.context = Some(NegotiationContext::new(
            epoch,
            role,
            negotiation_id,
            forwarder,
            buffered,
        ));
        self.set_state(CallState::Negotiating);
    }

    /// Run one preparation. At most one is in flight, so the devices are
    /// never opened twice at the same time.
    fn spawn_preparation(&mut self, epoch: u64, request: PrepareRequest) {
        self.preparing_epoch = Some(epoch);
        let capture = self.media_capture.clone();
        let transport = self.transport.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(
            async move {
                let result = prepare_session(request, capture.as_ref(), transport.as_ref()).await;
                if let Err(mpsc::error::SendError(EngineInput::Prepared {
                    result: Ok(prepared),
                    ..
                })) = inbox.send(EngineInput::Prepared { epoch, result })
                {
                    prepared.release().await;
                }
            }
            .in_current_span(),
        );
    }

    fn start_queued_preparation(&mut self) {
        if self.preparing_epoch.is_some() {
            return;
        }
        let Some(queued) = self.queued_preparation.take() else {
            return;
        };
        let current = self
            .context
            .as_ref()
            .is_some_and(|c| c.epoch == queued.epoch && c.preparing);
        if current {
            self.spawn_preparation(queued.epoch, queued.request);
        } else {
            discard_preparation(queued);
        }
    }

    async fn on_prepared(&mut self, epoch: u64, result: Result<PreparedSession, PrepareError>) {
        if self.preparing_epoch == Some(epoch) {
            self.preparing_epoch = None;
        }
        self.handle_prepared(epoch, result).await;
        self.start_queued_preparation();
    }

    async fn handle_prepared(&mut self, epoch: u64, result: Result<PreparedSession, PrepareError>) {
        let current = self
            .context
            .as_ref()
            .is_some_and(|c| c.epoch == epoch && c.preparing);
        if !current {
            tracing::debug!(epoch, "Discarding stale preparation");
            if let Ok(prepared) = result {
                prepared.release().await;
            }
            return;
        }

        let prepared = match result {
            Ok(prepared) => prepared,
            Err(PrepareError::Media(e)) => {
                tracing::warn!("Local media unavailable: {}", e);
                self.fail(FailureReason::MediaDenied).await;
                return;
            }
            Err(PrepareError::Transport(e)) => {
                tracing::warn!("Transport setup failed: {}", e);
                self.fail(FailureReason::TransportError).await;
                return;
            }
        };
        prepared.media.apply_preference(self.preference);

        let Some(ctx) = self.context.as_mut() else {
            prepared.release().await;
            return;
        };

        if let Some(offer) = ctx.deferred_offer.take() {
            tracing::info!(from = %offer.from, "Answering deferred offer");
            let buffered = ctx.take_remote_candidates();
            let PreparedSession { media, session, .. } = prepared;
            close_quietly(session.as_ref()).await;
            if let Some(old) = self.context.take() {
                old.release().await;
            }
            self.begin_answer(offer, Some(media), buffered);
            return;
        }

        ctx.preparing = false;
        ctx.media = Some(prepared.media);
        ctx.session = Some(prepared.session);
        ctx.local_description = Some(prepared.local_description.clone());
        let negotiation_id = ctx.negotiation_id;
        let role = ctx.role;
        let description = prepared.local_description;
        let payload = match role {
            NegotiationRole::Offerer => SignalPayload::Offer {
                negotiation_id,
                description,
            },
            NegotiationRole::Answerer => {
                ctx.remote_applied = true;
                SignalPayload::Answer {
                    negotiation_id,
                    description,
                }
            }
        };
        ctx.local_published = true;
        let held = std::mem::take(&mut ctx.pending_local_candidates);
        ctx.published_candidates.extend(held.iter().cloned());

        self.publish(payload);
        for candidate in held {
            self.publish(SignalPayload::IceCandidate {
                negotiation_id,
                candidate,
            });
        }

        if role == NegotiationRole::Answerer {
            self.flush_remote_candidates().await;
            self.enter_connected();
        }
    }

    async fn on_remote_applied(&mut self, epoch: u64, result: Result<(), TransportError>) {
        let Some(ctx) = self.context.as_mut().filter(|c| c.epoch == epoch) else {
            tracing::debug!(epoch, "Discarding stale remote description result");
            return;
        };
        ctx.remote_pending = false;

        match result {
            Ok(()) => {
                ctx.remote_applied = true;
                self.flush_remote_candidates().await;
            }
            Err(e) => {
                tracing::warn!("Failed to apply remote answer: {}", e);
                self.fail(FailureReason::TransportError).await;
            }
        }
    }

    async fn flush_remote_candidates(&mut self) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let Some(session) = ctx.session.clone() else {
            return;
        };
        let negotiation_id = ctx.negotiation_id;
        let candidates = ctx.pending_remote_candidates.drain_for(negotiation_id);
        if !candidates.is_empty() {
            tracing::debug!(count = candidates.len(), "Flushing buffered remote candidates");
        }
        for candidate in candidates {
            if let Err(e) = session.add_remote_candidate(candidate).await {
                tracing::warn!("Remote candidate rejected: {}", e);
            }
        }
    }

    fn enter_connected(&mut self) {
        self.set_state(CallState::Connected);

        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        if ctx.has_ticker() {
            return;
        }
        let epoch = ctx.epoch;
        let period = self.ticker_interval;
        let inbox = self.inbox.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if inbox.send(EngineInput::Tick { epoch }).is_err() {
                    break;
                }
            }
        });
        ctx.start_ticker(ticker);
    }

    fn on_tick(&mut self, epoch: u64) {
        let elapsed = self
            .context
            .as_ref()
            .filter(|c| c.epoch == epoch)
            .and_then(|c| c.connected_at)
            .map(|at| at.elapsed().as_secs());
        if let Some(secs) = elapsed {
            self.notify(EngineNotification::CallElapsed(secs));
        }
    }

    /// Release the context, if any. Returns whether there was one.
    async fn teardown(&mut self) -> bool {
        self.peer = None;
        if let Some(queued) = self.queued_preparation.take() {
            discard_preparation(queued);
        }
        let Some(ctx) = self.context.take() else {
            return false;
        };
        let epoch = ctx.epoch;
        let was_connected = ctx.remote_connected;
        let had_remote_media = ctx.remote_media_announced;
        ctx.release().await;

        if had_remote_media {
            self.notify(EngineNotification::RemoteMedia(None));
        }
        if was_connected {
            self.notify(EngineNotification::RemoteConnected(false));
        }
        tracing::debug!(epoch, "Negotiation context released");
        true
    }

    // ========================================
    // Transport events
    // ========================================

    async fn on_transport_event(&mut self, epoch: u64, event: TransportEvent) {
        let Some(ctx) = self.context.as_mut().filter(|c| c.epoch == epoch) else {
            tracing::trace!(epoch, "Ignoring event from a released session");
            return;
        };

        match event {
            TransportEvent::LocalCandidate(candidate) => {
                if !ctx.local_published {
                    ctx.pending_local_candidates.push(candidate);
                    return;
                }
                let negotiation_id = ctx.negotiation_id;
                ctx.published_candidates.push(candidate.clone());
                self.publish(SignalPayload::IceCandidate {
                    negotiation_id,
                    candidate,
                });
            }
            TransportEvent::RemoteTrack(track) => {
                tracing::info!(track = %track.id, kind = %track.kind, "Remote media available");
                ctx.remote_media_announced = true;
                self.notify(EngineNotification::RemoteMedia(Some(track)));
            }
            TransportEvent::ConnectionStateChanged(ConnectionState::Connected) => {
                ctx.remote_connected = true;
                self.notify(EngineNotification::RemoteConnected(true));
                if self.state == CallState::Negotiating {
                    self.enter_connected();
                }
            }
            TransportEvent::ConnectionStateChanged(ConnectionState::Disconnected) => {
                tracing::warn!("Transport disconnected; waiting for recovery");
                let was_connected = std::mem::replace(&mut ctx.remote_connected, false);
                if was_connected {
                    self.notify(EngineNotification::RemoteConnected(false));
                }
            }
            TransportEvent::ConnectionStateChanged(ConnectionState::Failed) => {
                tracing::warn!("Transport connection failed");
                self.fail(FailureReason::TransportError).await;
            }
            TransportEvent::ConnectionStateChanged(state) => {
                tracing::debug!(?state, "Transport connection state changed");
            }
        }
    }

    // ========================================
    // Signaling
    // ========================================

    async fn on_signal(&mut self, message: SignalMessage) {
        if message.sender_id == self.identity.id {
            tracing::trace!(kind = message.payload.kind(), "Discarding own message");
            return;
        }
        tracing::debug!(
            from = %message.sender_id,
            kind = message.payload.kind(),
            "Signal received"
        );

        let SignalMessage {
            sender_id,
            timestamp,
            payload,
        } = message;
        match payload {
            SignalPayload::Offer {
                negotiation_id,
                description,
            } => {
                self.on_offer(RemoteOffer {
                    from: sender_id,
                    negotiation_id,
                    description,
                })
                .await
            }
            SignalPayload::Answer {
                negotiation_id,
                description,
            } => self.on_answer(sender_id, negotiation_id, description),
            SignalPayload::IceCandidate {
                negotiation_id,
                candidate,
            } => {
                self.on_remote_candidate(sender_id, negotiation_id, candidate)
                    .await
            }
            SignalPayload::Chat {
                message_id,
                display_name,
                text,
            } => self.on_chat(message_id, display_name, text, timestamp),
            SignalPayload::Presence { presence, .. } => match presence {
                PresenceKind::Join => self.on_peer_join(sender_id),
                PresenceKind::Leave | PresenceKind::CallEnded => {
                    self.on_peer_hangup(sender_id, presence).await
                }
            },
        }
    }

    /// A sender other than the participant we are bound to.
    fn is_foreign(&self, sender: &ParticipantId) -> bool {
        self.peer.as_ref().is_some_and(|peer| peer != sender)
    }

    async fn on_offer(&mut self, offer: RemoteOffer) {
        if self.state.is_terminal() {
            tracing::debug!(state = %self.state, "Ignoring offer; call is over");
            return;
        }
        if self.is_foreign(&offer.from) {
            tracing::warn!(from = %offer.from, "Ignoring offer from a third participant");
            return;
        }
        if offer.description.kind != SdpKind::Offer {
            tracing::warn!(from = %offer.from, "Ignoring offer carrying a non-offer description");
            return;
        }

        let Some(ctx) = self.context.as_mut() else {
            self.peer = Some(offer.from.clone());
            self.begin_answer(offer, None, CandidateBuffer::default());
            return;
        };

        if ctx.is_unanswered_offer() {
            // Glare: the smaller participant id keeps its offer.
            if self.identity.id < offer.from {
                tracing::info!(from = %offer.from, "Glare; keeping our offer");
                self.peer = Some(offer.from);
                // The peer may have ignored our offer before it started its own.
                self.republish_offer();
                return;
            }
            tracing::info!(from = %offer.from, "Glare; yielding to the peer's offer");
            self.peer = Some(offer.from.clone());
            if ctx.preparing {
                ctx.deferred_offer = Some(offer);
                return;
            }
            let buffered = ctx.take_remote_candidates();
            let media = match self.context.take() {
                Some(old) => old.release_keep_media().await,
                None => None,
            };
            self.begin_answer(offer, media, buffered);
            return;
        }

        if ctx.role == NegotiationRole::Answerer && ctx.negotiation_id == offer.negotiation_id {
            tracing::debug!("Ignoring duplicate offer");
            return;
        }

        tracing::info!(from = %offer.from, "Peer restarted negotiation");
        self.teardown().await;
        self.peer = Some(offer.from.clone());
        self.begin_answer(offer, None, CandidateBuffer::default());
    }

    fn on_answer(
        &mut self,
        from: ParticipantId,
        negotiation_id: NegotiationId,
        description: SessionDescription,
    ) {
        if self.is_foreign(&from) {
            tracing::warn!(from = %from, "Ignoring answer from a third participant");
            return;
        }
        let Some(ctx) = self.context.as_mut() else {
            tracing::debug!("Ignoring answer without an active negotiation");
            return;
        };
        if ctx.role != NegotiationRole::Offerer
            || ctx.negotiation_id != negotiation_id
            || !ctx.local_published
            || ctx.remote_pending
            || ctx.remote_applied
            || description.kind != SdpKind::Answer
        {
            tracing::debug!(negotiation_id = %negotiation_id, "Ignoring stale answer");
            return;
        }
        let Some(session) = ctx.session.clone() else {
            return;
        };
        ctx.remote_pending = true;
        let epoch = ctx.epoch;
        self.peer = Some(from);

        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let result = session.set_remote_description(description).await;
            let _ = inbox.send(EngineInput::RemoteApplied { epoch, result });
        });
    }

    async fn on_remote_candidate(
        &mut self,
        from: ParticipantId,
        negotiation_id: NegotiationId,
        candidate: IceCandidate,
    ) {
        if self.is_foreign(&from) {
            tracing::warn!(from = %from, "Ignoring candidate from a third participant");
            return;
        }
        let Some(ctx) = self.context.as_mut() else {
            tracing::debug!("Ignoring candidate without an active negotiation");
            return;
        };
        if !ctx.remote_applied {
            ctx.pending_remote_candidates.push(negotiation_id, candidate);
            return;
        }
        if ctx.negotiation_id != negotiation_id {
            tracing::debug!(negotiation_id = %negotiation_id, "Ignoring stale candidate");
            return;
        }
        if let Some(session) = ctx.session.clone()
            && let Err(e) = session.add_remote_candidate(candidate).await
        {
            tracing::warn!("Remote candidate rejected: {}", e);
        }
    }

    fn on_chat(
        &mut self,
        message_id: String,
        display_name: DisplayName,
        text: String,
        sent_at: Timestamp,
    ) {
        if self.state.is_terminal() {
            tracing::debug!(state = %self.state, "Dropping chat; call is over");
            return;
        }
        let text = match ChatText::new(text) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Dropping invalid chat message: {}", e);
                return;
            }
        };
        self.notify(EngineNotification::ChatReceived(ChatEntry {
            id: message_id,
            sender_display_name: display_name,
            text: text.into_string(),
            is_local: false,
            sent_at,
        }));
    }

    fn on_peer_join(&mut self, from: ParticipantId) {
        if self.is_foreign(&from) {
            tracing::warn!(from = %from, "Ignoring join of a third participant");
            return;
        }

        match self.state {
            CallState::AwaitingPeer if self.context.is_none() => {
                if !self.signaling_available {
                    return;
                }
                tracing::info!(peer = %from, "Peer joined; calling");
                self.peer = Some(from);
                self.begin_offer();
            }
            CallState::Negotiating => {
                let Some(ctx) = self.context.as_ref() else {
                    return;
                };
                if !ctx.is_unanswered_offer() {
                    tracing::debug!(peer = %from, "Ignoring join during negotiation");
                    return;
                }
                let preparing = ctx.preparing;
                self.peer = Some(from);
                if !preparing {
                    // The peer subscribed after our offer went out.
                    tracing::info!("Peer joined after our offer; sending it again");
                    self.republish_offer();
                }
            }
            _ => {
                tracing::debug!(peer = %from, state = %self.state, "Ignoring join");
            }
        }
    }

    async fn on_peer_hangup(&mut self, from: ParticipantId, presence: PresenceKind) {
        // An unanswered offer has no peer yet; nobody can hang it up.
        if self.peer.as_ref() != Some(&from) {
            tracing::debug!(from = %from, ?presence, "Ignoring presence");
            return;
        }

        tracing::info!(peer = %from, ?presence, "Peer hung up");
        self.teardown().await;
        if self.state.is_in_call() {
            self.set_state(CallState::AwaitingPeer);
        }
    }

    // ========================================
    // Output
    // ========================================

    fn set_state(&mut self, state: CallState) {
        if self.state == state {
            return;
        }
        tracing::info!(from = %self.state, to = %state, "Call state changed");
        self.state = state;
        self.notify(EngineNotification::StateChanged(state));
    }

    fn publish(&self, payload: SignalPayload) {
        self.bus.publish(
            &self.room_id,
            SignalMessage::new(self.identity.id.clone(), payload),
        );
    }

    /// Send our pending offer and its candidates again. Receivers that
    /// already have it drop the copy as a duplicate.
    fn republish_offer(&self) {
        let Some(ctx) = self.context.as_ref() else {
            return;
        };
        let Some(description) = ctx.local_description.clone() else {
            return;
        };
        if ctx.role != NegotiationRole::Offerer || !ctx.local_published {
            return;
        }
        let negotiation_id = ctx.negotiation_id;
        self.publish(SignalPayload::Offer {
            negotiation_id,
            description,
        });
        for candidate in &ctx.published_candidates {
            self.publish(SignalPayload::IceCandidate {
                negotiation_id,
                candidate: candidate.clone(),
            });
        }
    }

    fn publish_call_ended(&self) {
        self.publish(SignalPayload::Presence {
            presence: PresenceKind::CallEnded,
            display_name: self.identity.display_name.clone(),
        });
    }

    fn notify(&self, notification: EngineNotification) {
        let _ = self.notifications.send(notification);
    }
}
