//! Deterministic stand-in for a peer-to-peer transport.
//!
//! Sessions synthesize SDP, emit one host candidate when the local
//! description is set and report `Connected` (plus one remote video track)
//! once both descriptions and at least one remote candidate are in place.
//! Like a real stack, a remote candidate is rejected until a remote
//! description has been applied.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    ConnectionState, IceCandidate, MediaKind, MediaTrack, RemoteTrack, SdpKind, SessionConfig,
    SessionDescription, Transport, TransportError, TransportEvent, TransportEventSender,
    TransportSession,
};

/// Fault injection for [`SimulatedTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBehavior {
    Healthy,
    /// Offer/answer creation fails
    FailNegotiation,
    /// Negotiation succeeds but the connection ends in `Failed`
    FailConnection,
}

pub struct SimulatedTransport {
    behavior: Mutex<TransportBehavior>,
    open_sessions: Arc<AtomicUsize>,
    next_session: AtomicU64,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::with_behavior(TransportBehavior::Healthy)
    }

    pub fn with_behavior(behavior: TransportBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            open_sessions: Arc::new(AtomicUsize::new(0)),
            next_session: AtomicU64::new(1),
        }
    }

    pub fn set_behavior(&self, behavior: TransportBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Sessions created and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn create_session(
        &self,
        config: &SessionConfig,
        events: TransportEventSender,
    ) -> Result<Arc<dyn TransportSession>, TransportError> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let behavior = *self.behavior.lock();
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            session = id,
            ice_servers = config.ice_servers.len(),
            "Simulated transport session created"
        );

        Ok(Arc::new(SimulatedSession {
            id,
            behavior,
            events,
            open_sessions: self.open_sessions.clone(),
            state: Mutex::new(SessionState::default()),
        }))
    }
}

#[derive(Default)]
struct SessionState {
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    local_tracks: Vec<MediaKind>,
    remote_candidates: Vec<IceCandidate>,
    connected: bool,
    closed: bool,
}

struct SimulatedSession {
    id: u64,
    behavior: TransportBehavior,
    events: TransportEventSender,
    open_sessions: Arc<AtomicUsize>,
    state: Mutex<SessionState>,
}

impl SimulatedSession {
    fn emit(&self, events: Vec<TransportEvent>) {
        for event in events {
            // The receiver is gone once the engine abandoned this session.
            let _ = self.events.send(event);
        }
    }

    fn ensure_open(state: &SessionState) -> Result<(), TransportError> {
        if state.closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn synthesize(&self, kind: SdpKind, tracks: &[MediaKind]) -> SessionDescription {
        let mut sdp = format!("v=0\r\no=- {} 1 IN IP4 127.0.0.1\r\ns=tsunagu\r\nt=0 0\r\n", self.id);
        for (index, track) in tracks.iter().enumerate() {
            sdp.push_str(&format!("m={track} 9 UDP/TLS/RTP/SAVPF 0\r\na=mid:{index}\r\n"));
        }
        SessionDescription { kind, sdp }
    }

    /// Events to emit if this call completed the connection.
    fn check_connected(&self, state: &mut SessionState) -> Vec<TransportEvent> {
        if state.connected
            || state.local.is_none()
            || state.remote.is_none()
            || state.remote_candidates.is_empty()
        {
            return Vec::new();
        }
        state.connected = true;

        if self.behavior == TransportBehavior::FailConnection {
            return vec![TransportEvent::ConnectionStateChanged(ConnectionState::Failed)];
        }
        vec![
            TransportEvent::ConnectionStateChanged(ConnectionState::Connecting),
            TransportEvent::RemoteTrack(RemoteTrack {
                id: format!("remote-video-{}", self.id),
                kind: MediaKind::Video,
            }),
            TransportEvent::ConnectionStateChanged(ConnectionState::Connected),
        ]
    }
}

#[async_trait]
impl TransportSession for SimulatedSession {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        if self.behavior == TransportBehavior::FailNegotiation {
            return Err(TransportError::Negotiation("injected offer failure".to_string()));
        }
        Ok(self.synthesize(SdpKind::Offer, &state.local_tracks))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let state = self.state.lock();
        Self::ensure_open(&state)?;
        if self.behavior == TransportBehavior::FailNegotiation {
            return Err(TransportError::Negotiation("injected answer failure".to_string()));
        }
        match &state.remote {
            Some(remote) if remote.kind == SdpKind::Offer => {
                Ok(self.synthesize(SdpKind::Answer, &state.local_tracks))
            }
            _ => Err(TransportError::Negotiation(
                "cannot answer without a remote offer".to_string(),
            )),
        }
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let events = {
            let mut state = self.state.lock();
            Self::ensure_open(&state)?;
            state.local = Some(description);
            let mut events = vec![TransportEvent::LocalCandidate(IceCandidate {
                candidate: format!(
                    "candidate:{id} 1 udp 2122260223 192.0.2.{host} {port} typ host",
                    id = self.id,
                    host = self.id % 250 + 1,
                    port = 50_000 + self.id % 10_000,
                ),
                sdp_mid: Some("0".to_string()),
                sdp_m_line_index: Some(0),
            })];
            events.extend(self.check_connected(&mut state));
            events
        };
        self.emit(events);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        let events = {
            let mut state = self.state.lock();
            Self::ensure_open(&state)?;
            state.remote = Some(description);
            self.check_connected(&mut state)
        };
        self.emit(events);
        Ok(())
    }

    async fn add_local_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.local_tracks.push(track.kind());
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let events = {
            let mut state = self.state.lock();
            Self::ensure_open(&state)?;
            if state.remote.is_none() {
                return Err(TransportError::Candidate(
                    "remote description not set".to_string(),
                ));
            }
            state.remote_candidates.push(candidate);
            self.check_connected(&mut state)
        };
        self.emit(events);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        self.emit(vec![TransportEvent::ConnectionStateChanged(
            ConnectionState::Closed,
        )]);
        Ok(())
    }
}
