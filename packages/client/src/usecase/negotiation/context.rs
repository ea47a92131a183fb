//! State held for one offer/answer exchange.

use std::sync::Arc;

use tokio::{task::JoinHandle, time::Instant};

use crate::domain::{
    IceCandidate, LocalMedia, NegotiationId, NegotiationRole, ParticipantId, SessionDescription,
    TransportSession,
};

use super::prepare::close_quietly;

/// Remote candidates received before the remote description was applied.
///
/// Each candidate keeps the negotiation id it was published under, so a
/// buffer can be carried into a new exchange and only the matching entries
/// survive the flush.
#[derive(Debug, Default)]
pub(crate) struct CandidateBuffer {
    entries: Vec<(NegotiationId, IceCandidate)>,
}

impl CandidateBuffer {
    pub fn push(&mut self, negotiation_id: NegotiationId, candidate: IceCandidate) {
        self.entries.push((negotiation_id, candidate));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Empty the buffer, returning the candidates of `negotiation_id` in
    /// arrival order. Everything else is discarded.
    pub fn drain_for(&mut self, negotiation_id: NegotiationId) -> Vec<IceCandidate> {
        let entries = std::mem::take(&mut self.entries);
        let total = entries.len();
        let matching: Vec<IceCandidate> = entries
            .into_iter()
            .filter(|(id, _)| *id == negotiation_id)
            .map(|(_, candidate)| candidate)
            .collect();
        if matching.len() != total {
            tracing::debug!(
                dropped = total - matching.len(),
                "Discarding candidates of an abandoned negotiation"
            );
        }
        matching
    }
}

/// An offer that arrived while our own offer was still being prepared and
/// that we must answer once preparation finishes.
#[derive(Debug, Clone)]
pub(crate) struct RemoteOffer {
    pub from: ParticipantId,
    pub negotiation_id: NegotiationId,
    pub description: SessionDescription,
}

pub(crate) struct NegotiationContext {
    pub epoch: u64,
    pub role: NegotiationRole,
    pub negotiation_id: NegotiationId,
    pub media: Option<LocalMedia>,
    pub session: Option<Arc<dyn TransportSession>>,
    /// Media acquisition and description generation still in flight
    pub preparing: bool,
    /// Our offer or answer has been published
    pub local_published: bool,
    /// The remote answer is being applied
    pub remote_pending: bool,
    pub remote_applied: bool,
    pub remote_connected: bool,
    pub remote_media_announced: bool,
    /// Our offer or answer, once published
    pub local_description: Option<SessionDescription>,
    pub pending_local_candidates: Vec<IceCandidate>,
    /// Local candidates already published, kept for re-sending the offer
    pub published_candidates: Vec<IceCandidate>,
    pub pending_remote_candidates: CandidateBuffer,
    pub deferred_offer: Option<RemoteOffer>,
    pub connected_at: Option<Instant>,
    forwarder: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl NegotiationContext {
    pub fn new(
        epoch: u64,
        role: NegotiationRole,
        negotiation_id: NegotiationId,
        forwarder: JoinHandle<()>,
        pending_remote_candidates: CandidateBuffer,
    ) -> Self {
        Self {
            epoch,
            role,
            negotiation_id,
            media: None,
            session: None,
            preparing: true,
            local_published: false,
            remote_pending: false,
            remote_applied: false,
            remote_connected: false,
            remote_media_announced: false,
            local_description: None,
            pending_local_candidates: Vec::new(),
            published_candidates: Vec::new(),
            pending_remote_candidates,
            deferred_offer: None,
            connected_at: None,
            forwarder: Some(forwarder),
            ticker: None,
        }
    }

    /// Whether we are an offerer that has not received an answer yet.
    pub fn is_unanswered_offer(&self) -> bool {
        self.role == NegotiationRole::Offerer && !self.remote_pending && !self.remote_applied
    }

    pub fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn start_ticker(&mut self, ticker: JoinHandle<()>) {
        self.connected_at = Some(Instant::now());
        self.ticker = Some(ticker);
    }

    pub fn take_remote_candidates(&mut self) -> CandidateBuffer {
        std::mem::take(&mut self.pending_remote_candidates)
    }

    fn abort_tasks(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Stop the media, close the transport session and cancel the tasks.
    pub async fn release(mut self) {
        if let Some(media) = self.media.take() {
            media.stop();
        }
        self.release_keep_media().await;
    }

    /// Like [`release`](Self::release) but hands the captured media back.
    pub async fn release_keep_media(mut self) -> Option<LocalMedia> {
        self.abort_tasks();
        if let Some(session) = self.session.take() {
            close_quietly(session.as_ref()).await;
        }
        self.media.take()
    }
}

impl Drop for NegotiationContext {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
