//! Media acquisition and local description generation.
//!
//! Runs outside the engine task; the result is posted back to the engine
//! inbox tagged with the epoch of the context that requested it.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{
    LocalMedia, MediaCapture, MediaConstraints, MediaError, MediaPreference, NegotiationRole,
    SessionConfig, SessionDescription, Transport, TransportError, TransportEventSender,
    TransportSession,
};

#[derive(Debug, Error)]
pub(crate) enum PrepareError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub(crate) struct PrepareRequest {
    pub role: NegotiationRole,
    /// Required for [`NegotiationRole::Answerer`]
    pub remote_offer: Option<SessionDescription>,
    /// Media kept from an abandoned offer
    pub reuse_media: Option<LocalMedia>,
    pub preference: MediaPreference,
    pub session_config: SessionConfig,
    pub events: TransportEventSender,
}

pub(crate) struct PreparedSession {
    pub media: LocalMedia,
    pub session: Arc<dyn TransportSession>,
    pub local_description: SessionDescription,
}

impl PreparedSession {
    pub async fn release(self) {
        self.media.stop();
        close_quietly(self.session.as_ref()).await;
    }
}

pub(crate) async fn close_quietly(session: &dyn TransportSession) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close transport session: {}", e);
    }
}

/// Acquire media, open a transport session and set the local description.
///
/// Nothing is held on failure: acquired tracks are stopped and the session
/// is closed before the error is returned.
pub(crate) async fn prepare_session(
    request: PrepareRequest,
    capture: &dyn MediaCapture,
    transport: &dyn Transport,
) -> Result<PreparedSession, PrepareError> {
    let media = match request.reuse_media {
        Some(media) => media,
        None => capture
            .acquire_local_media(MediaConstraints::default())
            .await?,
    };
    media.apply_preference(request.preference);

    let session = match transport
        .create_session(&request.session_config, request.events)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            media.stop();
            return Err(e.into());
        }
    };

    match negotiate(session.as_ref(), &media, request.role, request.remote_offer).await {
        Ok(local_description) => Ok(PreparedSession {
            media,
            session,
            local_description,
        }),
        Err(e) => {
            media.stop();
            close_quietly(session.as_ref()).await;
            Err(e.into())
        }
    }
}

async fn negotiate(
    session: &dyn TransportSession,
    media: &LocalMedia,
    role: NegotiationRole,
    remote_offer: Option<SessionDescription>,
) -> Result<SessionDescription, TransportError> {
    for track in media.tracks() {
        session.add_local_track(track.clone()).await?;
    }

    let description = match role {
        NegotiationRole::Offerer => session.create_offer().await?,
        NegotiationRole::Answerer => {
            let offer = remote_offer.ok_or_else(|| {
                TransportError::Negotiation("no remote offer to answer".to_string())
            })?;
            session.set_remote_description(offer).await?;
            session.create_answer().await?
        }
    };

    session.set_local_description(description.clone()).await?;
    Ok(description)
}
