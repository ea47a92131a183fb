//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("ParticipantId cannot be empty")]
    ParticipantIdEmpty,

    #[error("ParticipantId cannot exceed {max} characters (got {actual})")]
    ParticipantIdTooLong { max: usize, actual: usize },

    #[error("RoomId cannot be empty")]
    RoomIdEmpty,

    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    #[error("DisplayName cannot be empty")]
    DisplayNameEmpty,

    #[error("DisplayName cannot exceed {max} characters (got {actual})")]
    DisplayNameTooLong { max: usize, actual: usize },

    #[error("Chat message cannot be empty")]
    ChatTextBlank,

    #[error("Chat message cannot exceed {max} characters (got {actual})")]
    ChatTextTooLong { max: usize, actual: usize },
}

/// Errors reported by a [`super::MediaCapture`] implementation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The user refused access to camera or microphone
    #[error("Permission to capture media was denied")]
    PermissionDenied,

    /// No usable capture device
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Errors reported by a [`super::Transport`] or [`super::TransportSession`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to create transport session: {0}")]
    SessionCreation(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Candidate rejected: {0}")]
    Candidate(String),

    #[error("Transport session is closed")]
    Closed,
}

/// Errors surfaced by the session coordinator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Media unavailable: {0}")]
    MediaDenied(#[from] MediaError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Signaling is unavailable; no peer is reachable")]
    SignalingUnavailable,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<ValueObjectError> for CallError {
    fn from(error: ValueObjectError) -> Self {
        Self::InvalidOperation(error.to_string())
    }
}
