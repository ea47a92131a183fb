//! Call state machine vocabulary.

use std::fmt;

/// Why a call attempt ended in [`CallState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    MediaDenied,
    TransportError,
    NoSignaling,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MediaDenied => "media-denied",
            Self::TransportError => "transport-error",
            Self::NoSignaling => "no-signaling",
        };
        f.write_str(label)
    }
}

/// State of the call within a room.
///
/// ```text
/// Idle -> AwaitingPeer -> Negotiating -> Connected -> Ended
///              \______________\______________\______-> Failed(reason)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    #[default]
    Idle,
    AwaitingPeer,
    Negotiating,
    Connected,
    Ended,
    Failed(FailureReason),
}

impl CallState {
    /// A negotiation context exists in these states and only these.
    pub fn is_in_call(&self) -> bool {
        matches!(self, Self::Negotiating | Self::Connected)
    }

    /// States left only through an explicit new "start call".
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed(_))
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Failed(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AwaitingPeer => f.write_str("awaiting-peer"),
            Self::Negotiating => f.write_str("negotiating"),
            Self::Connected => f.write_str("connected"),
            Self::Ended => f.write_str("ended"),
            Self::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

/// Side of the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Offerer,
    Answerer,
}

impl fmt::Display for NegotiationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offerer => f.write_str("offerer"),
            Self::Answerer => f.write_str("answerer"),
        }
    }
}
