//! Domain layer for the call core.
//!
//! Value objects, the room session aggregate, the signaling wire protocol and
//! the ports (traits) through which the core consumes its collaborators.

pub mod bus;
pub mod entity;
pub mod error;
pub mod identity;
pub mod media;
pub mod signal;
pub mod state;
pub mod transport;
pub mod value_object;

pub use bus::{SignalInbox, SignalingBus, Subscription, SubscriptionId};
pub use entity::{ChatEntry, RoomSession};
pub use error::{CallError, MediaError, TransportError, ValueObjectError};
pub use identity::{Identity, IdentityProvider};
pub use media::{LocalMedia, MediaCapture, MediaConstraints, MediaKind, MediaPreference, MediaTrack};
pub use signal::{
    IceCandidate, PresenceKind, SdpKind, SessionDescription, SignalMessage, SignalPayload,
};
pub use state::{CallState, FailureReason, NegotiationRole};
pub use transport::{
    ConnectionState, IceServer, RemoteTrack, SessionConfig, Transport, TransportEvent,
    TransportEventSender, TransportSession,
};
pub use value_object::{ChatText, DisplayName, NegotiationId, ParticipantId, RoomId, Timestamp};

#[cfg(test)]
pub use {
    bus::MockSignalingBus, identity::MockIdentityProvider, media::MockMediaCapture,
    transport::{MockTransport, MockTransportSession},
};
