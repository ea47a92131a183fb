//! Identity provider port.

use super::value_object::{DisplayName, ParticipantId};

/// The local user as seen by the call core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: ParticipantId,
    pub display_name: DisplayName,
}

#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// `None` means the user is not permitted to join.
    fn current_identity(&self) -> Option<Identity>;
}
