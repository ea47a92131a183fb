//! Fixed identity provider.

use crate::domain::{DisplayName, Identity, IdentityProvider, ParticipantId, ValueObjectError};

/// Always returns the identity it was built with (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    identity: Option<Identity>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Validate raw strings and build a provider from them.
    pub fn from_parts(id: &str, display_name: &str) -> Result<Self, ValueObjectError> {
        Ok(Self::new(Identity {
            id: ParticipantId::new(id.to_string())?,
            display_name: DisplayName::new(display_name.to_string())?,
        }))
    }

    /// A provider with no signed-in user.
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}
