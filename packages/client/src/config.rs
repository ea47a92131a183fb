//! Call configuration.

use std::time::Duration;

use crate::domain::{IceServer, MediaPreference, SessionConfig};

/// Settings for a [`crate::SessionCoordinator`]
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// STUN/TURN servers handed to every transport session
    pub ice_servers: Vec<IceServer>,
    /// Camera/microphone preference at join time
    pub default_media: MediaPreference,
    /// Period of the call-duration ticker
    pub ticker_interval: Duration,
    /// Buffer size of the session event broadcast channel
    pub event_capacity: usize,
}

impl CallConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ice_servers: self.ice_servers.clone(),
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice_servers: IceServer::default_stun(),
            default_media: MediaPreference::default(),
            ticker_interval: Duration::from_secs(1),
            event_capacity: 256,
        }
    }
}
