//! Relay server configuration.

use crate::domain::DEFAULT_PARTICIPANT_CAPACITY;

/// Settings for [`crate::run_server`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Maximum participants per room
    pub room_capacity: usize,
}

impl ServerConfig {
    /// `host:port` string used for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            room_capacity: DEFAULT_PARTICIPANT_CAPACITY,
        }
    }
}
