//! WebSocket endpoint DTOs.
//!
//! The relay does not define a message schema of its own; frames are passed
//! through untouched. Only the upgrade request carries structured data.

use serde::Deserialize;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub room_id: String,
    pub client_id: String,
}
