//! Core domain models for a participant's view of a room.

use super::{
    identity::Identity,
    media::MediaPreference,
    state::CallState,
    transport::RemoteTrack,
    value_object::{DisplayName, RoomId, Timestamp},
};

/// One line of the room chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    /// Message id as published on the bus
    pub id: String,
    pub sender_display_name: DisplayName,
    pub text: String,
    /// Whether the local participant wrote it
    pub is_local: bool,
    pub sent_at: Timestamp,
}

/// A participant's session in one room (aggregate root)
///
/// The chat log is append-only and kept in receipt order.
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub room_id: RoomId,
    pub local_participant: Identity,
    pub state: CallState,
    pub local_media_enabled: MediaPreference,
    pub remote_connected: bool,
    pub signaling_available: bool,
    /// Last remote track announced by the transport
    pub remote_media: Option<RemoteTrack>,
    /// Seconds since the current call connected
    pub call_elapsed_secs: u64,
    chat_log: Vec<ChatEntry>,
}

impl RoomSession {
    pub fn new(
        room_id: RoomId,
        local_participant: Identity,
        local_media_enabled: MediaPreference,
        signaling_available: bool,
    ) -> Self {
        Self {
            room_id,
            local_participant,
            state: CallState::Idle,
            local_media_enabled,
            remote_connected: false,
            signaling_available,
            remote_media: None,
            call_elapsed_secs: 0,
            chat_log: Vec::new(),
        }
    }

    pub fn chat_log(&self) -> &[ChatEntry] {
        &self.chat_log
    }

    pub fn append_chat(&mut self, entry: ChatEntry) {
        self.chat_log.push(entry);
    }
}
