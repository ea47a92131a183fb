//! HTTP API response DTOs for the signaling relay.

use serde::{Deserialize, Serialize};
use tsunagu_shared::time::timestamp_to_jst_rfc3339;

use crate::domain::{Participant, Room};

/// Room summary for list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: String,
    pub participants: Vec<String>,
    pub participant_capacity: usize,
    pub created_at: String, // ISO 8601
}

/// Room detail for detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub participants: Vec<ParticipantDetailDto>,
    pub participant_capacity: usize,
    pub created_at: String, // ISO 8601
}

/// Participant detail for room detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDetailDto {
    pub client_id: String,
    pub connected_at: String, // ISO 8601
}

impl From<&Room> for RoomSummaryDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.to_string(),
            participants: room.participants.iter().map(|p| p.id.to_string()).collect(),
            participant_capacity: room.participant_capacity,
            created_at: timestamp_to_jst_rfc3339(room.created_at.value()),
        }
    }
}

impl From<&Room> for RoomDetailDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.to_string(),
            participants: room.participants.iter().map(ParticipantDetailDto::from).collect(),
            participant_capacity: room.participant_capacity,
            created_at: timestamp_to_jst_rfc3339(room.created_at.value()),
        }
    }
}

impl From<&Participant> for ParticipantDetailDto {
    fn from(participant: &Participant) -> Self {
        Self {
            client_id: participant.id.to_string(),
            connected_at: timestamp_to_jst_rfc3339(participant.connected_at.value()),
        }
    }
}
