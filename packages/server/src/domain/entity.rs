//! Core domain models for the signaling relay.

use serde::{Deserialize, Serialize};

use super::{
    error::RoomError,
    value_object::{ClientId, RoomId, Timestamp},
};

/// Default maximum number of participants allowed in a room.
///
/// Calls are strictly two-party; a third joiner is turned away.
pub const DEFAULT_PARTICIPANT_CAPACITY: usize = 2;

/// Represents a signaling room and the participants currently attached to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier
    pub id: RoomId,
    /// List of participants currently in the room, in join order
    pub participants: Vec<Participant>,
    /// Timestamp when the room was created
    pub created_at: Timestamp,
    /// Maximum number of participants allowed (default: 2)
    pub participant_capacity: usize,
}

impl Room {
    /// Create a new empty room with the given ID and creation timestamp
    pub fn new(id: RoomId, created_at: Timestamp) -> Self {
        Self::with_capacity(id, created_at, DEFAULT_PARTICIPANT_CAPACITY)
    }

    /// Create a new empty room with a custom participant capacity
    pub fn with_capacity(id: RoomId, created_at: Timestamp, participant_capacity: usize) -> Self {
        Self {
            id,
            participants: Vec::new(),
            created_at,
            participant_capacity,
        }
    }

    /// Add a participant to the room
    ///
    /// # Errors
    ///
    /// - `RoomError::DuplicateParticipant` if the id is already present
    /// - `RoomError::CapacityExceeded` if the room is at full capacity
    pub fn add_participant(&mut self, participant: Participant) -> Result<(), RoomError> {
        if self.get_participant(&participant.id).is_some() {
            return Err(RoomError::DuplicateParticipant(
                participant.id.into_string(),
            ));
        }
        if self.participants.len() >= self.participant_capacity {
            return Err(RoomError::CapacityExceeded {
                capacity: self.participant_capacity,
                current: self.participants.len(),
            });
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Remove a participant from the room by ID, returning whether it was present
    pub fn remove_participant(&mut self, participant_id: &ClientId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| &p.id != participant_id);
        self.participants.len() != before
    }

    /// Get a participant by ID
    pub fn get_participant(&self, participant_id: &ClientId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == participant_id)
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Represents a participant attached to a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier (client_id)
    pub id: ClientId,
    /// Timestamp when the participant connected
    pub connected_at: Timestamp,
}

impl Participant {
    /// Create a new participant
    pub fn new(id: ClientId, connected_at: Timestamp) -> Self {
        Self { id, connected_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_id() -> RoomId {
        RoomId::new("consultation-1".to_string()).unwrap()
    }

    fn participant(id: &str, at: i64) -> Participant {
        Participant::new(ClientId::new(id.to_string()).unwrap(), Timestamp::new(at))
    }

    #[test]
    fn test_room_new() {
        // テスト項目: 新しい Room が空の状態で作成される
        // given (前提条件):
        let created_at = Timestamp::new(1000);

        // when (操作):
        let room = Room::new(room_id(), created_at);

        // then (期待する結果):
        assert_eq!(room.id, room_id());
        assert!(room.is_empty());
        assert_eq!(room.created_at, created_at);
        assert_eq!(room.participant_capacity, DEFAULT_PARTICIPANT_CAPACITY);
    }

    #[test]
    fn test_room_add_participant() {
        // テスト項目: 参加者を追加できる
        // given (前提条件):
        let mut room = Room::new(room_id(), Timestamp::new(0));

        // when (操作):
        let result = room.add_participant(participant("dr-sato", 1000));

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(room.participants.len(), 1);
        assert_eq!(room.participants[0].id.as_str(), "dr-sato");
    }

    #[test]
    fn test_room_add_duplicate_participant_fails() {
        // テスト項目: 同じ ID の参加者は二重に追加できない
        // given (前提条件):
        let mut room = Room::new(room_id(), Timestamp::new(0));
        room.add_participant(participant("dr-sato", 1000)).unwrap();

        // when (操作):
        let result = room.add_participant(participant("dr-sato", 2000));

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            RoomError::DuplicateParticipant("dr-sato".to_string())
        );
        assert_eq!(room.participants.len(), 1);
    }

    #[test]
    fn test_room_remove_participant() {
        // テスト項目: 参加者を削除できる
        // given (前提条件):
        let mut room = Room::new(room_id(), Timestamp::new(0));
        room.add_participant(participant("dr-sato", 1000)).unwrap();
        room.add_participant(participant("patient-tanaka", 2000))
            .unwrap();

        // when (操作):
        let removed = room.remove_participant(&ClientId::new("dr-sato".to_string()).unwrap());

        // then (期待する結果):
        assert!(removed);
        assert_eq!(room.participants.len(), 1);
        assert_eq!(room.participants[0].id.as_str(), "patient-tanaka");
    }

    #[test]
    fn test_room_remove_nonexistent_participant() {
        // テスト項目: 存在しない参加者の削除は false を返す
        // given (前提条件):
        let mut room = Room::new(room_id(), Timestamp::new(0));

        // when (操作):
        let removed = room.remove_participant(&ClientId::new("ghost".to_string()).unwrap());

        // then (期待する結果):
        assert!(!removed);
    }

    #[test]
    fn test_room_third_participant_rejected() {
        // テスト項目: 2 人部屋に 3 人目が参加しようとするとエラーが返される
        // given (前提条件):
        let mut room = Room::new(room_id(), Timestamp::new(0));
        room.add_participant(participant("dr-sato", 1000)).unwrap();
        room.add_participant(participant("patient-tanaka", 2000))
            .unwrap();

        // when (操作):
        let result = room.add_participant(participant("intruder", 3000));

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            RoomError::CapacityExceeded {
                capacity: 2,
                current: 2
            }
        );
        assert_eq!(room.participants.len(), 2);
    }

    #[test]
    fn test_room_get_participant() {
        // テスト項目: ID で参加者を取得できる
        // given (前提条件):
        let mut room = Room::with_capacity(room_id(), Timestamp::new(0), 5);
        let id = ClientId::new("dr-sato".to_string()).unwrap();
        room.add_participant(Participant::new(id.clone(), Timestamp::new(1000)))
            .unwrap();

        // when (操作):
        let found = room.get_participant(&id);

        // then (期待する結果):
        assert_eq!(found.map(|p| p.connected_at), Some(Timestamp::new(1000)));
    }
}
