//! Repository trait (port) for room state.
//!
//! The domain layer owns the abstraction; `infrastructure::repository` provides
//! the implementation (dependency inversion).

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::{ClientId, RepositoryError, Room, RoomId, Timestamp};

/// Outbound channel of a connected client. Frames pushed here are written to
/// that client's WebSocket.
pub type ClientSender = UnboundedSender<String>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Get a snapshot of one room.
    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError>;

    /// Snapshot of every room that currently has participants, ordered by id.
    async fn get_rooms(&self) -> Vec<Room>;

    /// Attach a participant, creating the room on first join.
    async fn add_participant(
        &self,
        room_id: RoomId,
        client_id: ClientId,
        sender: ClientSender,
        connected_at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// Detach a participant. The room is dropped once it becomes empty.
    ///
    /// Returns the number of participants left in the room.
    async fn remove_participant(
        &self,
        room_id: &RoomId,
        client_id: &ClientId,
    ) -> Result<usize, RepositoryError>;

    /// Senders of every participant in the room except `exclude`.
    async fn get_peer_senders(
        &self,
        room_id: &RoomId,
        exclude: &ClientId,
    ) -> Vec<(ClientId, ClientSender)>;
}
