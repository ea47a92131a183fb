//! Domain layer for the signaling relay.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod repository;
pub mod value_object;

pub use entity::{DEFAULT_PARTICIPANT_CAPACITY, Participant, Room};
pub use error::{RepositoryError, RoomError, ValueObjectError};
pub use repository::{ClientSender, RoomRepository};
pub use value_object::{ClientId, RoomId, SignalFrame, Timestamp};

#[cfg(test)]
pub use repository::MockRoomRepository;
