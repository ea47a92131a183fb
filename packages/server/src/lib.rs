//! Room-scoped signaling relay for Tsunagu.
//!
//! Participants attach to a room over WebSocket and every text frame one of
//! them sends is forwarded, unmodified, to the other participant of the room.
//! Rooms hold at most two participants by default and exist only while
//! someone is connected. Nothing is persisted.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use config::ServerConfig;
pub use error::ServerError;
pub use ui::run as run_server;
