//! Signaling bus implementations.

pub mod inmemory;
pub mod websocket;

pub use inmemory::InMemorySignalingBus;
pub use websocket::WebSocketSignalingBus;
