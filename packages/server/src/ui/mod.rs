//! HTTP / WebSocket front of the signaling relay.

mod handler;
mod runner;
mod signal;
pub mod state;

pub use runner::{build_router, run};
