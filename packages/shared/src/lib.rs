//! Shared utilities for the Tsunagu workspace.
//!
//! Logging setup and timestamp helpers used by both the signaling relay server
//! and the call client.

pub mod logger;
pub mod time;
