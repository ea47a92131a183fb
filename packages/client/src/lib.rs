//! Call negotiation core for Tsunagu.
//!
//! Establishes a two-party audio/video/chat session over an out-of-band
//! signaling bus:
//!
//! - [`domain::SignalingBus`]: room-scoped broadcast of [`domain::SignalMessage`]s
//! - [`usecase::NegotiationEngine`]: the call state machine of one participant
//! - [`SessionCoordinator`]: the room-level façade a UI talks to
//!
//! The media stack and the peer-to-peer transport are consumed through the
//! [`domain::MediaCapture`] and [`domain::Transport`] ports.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod usecase;

// Re-export entry points
pub use config::CallConfig;
pub use usecase::{CallDependencies, SessionCoordinator, SessionEvent};
