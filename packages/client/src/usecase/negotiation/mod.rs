//! Negotiation Engine
//!
//! The call state machine of one participant: offer/answer, glare
//! resolution, candidate exchange and media lifecycle.

mod context;
mod engine;
mod prepare;

pub use engine::{
    CallDependencies, EngineNotification, EngineSettings, NegotiationEngine, NotificationSender,
};
