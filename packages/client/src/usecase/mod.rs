//! UseCase 層
//!
//! ドメイン層のポートを組み合わせて、通話のネゴシエーションとルームセッションを実現します。

pub mod negotiation;
pub mod session_coordinator;

pub use negotiation::{CallDependencies, EngineNotification, EngineSettings, NegotiationEngine};
pub use session_coordinator::{SessionCoordinator, SessionEvent};
