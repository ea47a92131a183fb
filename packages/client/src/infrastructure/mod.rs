//! Infrastructure 層
//!
//! ドメイン層が定義する trait（SignalingBus, MediaCapture, Transport, IdentityProvider）の具体的な実装。

pub mod bus;
pub mod identity;
pub mod media;
pub mod transport;

pub use bus::{InMemorySignalingBus, WebSocketSignalingBus};
pub use identity::StaticIdentityProvider;
pub use media::{CaptureBehavior, SimulatedMediaCapture};
pub use transport::{SimulatedTransport, TransportBehavior};
