pub mod simulated;

pub use simulated::{SimulatedTransport, TransportBehavior};
