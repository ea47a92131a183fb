pub mod simulated;

pub use simulated::{CaptureBehavior, SimulatedMediaCapture, SimulatedTrack};
