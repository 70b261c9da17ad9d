//! Event bus and event types for observing coordination transitions.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, GateEvent};
