//! The coordination facade: declared accesses dispatched over per-key
//! semaphores and pause barriers.

mod access;
mod core;

pub use access::{Access, Intent, Key};
pub use core::{Gate, GateBuilder, DEFAULT_KEY};
