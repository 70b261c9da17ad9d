//! Pause/resume coordination: per-key two-phase rendezvous between
//! coordinators and waiters.

mod pause;

pub use pause::{CheckpointOutcome, PauseBarrier, PauseState};
