//! # gatevisor
//!
//! **gatevisor** is a priority-aware, reentrant coordination library for
//! tokio applications sharing a throttled downstream resource.
//!
//! It combines three primitives behind one facade:
//! - per-key **reentrant semaphores** for admission control;
//! - per-key **pause barriers** letting short-lived priority operations
//!   ("coordinators") suspend long-running cooperative operations
//!   ("waiters", e.g. indexers) for the duration of a critical section;
//! - an explicit **unit context** carrying per-caller reentrancy and
//!   exemption state, so nested calls in any direction never deadlock.
//!
//! ## Architecture
//! ```text
//!   caller declares Access { key, intent } per protected operation
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Gate (facade)                                                  │
//! │  - SemaphoreRegistry (key → ReentrantSemaphore, lazy)           │
//! │  - barrier map       (key → PauseBarrier, lazy)                 │
//! │  - UnitOfWorkProbe / KeyResolver (integration seams)            │
//! │  - Bus (broadcast diagnostics events)                          │
//! └──────┬──────────────────────┬──────────────────────┬────────────┘
//!        ▼                      ▼                      ▼
//!   Intent::Default        Intent::Waiter        Intent::Coordinator
//!   permit only            permit +              permit +
//!                          checkpoint()          run_exclusive(op)
//!                               │                      │
//!                               ▼                      ▼
//!                    ┌───────────────────────────────────────┐
//!                    │  PauseBarrier (per key)               │
//!                    │  phase A: waiters in a checkpoint     │
//!                    │           park at the gate            │
//!                    │  critical section(s) run              │
//!                    │  phase B: last coordinator exits,     │
//!                    │           parked waiters released     │
//!                    └───────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//! - Reentrant: a unit re-entering a key it holds never blocks again; the
//!   real permit moves only on the 0→1 and 1→0 transitions.
//! - No self-deadlock: a coordinating unit skips its own gate; a unit with
//!   an active unit-of-work finishes its step before yielding.
//! - Guaranteed resume: coordinator windows and waiter registrations are
//!   Drop guards — failures, panics, and dropped futures all release the
//!   barrier.
//! - Degraded over stuck: interrupted waits log a warning and run the
//!   operation unprotected instead of blocking forever.
//!
//! ## Example
//! ```
//! use gatevisor::{Access, Gate, GateConfig, UnitContext};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = GateConfig::default();
//!     cfg.permits.insert("indexing".into(), 5);
//!     let gate = Gate::new(cfg);
//!
//!     let indexer = UnitContext::new();
//!     // One throttled indexing step that yields to coordinators.
//!     let indexed = gate
//!         .protect(&indexer, &Access::named("indexing").waiter(), async {
//!             // ... index a batch ...
//!             128
//!         })
//!         .await;
//!     assert_eq!(indexed, 128);
//!
//!     let request = UnitContext::new();
//!     // A user-facing request that pauses indexers while it runs.
//!     let rows: Result<u32, &str> = gate
//!         .protect(&request, &Access::named("indexing").coordinator(), async {
//!             Ok(42)
//!         })
//!         .await;
//!     assert_eq!(rows.unwrap(), 42);
//! }
//! ```

mod barrier;
mod config;
mod error;
mod events;
mod gate;
mod probe;
mod semaphore;
mod unit;

pub mod observers;

// ---- Public re-exports ----

pub use barrier::{CheckpointOutcome, PauseBarrier, PauseState};
pub use config::GateConfig;
pub use error::GateError;
pub use events::{Bus, EventKind, GateEvent};
pub use gate::{Access, Gate, GateBuilder, Intent, Key, DEFAULT_KEY};
pub use observers::{GateObserver, LogWriter};
pub use probe::{KeyResolver, UnitOfWorkProbe, WorkDepthProbe};
pub use semaphore::{ReentrantSemaphore, SemaphoreRegistry};
pub use unit::{ReleaseOutcome, UnitContext, UnitOfWork};
