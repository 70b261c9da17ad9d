//! # Observer: user-facing event handlers.
//!
//! The [`GateObserver`] trait is the extension point for consuming the
//! coordination event stream. All [`GateEvent`]s flow through the gate's
//! [`Bus`](crate::Bus); [`attach`](crate::observers::attach) pumps them into
//! an observer until cancelled.
//!
//! Typical uses: metrics export, alerting on `waiter_interrupted` /
//! `acquire_interrupted`, structured logging.
//!
//! # Example: custom observer
//! ```no_run
//! use async_trait::async_trait;
//! use gatevisor::{EventKind, GateEvent, GateObserver};
//!
//! struct PauseCounter;
//!
//! #[async_trait]
//! impl GateObserver for PauseCounter {
//!     async fn on_event(&self, event: &GateEvent) {
//!         if event.kind == EventKind::PauseRequested {
//!             // export a counter, ping an alert, ...
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::GateEvent;

/// Trait for receiving coordination events from the bus.
#[async_trait]
pub trait GateObserver: Send + Sync {
    /// Called for every received [`GateEvent`].
    async fn on_event(&self, event: &GateEvent);
}
