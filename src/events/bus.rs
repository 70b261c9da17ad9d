//! # Event bus for broadcasting coordination events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing from multiple sources (gate, semaphores,
//! barriers — including Drop guards, which is why publishing must never
//! block or await).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls
//!   `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all
//!   receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip
//!   `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send
//!   time. The coordinator itself never depends on delivery; the bus is for
//!   diagnostics and tests.

use tokio::sync::broadcast;

use super::event::GateEvent;

/// Broadcast channel for coordination events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); multiple
/// publishers can publish concurrently and subscribers receive clones of
/// each event.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<GateEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<GateEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers the event is dropped; this function still
    /// returns immediately.
    pub fn publish(&self, ev: GateEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    ///
    /// A receiver only gets events sent **after** it subscribes; slow
    /// receivers observe `RecvError::Lagged(n)` and skip missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.tx.subscribe()
    }
}
