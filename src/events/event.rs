//! # Coordination events emitted by the gate, semaphores, and barriers.
//!
//! [`EventKind`] classifies transitions across three categories:
//! - **Admission events**: permit acquire/release flow, including the
//!   defensive paths (interrupted acquire, unmatched release).
//! - **Pause events**: coordinator windows opening and closing.
//! - **Waiter events**: checkpoint outcomes (parked, resumed, exempt,
//!   interrupted).
//!
//! The [`GateEvent`] struct carries metadata such as the key, the execution
//! unit id, hold depths, and free-form reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore exact order when events are consumed
//! out of order.
//!
//! ## Example
//! ```rust
//! use gatevisor::{EventKind, GateEvent};
//!
//! let ev = GateEvent::new(EventKind::WaiterParked)
//!     .with_key("indexing")
//!     .with_unit(7);
//!
//! assert_eq!(ev.kind, EventKind::WaiterParked);
//! assert_eq!(ev.key.as_deref(), Some("indexing"));
//! assert_eq!(ev.unit, Some(7));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of coordination events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission events ===
    /// A unit acquired (or re-entered) a permit on a key.
    ///
    /// Sets: `key`, `unit`, `depth` (hold depth after the acquire).
    PermitAcquired,

    /// A unit released a hold on a key. The real permit is returned only
    /// when `depth` reaches zero.
    ///
    /// Sets: `key`, `unit`, `depth` (hold depth after the release).
    PermitReleased,

    /// A release arrived with no matching acquire. Defensive no-op.
    ///
    /// Sets: `key`, `unit`.
    PermitUnmatched,

    /// A blocked acquire was interrupted; the unit proceeds unprotected.
    ///
    /// Sets: `key`, `unit`.
    AcquireInterrupted,

    /// A key was not present in the configuration; the default permit count
    /// was used instead.
    ///
    /// Sets: `key`, `depth` (the permit count actually applied).
    KeyMisconfigured,

    // === Pause events ===
    /// The outermost coordinator opened a pause window; waiters will park at
    /// their next checkpoint.
    ///
    /// Sets: `key`.
    PauseRequested,

    /// The last concurrent coordinator exited; parked waiters were released.
    ///
    /// Sets: `key`.
    PauseResumed,

    // === Waiter events ===
    /// A waiter acknowledged the pause and parked at the gate.
    ///
    /// Sets: `key`, `unit`.
    WaiterParked,

    /// A parked waiter was released after the critical sections finished.
    ///
    /// Sets: `key`, `unit`.
    WaiterResumed,

    /// A waiter skipped the pause: it is itself coordinating on this key, or
    /// it has an active unit-of-work.
    ///
    /// Sets: `key`, `unit`, `reason` (`"coordinating"` or `"unit-of-work"`).
    WaiterExempt,

    /// A parked waiter was interrupted and resumed unprotected.
    ///
    /// Sets: `key`, `unit`.
    WaiterInterrupted,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::PermitAcquired => "permit_acquired",
            EventKind::PermitReleased => "permit_released",
            EventKind::PermitUnmatched => "permit_unmatched",
            EventKind::AcquireInterrupted => "acquire_interrupted",
            EventKind::KeyMisconfigured => "key_misconfigured",
            EventKind::PauseRequested => "pause_requested",
            EventKind::PauseResumed => "pause_resumed",
            EventKind::WaiterParked => "waiter_parked",
            EventKind::WaiterResumed => "waiter_resumed",
            EventKind::WaiterExempt => "waiter_exempt",
            EventKind::WaiterInterrupted => "waiter_interrupted",
        }
    }
}

/// Coordination event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct GateEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Key the event refers to, if applicable.
    pub key: Option<Arc<str>>,
    /// Execution unit id, if applicable.
    pub unit: Option<u64>,
    /// Hold depth or applied permit count, depending on the kind.
    pub depth: Option<u32>,
    /// Human-readable reason (exemptions, fallback details, etc.).
    pub reason: Option<Arc<str>>,
}

impl GateEvent {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            unit: None,
            depth: None,
            reason: None,
        }
    }

    /// Attaches the key name.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches the execution unit id.
    #[inline]
    pub fn with_unit(mut self, unit: u64) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attaches a hold depth / permit count.
    #[inline]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = GateEvent::new(EventKind::PauseRequested);
        let b = GateEvent::new(EventKind::PauseResumed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = GateEvent::new(EventKind::WaiterExempt)
            .with_key("indexing")
            .with_unit(3)
            .with_depth(2)
            .with_reason("unit-of-work");
        assert_eq!(ev.key.as_deref(), Some("indexing"));
        assert_eq!(ev.unit, Some(3));
        assert_eq!(ev.depth, Some(2));
        assert_eq!(ev.reason.as_deref(), Some("unit-of-work"));
    }

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(EventKind::PermitUnmatched.as_label(), "permit_unmatched");
        assert_eq!(EventKind::PauseRequested.as_label(), "pause_requested");
    }
}
