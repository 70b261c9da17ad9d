//! # Reentrant counting semaphore for one key.
//!
//! [`ReentrantSemaphore`] pairs a fair [`tokio::sync::Semaphore`] with the
//! per-unit hold counting carried by [`UnitContext`]:
//!
//! - repeated acquire by the same unit increments its hold depth without
//!   touching the real semaphore; only the 0→1 transition blocks;
//! - release decrements the depth; only the 1→0 transition returns the real
//!   permit;
//! - admission is FIFO (tokio's semaphore queues waiters fairly);
//! - a blocked acquire is interruptible through the unit's cancellation
//!   token and fails with [`GateError::Interrupted`] instead of hanging;
//! - a release with no matching acquire is a logged no-op.
//!
//! ## Rules
//! - Acquire/release must balance per unit; the guard logic in
//!   [`Gate::protect`](crate::Gate::protect) guarantees this on every exit
//!   path.
//! - Different keys are fully independent; each key has its own instance.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::GateError;
use crate::unit::{ReleaseOutcome, UnitContext};

/// Fair counting semaphore with per-unit reentrancy.
pub struct ReentrantSemaphore {
    key: Arc<str>,
    permits: usize,
    sem: Arc<Semaphore>,
}

impl ReentrantSemaphore {
    /// Creates a semaphore for `key` with the given permit count.
    pub fn new(key: impl Into<Arc<str>>, permits: usize) -> Self {
        Self {
            key: key.into(),
            permits,
            sem: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Key this semaphore guards.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Configured permit count.
    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits currently available (for diagnostics; racy by nature).
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Acquires one hold for `unit`.
    ///
    /// Re-entering a held key never blocks. The outermost acquire waits on
    /// the real semaphore in FIFO order, racing the unit's cancellation
    /// token: interruption yields [`GateError::Interrupted`] and the caller
    /// is expected to proceed unprotected rather than block forever.
    pub async fn acquire(&self, unit: &UnitContext) -> Result<(), GateError> {
        if unit.try_reenter(&self.key) {
            return Ok(());
        }
        // Matches the reentrant fast path above: an already-interrupted unit
        // fails the outermost acquire immediately, but nested re-entry on a
        // key it still holds stays allowed.
        if unit.is_interrupt_requested() {
            return Err(GateError::Interrupted {
                key: self.key.to_string(),
            });
        }
        let permit = tokio::select! {
            res = self.sem.clone().acquire_owned() => res.map_err(|_| GateError::Closed {
                key: self.key.to_string(),
            })?,
            _ = unit.cancelled() => {
                return Err(GateError::Interrupted {
                    key: self.key.to_string(),
                });
            }
        };
        unit.adopt_permit(&self.key, permit);
        Ok(())
    }

    /// Releases one hold for `unit`.
    ///
    /// The real permit is returned only when the unit's hold depth reaches
    /// zero. An unmatched release is a logged no-op, never a fault — the
    /// symmetric cleanup paths in the facade must not produce secondary
    /// failures.
    pub fn release(&self, unit: &UnitContext) -> ReleaseOutcome {
        let outcome = unit.release_hold(&self.key);
        if outcome == ReleaseOutcome::Unmatched {
            warn!(
                key = %self.key,
                unit = unit.id(),
                "release without matching acquire; ignoring"
            );
        }
        outcome
    }
}

impl std::fmt::Debug for ReentrantSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReentrantSemaphore")
            .field("key", &self.key)
            .field("permits", &self.permits)
            .field("available", &self.available())
            .finish()
    }
}
