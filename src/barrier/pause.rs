//! # Two-phase pause/resume rendezvous for one key.
//!
//! A [`PauseBarrier`] lets short-lived, high-priority coordinators suspend
//! long-running cooperative waiters for the duration of a critical section:
//!
//! ```text
//!  Idle ──► Pausing ──────► Paused ─────► Resuming ──► Idle
//!        coordinator      waiters at    last coordinator
//!        sets the flag    the gate,     exits: window
//!        and waits for    critical      advances, parked
//!        checkpointing    section(s)    waiters released
//!        waiters (A)      run           (B)
//! ```
//!
//! All shared state lives in a single [`watch`] channel holding
//! [`PauseState`]. Transitions go through `send_modify` (atomic update plus
//! wakeup) and waits through `Receiver::wait_for`, which re-checks the
//! current value on subscription — there is no window for a lost wakeup.
//!
//! ## Rules
//! - `pause_requested` is true exactly while ≥ 1 coordinator critical
//!   section is in progress.
//! - Only the outermost of concurrent coordinators performs the phase-A
//!   handshake; later arrivals reuse the paused state. Parked waiters are
//!   released only when the **last** coordinator exits.
//! - Phase A waits only for waiters *currently inside a checkpoint call*;
//!   waiters between checkpoints are not chased.
//! - Exit bookkeeping (coordinator windows, waiter registrations) is done
//!   by Drop guards: failures, panics, and dropped futures all resume the
//!   barrier. A critical-section error travels through the section's own
//!   output and surfaces only after phase B has run.
//! - A unit coordinating on this key never parks at its own gate, and a
//!   unit with an active unit-of-work finishes its step before yielding.
//!
//! There is no built-in timeout on the handshake: a stalled critical
//! section parks waiters until it completes or its future is dropped.
//! Callers needing bounded latency wrap the coordinator call in
//! [`tokio::time::timeout`]; the Drop guards make that safe.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::GateError;
use crate::events::{Bus, EventKind, GateEvent};
use crate::probe::UnitOfWorkProbe;
use crate::unit::UnitContext;

/// Snapshot of a barrier's pause state.
///
/// Quiescence after any operation sequence means: `pause_requested` false,
/// `coordinators`, `checkpointing` and `parked` all zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PauseState {
    /// True while at least one coordinator critical section is in progress.
    pub pause_requested: bool,
    /// Number of coordinator critical sections currently in progress.
    pub coordinators: usize,
    /// Waiters currently inside a checkpoint call.
    pub checkpointing: usize,
    /// Waiters parked at the gate.
    pub parked: usize,
    /// Pause-window generation; advances when the last coordinator exits.
    pub window: u64,
}

/// What a checkpoint call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// No pause requested; the waiter continued immediately.
    Clear,
    /// The unit is coordinating on this key and skipped its own gate.
    ExemptCoordinator,
    /// The unit has an active unit-of-work and finishes it first.
    ExemptUnitOfWork,
    /// The waiter parked and was released after the critical sections
    /// finished.
    Resumed,
}

/// Two-phase pause/resume rendezvous for one key. Created lazily by the
/// gate, lives for the process lifetime.
pub struct PauseBarrier {
    key: Arc<str>,
    state: watch::Sender<PauseState>,
    bus: Bus,
}

impl PauseBarrier {
    /// Creates an idle barrier for `key`.
    pub fn new(key: impl Into<Arc<str>>, bus: Bus) -> Self {
        let (state, _) = watch::channel(PauseState::default());
        Self {
            key: key.into(),
            state,
            bus,
        }
    }

    /// Key this barrier coordinates.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current pause state (for diagnostics and test assertions).
    pub fn snapshot(&self) -> PauseState {
        self.state.borrow().clone()
    }

    /// Waiter side: consult the pause state, possibly parking.
    ///
    /// Returns immediately when no pause is requested, when the unit is
    /// itself coordinating on this key, or when `probe` reports an active
    /// unit-of-work. Otherwise the waiter registers, arrives at the gate
    /// (the phase-A acknowledgement) and parks until the window it joined
    /// is closed by the last coordinator.
    ///
    /// Interruption while parked fails with [`GateError::Interrupted`]; the
    /// waiter then proceeds unprotected.
    pub async fn checkpoint(
        &self,
        unit: &UnitContext,
        probe: &dyn UnitOfWorkProbe,
    ) -> Result<CheckpointOutcome, GateError> {
        if !self.state.borrow().pause_requested {
            return Ok(CheckpointOutcome::Clear);
        }
        if unit.coordinator_depth(&self.key) > 0 {
            self.publish_waiter(EventKind::WaiterExempt, unit, Some("coordinating"));
            return Ok(CheckpointOutcome::ExemptCoordinator);
        }
        if probe.is_unit_of_work_active(unit) {
            self.publish_waiter(EventKind::WaiterExempt, unit, Some("unit-of-work"));
            return Ok(CheckpointOutcome::ExemptUnitOfWork);
        }

        // Register. The pause may have ended between the flag check above
        // and here, so the flag is re-checked under the same atomic update.
        let mut joined = None;
        self.state.send_modify(|s| {
            if s.pause_requested {
                s.checkpointing += 1;
                joined = Some(s.window);
            }
        });
        let Some(window) = joined else {
            return Ok(CheckpointOutcome::Clear);
        };
        let _registration = Registration { state: &self.state };

        // Arrive at the gate: once every registered waiter has parked, the
        // outermost coordinator's phase-A wait completes.
        self.state.send_modify(|s| s.parked += 1);
        self.publish_waiter(EventKind::WaiterParked, unit, None);
        debug!(key = %self.key, unit = unit.id(), window, "waiter parked");

        let mut rx = self.state.subscribe();
        let released = tokio::select! {
            res = rx.wait_for(|s| s.window > window) => res.is_ok(),
            _ = unit.cancelled() => false,
        };

        if released {
            self.publish_waiter(EventKind::WaiterResumed, unit, None);
            Ok(CheckpointOutcome::Resumed)
        } else {
            warn!(
                key = %self.key,
                unit = unit.id(),
                "waiter interrupted while parked; resuming unprotected"
            );
            self.publish_waiter(EventKind::WaiterInterrupted, unit, None);
            Err(GateError::Interrupted {
                key: self.key.to_string(),
            })
        }
    }

    /// Coordinator side: run `critical` while all cooperating waiters are
    /// held at their checkpoints.
    ///
    /// The unit's coordinator depth is raised for the duration, so nested
    /// waiter calls by the same unit skip their own gate. The outermost of
    /// concurrent coordinators sets the pause flag and performs phase A
    /// (waiting for the waiters currently inside a checkpoint to park);
    /// later concurrent coordinators skip the handshake and reuse the
    /// paused state.
    ///
    /// Resume (phase B) runs on every exit path — success, error output,
    /// panic, or a dropped future — and only after `critical` has finished,
    /// so no waiter ever observes release before the critical section
    /// completes. If the phase-A wait is interrupted the critical section
    /// still runs, without the guarantee that every waiter is parked.
    pub async fn run_exclusive<O>(
        &self,
        unit: &UnitContext,
        critical: impl Future<Output = O>,
    ) -> O {
        let _coordinating = unit.enter_coordinator(&self.key);
        let window = Window::open(self);

        if window.outermost {
            let mut rx = self.state.subscribe();
            let arrived = tokio::select! {
                res = rx.wait_for(|s| s.parked == s.checkpointing) => res.is_ok(),
                _ = unit.cancelled() => false,
            };
            if !arrived {
                unit.mark_interrupted();
                warn!(
                    key = %self.key,
                    unit = unit.id(),
                    "pause handshake interrupted; running critical section without full pause"
                );
            }
        }

        let out = critical.await;
        // Phase B happens in the window guard's Drop, strictly after the
        // critical section finished.
        drop(window);
        out
    }

    fn publish_waiter(&self, kind: EventKind, unit: &UnitContext, reason: Option<&'static str>) {
        let mut ev = GateEvent::new(kind)
            .with_key(Arc::clone(&self.key))
            .with_unit(unit.id());
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);
    }
}

impl std::fmt::Debug for PauseBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseBarrier")
            .field("key", &self.key)
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Registration of one waiter at the gate; deregisters on drop so a dropped
/// checkpoint future cannot strand the handshake.
struct Registration<'a> {
    state: &'a watch::Sender<PauseState>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.checkpointing = s.checkpointing.saturating_sub(1);
            s.parked = s.parked.saturating_sub(1);
        });
    }
}

/// One coordinator's participation in the pause window. Opening raises the
/// global coordinator count (the 0→1 transition requests the pause);
/// dropping lowers it, and the 1→0 transition clears the flag and advances
/// the window, releasing every parked waiter exactly once.
struct Window<'a> {
    barrier: &'a PauseBarrier,
    outermost: bool,
}

impl<'a> Window<'a> {
    fn open(barrier: &'a PauseBarrier) -> Self {
        let mut outermost = false;
        barrier.state.send_modify(|s| {
            s.coordinators += 1;
            if s.coordinators == 1 {
                s.pause_requested = true;
                outermost = true;
            }
        });
        if outermost {
            barrier.bus.publish(
                GateEvent::new(EventKind::PauseRequested).with_key(Arc::clone(&barrier.key)),
            );
        }
        Self { barrier, outermost }
    }
}

impl Drop for Window<'_> {
    fn drop(&mut self) {
        let mut resumed = false;
        self.barrier.state.send_modify(|s| {
            s.coordinators = s.coordinators.saturating_sub(1);
            if s.coordinators == 0 {
                s.pause_requested = false;
                s.window += 1;
                resumed = true;
            }
        });
        if resumed {
            self.barrier.bus.publish(
                GateEvent::new(EventKind::PauseResumed).with_key(Arc::clone(&self.barrier.key)),
            );
        }
    }
}
