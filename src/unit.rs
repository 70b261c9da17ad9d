//! # Execution-unit context.
//!
//! [`UnitContext`] identifies one logical caller of the gate and carries the
//! per-caller state the coordination protocol needs:
//!
//! - per-key **hold depth** for reentrant permits (plus the stored owned
//!   permit for the outermost hold);
//! - per-key **coordinator depth**, so a unit that is coordinating never
//!   parks as a waiter on the same key;
//! - **unit-of-work depth**, so a unit mid-transaction finishes its current
//!   step instead of honoring a pause;
//! - a [`CancellationToken`] modeling interruption of blocked waits, and an
//!   `interrupted` flag recording that a wait was abandoned.
//!
//! The context is an explicit value threaded through the call chain rather
//! than ambient thread-local state: clones share the same logical unit, so
//! work spawned onto another task stays reentrant and exempt by cloning the
//! context, and becomes an independent unit by creating a fresh one.
//!
//! ```text
//! Same logical unit (clone):            Independent unit (new):
//!   let child = unit.clone();             let other = UnitContext::new();
//!   nested acquire → depth + 1            nested acquire → real permit
//!   checkpoint under own pause → exempt   checkpoint under pause → parks
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Global counter for unit ids.
static UNIT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Outcome of releasing a hold on a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Outermost release; the real permit was returned to the semaphore.
    Released,
    /// Nested release; the unit still holds the key.
    StillHeld,
    /// No matching acquire. Defensive no-op.
    Unmatched,
}

/// One reentrant hold on a key: nesting depth plus the real permit, which is
/// present only on the entry that performed the outermost acquire.
struct Hold {
    depth: usize,
    permit: Option<OwnedSemaphorePermit>,
}

struct UnitInner {
    id: u64,
    holds: Mutex<HashMap<String, Hold>>,
    coordinating: Mutex<HashMap<String, usize>>,
    units_of_work: AtomicUsize,
    interrupted: AtomicBool,
    token: CancellationToken,
}

/// Identity and per-caller coordination state of one logical execution unit.
///
/// Cheap to clone; clones share the same unit. See the module docs for the
/// clone-vs-new distinction.
#[derive(Clone)]
pub struct UnitContext {
    inner: Arc<UnitInner>,
}

impl UnitContext {
    /// Creates a fresh execution unit with its own identity and state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(UnitInner {
                id: UNIT_SEQ.fetch_add(1, Ordering::Relaxed),
                holds: Mutex::new(HashMap::new()),
                coordinating: Mutex::new(HashMap::new()),
                units_of_work: AtomicUsize::new(0),
                interrupted: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Unique id of this unit (stable across clones).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Interrupts the unit: any blocked semaphore or barrier wait returns
    /// with [`GateError::Interrupted`](crate::GateError::Interrupted) and
    /// execution degrades to unprotected mode.
    pub fn interrupt(&self) {
        self.inner.token.cancel();
    }

    /// Whether [`UnitContext::interrupt`] has been called.
    pub fn is_interrupt_requested(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Completes when the unit is interrupted.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    /// Whether a blocked wait of this unit was actually abandoned.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_interrupted(&self) {
        self.inner.interrupted.store(true, Ordering::Relaxed);
    }

    /// Marks the start of a transactional span. While the returned guard is
    /// alive, the unit ignores pause requests at its checkpoints.
    pub fn begin_unit_of_work(&self) -> UnitOfWork {
        self.inner.units_of_work.fetch_add(1, Ordering::SeqCst);
        UnitOfWork {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of unit-of-work spans currently open on this unit.
    pub fn unit_of_work_depth(&self) -> usize {
        self.inner.units_of_work.load(Ordering::SeqCst)
    }

    /// Current hold depth for `key` (0 when not held).
    pub fn hold_depth(&self, key: &str) -> usize {
        let holds = self.inner.holds.lock().unwrap();
        holds.get(key).map(|h| h.depth).unwrap_or(0)
    }

    /// Current coordinator depth for `key` (0 when not coordinating).
    pub fn coordinator_depth(&self, key: &str) -> usize {
        let coordinating = self.inner.coordinating.lock().unwrap();
        coordinating.get(key).copied().unwrap_or(0)
    }

    /// Increments the hold depth if the unit already holds `key`.
    ///
    /// Returns `false` when the unit holds nothing, in which case the caller
    /// must win a real permit and hand it to [`UnitContext::adopt_permit`].
    pub(crate) fn try_reenter(&self, key: &str) -> bool {
        let mut holds = self.inner.holds.lock().unwrap();
        match holds.get_mut(key) {
            Some(h) if h.depth > 0 => {
                h.depth += 1;
                true
            }
            _ => false,
        }
    }

    /// Records a freshly acquired permit as the outermost hold on `key`.
    ///
    /// Two tasks sharing this unit can race past [`UnitContext::try_reenter`]
    /// and both win real permits; the loser's permit is dropped here and its
    /// acquire folded into the existing hold so acquire/release still
    /// balance.
    pub(crate) fn adopt_permit(&self, key: &str, permit: OwnedSemaphorePermit) {
        let mut holds = self.inner.holds.lock().unwrap();
        let hold = holds.entry(key.to_string()).or_insert(Hold {
            depth: 0,
            permit: None,
        });
        if hold.depth == 0 {
            hold.depth = 1;
            hold.permit = Some(permit);
        } else {
            hold.depth += 1;
            drop(permit);
        }
    }

    /// Decrements the hold depth for `key`, returning the real permit to the
    /// semaphore on the outermost release.
    pub(crate) fn release_hold(&self, key: &str) -> ReleaseOutcome {
        let mut holds = self.inner.holds.lock().unwrap();
        let Some(hold) = holds.get_mut(key) else {
            return ReleaseOutcome::Unmatched;
        };
        if hold.depth == 0 {
            return ReleaseOutcome::Unmatched;
        }
        hold.depth -= 1;
        if hold.depth == 0 {
            // Dropping the stored permit returns it to the semaphore.
            holds.remove(key);
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::StillHeld
        }
    }

    /// Enters a coordinator frame for `key`; the depth drops back when the
    /// returned guard does.
    pub(crate) fn enter_coordinator(&self, key: &str) -> CoordinatorEntry {
        let mut coordinating = self.inner.coordinating.lock().unwrap();
        *coordinating.entry(key.to_string()).or_insert(0) += 1;
        CoordinatorEntry {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
        }
    }
}

impl Default for UnitContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UnitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitContext")
            .field("id", &self.inner.id)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Guard for an open transactional span. See
/// [`UnitContext::begin_unit_of_work`].
pub struct UnitOfWork {
    inner: Arc<UnitInner>,
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.inner.units_of_work.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Guard for one coordinator frame of a unit on one key.
pub(crate) struct CoordinatorEntry {
    inner: Arc<UnitInner>,
    key: String,
}

impl Drop for CoordinatorEntry {
    fn drop(&mut self) {
        let mut coordinating = self.inner.coordinating.lock().unwrap();
        if let Some(depth) = coordinating.get_mut(&self.key) {
            *depth -= 1;
            if *depth == 0 {
                coordinating.remove(&self.key);
            }
        }
    }
}
