//! # Integration seams: unit-of-work probe and ambient key resolution.
//!
//! These traits are the gate's only view of the surrounding application:
//!
//! - [`UnitOfWorkProbe`] answers whether a unit is mid-transaction and must
//!   therefore not honor a pause request at its current checkpoint.
//! - [`KeyResolver`] supplies the resource key when a caller declares
//!   [`Key::Ambient`](crate::Key::Ambient) instead of naming one — for
//!   example "the data source this task is currently routed to".
//!
//! Both are synchronous: they are consulted on hot paths and must not block.

use crate::unit::UnitContext;

/// Tells the barrier whether the calling unit is inside an atomic span that
/// must finish before the unit may yield to a coordinator.
pub trait UnitOfWorkProbe: Send + Sync {
    /// Whether `unit` currently has an active unit-of-work.
    fn is_unit_of_work_active(&self, unit: &UnitContext) -> bool;
}

/// Default probe: a unit is mid-transaction while it holds at least one
/// [`begin_unit_of_work`](UnitContext::begin_unit_of_work) guard.
///
/// Applications with their own transaction tracking implement
/// [`UnitOfWorkProbe`] instead and install it via
/// [`Gate::builder`](crate::Gate::builder).
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkDepthProbe;

impl UnitOfWorkProbe for WorkDepthProbe {
    fn is_unit_of_work_active(&self, unit: &UnitContext) -> bool {
        unit.unit_of_work_depth() > 0
    }
}

/// Supplies the ambient resource key for
/// [`Key::Ambient`](crate::Key::Ambient) accesses.
pub trait KeyResolver: Send + Sync {
    /// The key currently in effect, or `None` to fall back to the
    /// [`DEFAULT_KEY`](crate::DEFAULT_KEY).
    fn current_key(&self) -> Option<String>;
}
