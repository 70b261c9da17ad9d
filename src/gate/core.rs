//! # The gate: single entry point for protected operations.
//!
//! [`Gate::protect`] wraps one unit of work with admission control and, for
//! waiters and coordinators, pause-barrier participation:
//!
//! ```text
//! protect(unit, access, op)
//!   ├─► resolve key (named, or ambient via KeyResolver)
//!   ├─► acquire reentrant permit (FIFO, interruptible)
//!   │      └─ interrupted? log, mark unit, continue unprotected
//!   ├─► Intent::Default      → run op
//!   ├─► Intent::Waiter       → barrier.checkpoint(), then run op
//!   ├─► Intent::Coordinator  → barrier.run_exclusive(op)
//!   └─► release permit (RAII guard, every exit path)
//! ```
//!
//! ## Rules
//! - The operation always runs, exactly once: coordination failures degrade
//!   protection, they never fail or repeat the operation.
//! - Semaphores and barriers share one key namespace; instances are created
//!   lazily on first reference and live for the process lifetime.
//! - The permit-release guard runs on success, error output, panic, and
//!   dropped futures alike; an unmatched release in that path is a logged
//!   no-op.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::barrier::{PauseBarrier, PauseState};
use crate::config::GateConfig;
use crate::events::{Bus, EventKind, GateEvent};
use crate::gate::access::{Access, Intent, Key};
use crate::probe::{KeyResolver, UnitOfWorkProbe, WorkDepthProbe};
use crate::semaphore::{ReentrantSemaphore, SemaphoreRegistry};
use crate::unit::{ReleaseOutcome, UnitContext};

/// Key used when an ambient access has no resolver to consult.
pub const DEFAULT_KEY: &str = "default";

/// Priority-aware, reentrant coordination facade.
///
/// One `Gate` owns the per-key semaphore and barrier registries, the
/// unit-of-work probe, the optional ambient key resolver, and the
/// diagnostics event bus. Construct with [`Gate::new`] for defaults or
/// [`Gate::builder`] to install collaborators.
pub struct Gate {
    semaphores: SemaphoreRegistry,
    barriers: DashMap<String, Arc<PauseBarrier>>,
    probe: Arc<dyn UnitOfWorkProbe>,
    resolver: Option<Arc<dyn KeyResolver>>,
    bus: Bus,
}

impl Gate {
    /// Creates a gate with the default probe and no ambient resolver.
    pub fn new(config: GateConfig) -> Self {
        Self::builder(config).build()
    }

    /// Starts building a gate over `config`.
    pub fn builder(config: GateConfig) -> GateBuilder {
        GateBuilder {
            config,
            probe: Arc::new(WorkDepthProbe),
            resolver: None,
        }
    }

    /// The diagnostics event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs `op` under the protection declared by `access`.
    ///
    /// Returns `op`'s own output: a failing operation reports through its
    /// output type (e.g. `Result`), and coordination never injects errors
    /// of its own. Interruption of a blocked wait is recovered by running
    /// `op` unprotected — the availability-over-throttling tradeoff the
    /// whole coordinator is built around.
    pub async fn protect<T>(
        &self,
        unit: &UnitContext,
        access: &Access,
        op: impl Future<Output = T>,
    ) -> T {
        let key = self.resolve_key(access);
        let semaphore = self.semaphores.resolve(&key);
        let barrier = self.barrier(&key);

        let held = match semaphore.acquire(unit).await {
            Ok(()) => {
                self.bus.publish(
                    GateEvent::new(EventKind::PermitAcquired)
                        .with_key(key.as_str())
                        .with_unit(unit.id())
                        .with_depth(unit.hold_depth(&key)),
                );
                true
            }
            Err(err) => {
                warn!(
                    key = key.as_str(),
                    unit = unit.id(),
                    error = %err,
                    "could not acquire permit; proceeding unprotected"
                );
                unit.mark_interrupted();
                self.bus.publish(
                    GateEvent::new(EventKind::AcquireInterrupted)
                        .with_key(key.as_str())
                        .with_unit(unit.id()),
                );
                false
            }
        };
        let _release = HeldPermit {
            semaphore: &semaphore,
            unit,
            bus: &self.bus,
            held,
        };

        match access.intent {
            Intent::Default => op.await,
            Intent::Waiter => {
                if let Err(err) = barrier.checkpoint(unit, self.probe.as_ref()).await {
                    warn!(
                        key = key.as_str(),
                        unit = unit.id(),
                        error = %err,
                        "checkpoint interrupted; proceeding unprotected"
                    );
                    unit.mark_interrupted();
                }
                op.await
            }
            Intent::Coordinator => barrier.run_exclusive(unit, op).await,
        }
    }

    /// Keys referenced so far (for diagnostics).
    pub fn active_keys(&self) -> Vec<String> {
        self.semaphores.keys()
    }

    /// Pause state of `key`'s barrier, if that key has been referenced.
    pub fn pause_snapshot(&self, key: &str) -> Option<PauseState> {
        self.barriers.get(key).map(|b| b.snapshot())
    }

    /// Available permits on `key`'s semaphore, if that key has been
    /// referenced.
    pub fn available_permits(&self, key: &str) -> Option<usize> {
        self.semaphores.get(key).map(|s| s.available())
    }

    fn resolve_key(&self, access: &Access) -> String {
        match &access.key {
            Key::Named(name) => name.clone(),
            Key::Ambient => self
                .resolver
                .as_ref()
                .and_then(|r| r.current_key())
                .unwrap_or_else(|| DEFAULT_KEY.to_string()),
        }
    }

    fn barrier(&self, key: &str) -> Arc<PauseBarrier> {
        self.barriers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(PauseBarrier::new(key, self.bus.clone())))
            .clone()
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("active_keys", &self.active_keys())
            .finish()
    }
}

/// Builder installing the gate's collaborators.
pub struct GateBuilder {
    config: GateConfig,
    probe: Arc<dyn UnitOfWorkProbe>,
    resolver: Option<Arc<dyn KeyResolver>>,
}

impl GateBuilder {
    /// Installs a custom unit-of-work probe.
    pub fn with_probe(mut self, probe: Arc<dyn UnitOfWorkProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Installs an ambient key resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn KeyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Builds the gate.
    pub fn build(self) -> Gate {
        let bus = Bus::new(self.config.bus_capacity);
        Gate {
            semaphores: SemaphoreRegistry::new(self.config, bus.clone()),
            barriers: DashMap::new(),
            probe: self.probe,
            resolver: self.resolver,
            bus,
        }
    }
}

/// Releases the unit's hold when the protected call exits, however it
/// exits. Skipped when the acquire itself was interrupted.
struct HeldPermit<'a> {
    semaphore: &'a ReentrantSemaphore,
    unit: &'a UnitContext,
    bus: &'a Bus,
    held: bool,
}

impl Drop for HeldPermit<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let kind = match self.semaphore.release(self.unit) {
            ReleaseOutcome::Released | ReleaseOutcome::StillHeld => EventKind::PermitReleased,
            ReleaseOutcome::Unmatched => EventKind::PermitUnmatched,
        };
        self.bus.publish(
            GateEvent::new(kind)
                .with_key(self.semaphore.key())
                .with_unit(self.unit.id())
                .with_depth(self.unit.hold_depth(self.semaphore.key())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn gate_with(key: &str, permits: usize) -> Arc<Gate> {
        let mut cfg = GateConfig::default();
        cfg.permits.insert(key.to_string(), permits);
        Arc::new(Gate::new(cfg))
    }

    #[tokio::test]
    async fn test_nested_protect_same_unit_does_not_block() {
        let gate = gate_with("k", 1);
        let unit = UnitContext::new();
        let access = Access::named("k");

        let out = timeout(
            Duration::from_secs(1),
            gate.protect(&unit, &access, async {
                gate.protect(&unit, &access, async { 1 }).await + 1
            }),
        )
        .await
        .expect("nested protect deadlocked");
        assert_eq!(out, 2);
        assert_eq!(unit.hold_depth("k"), 0);
        assert_eq!(gate.available_permits("k"), Some(1));
    }

    #[tokio::test]
    async fn test_interrupted_unit_runs_unprotected() {
        let gate = gate_with("k", 1);
        let mut events = gate.bus().subscribe();

        let holder = UnitContext::new();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let g = gate.clone();
        let h = holder.clone();
        let occupier = tokio::spawn(async move {
            g.protect(&h, &Access::named("k"), async move {
                started_tx.send(()).ok();
                release_rx.await.ok();
            })
            .await;
        });
        started_rx.await.unwrap();

        // No permit available and the unit is interrupted: op still runs.
        let interrupted = UnitContext::new();
        interrupted.interrupt();
        let out = timeout(
            Duration::from_secs(1),
            gate.protect(&interrupted, &Access::named("k"), async { 41 + 1 }),
        )
        .await
        .expect("degraded protect blocked");
        assert_eq!(out, 42);
        assert!(interrupted.is_interrupted());

        let mut saw_interrupt = false;
        while let Ok(ev) = events.try_recv() {
            saw_interrupt |= ev.kind == EventKind::AcquireInterrupted;
        }
        assert!(saw_interrupt);

        release_tx.send(()).unwrap();
        occupier.await.unwrap();
        assert_eq!(gate.available_permits("k"), Some(1));
    }

    #[tokio::test]
    async fn test_coordinator_intent_opens_and_closes_window() {
        let gate = gate_with("k", 4);
        let mut events = gate.bus().subscribe();
        let unit = UnitContext::new();

        let out: Result<u32, &str> = gate
            .protect(&unit, &Access::named("k").coordinator(), async { Ok(9) })
            .await;
        assert_eq!(out.unwrap(), 9);

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::PauseRequested));
        assert!(kinds.contains(&EventKind::PauseResumed));

        let s = gate.pause_snapshot("k").unwrap();
        assert!(!s.pause_requested);
        assert_eq!(s.coordinators, 0);
    }

    #[tokio::test]
    async fn test_error_output_passes_through() {
        let gate = gate_with("k", 4);
        let unit = UnitContext::new();
        let out: Result<(), String> = gate
            .protect(&unit, &Access::named("k").coordinator(), async {
                Err("downstream unavailable".to_string())
            })
            .await;
        assert!(out.is_err());
        // Cleanup ran despite the error output.
        assert_eq!(unit.hold_depth("k"), 0);
        assert_eq!(gate.pause_snapshot("k").unwrap().coordinators, 0);
    }

    struct FixedResolver(&'static str);

    impl KeyResolver for FixedResolver {
        fn current_key(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_ambient_key_uses_resolver_and_named_key_wins() {
        let gate = Gate::builder(GateConfig::default())
            .with_resolver(Arc::new(FixedResolver("tenant-a")))
            .build();
        let unit = UnitContext::new();

        gate.protect(&unit, &Access::ambient(), async {}).await;
        gate.protect(&unit, &Access::named("reports"), async {})
            .await;

        let keys = gate.active_keys();
        assert!(keys.contains(&"tenant-a".to_string()));
        assert!(keys.contains(&"reports".to_string()));
    }

    #[tokio::test]
    async fn test_ambient_without_resolver_uses_default_key() {
        let gate = Gate::new(GateConfig::default());
        let unit = UnitContext::new();
        gate.protect(&unit, &Access::ambient(), async {}).await;
        assert!(gate.active_keys().contains(&DEFAULT_KEY.to_string()));
    }
}
