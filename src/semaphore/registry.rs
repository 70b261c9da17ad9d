//! # Per-key semaphore registry.
//!
//! [`SemaphoreRegistry`] resolves a key to its [`ReentrantSemaphore`],
//! creating it on first reference with an atomic insert-if-absent. Instances
//! live for the process lifetime and are never removed, so hold bookkeeping
//! can never dangle.
//!
//! Permit counts come from [`GateConfig::permits`]; a key that was never
//! declared falls back to [`GateConfig::default_permits`] with a warning and
//! a [`KeyMisconfigured`](crate::EventKind::KeyMisconfigured) event. The
//! well-known default key is expected to be undeclared and skips the
//! warning.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::config::GateConfig;
use crate::events::{Bus, EventKind, GateEvent};
use crate::gate::DEFAULT_KEY;
use crate::semaphore::ReentrantSemaphore;

/// Lazily-populated map of key → reentrant semaphore.
pub struct SemaphoreRegistry {
    config: GateConfig,
    semaphores: DashMap<String, Arc<ReentrantSemaphore>>,
    bus: Bus,
}

impl SemaphoreRegistry {
    /// Creates an empty registry backed by `config`.
    pub fn new(config: GateConfig, bus: Bus) -> Self {
        Self {
            config,
            semaphores: DashMap::new(),
            bus,
        }
    }

    /// Returns the semaphore for `key`, creating it on first reference.
    pub fn resolve(&self, key: &str) -> Arc<ReentrantSemaphore> {
        self.semaphores
            .entry(key.to_string())
            .or_insert_with(|| {
                let permits = match self.config.permits_for(key) {
                    Some(n) => n,
                    None => {
                        if key != DEFAULT_KEY {
                            warn!(
                                key,
                                default = self.config.default_permits,
                                "no permit count configured for key; using default"
                            );
                            self.bus.publish(
                                GateEvent::new(EventKind::KeyMisconfigured)
                                    .with_key(key)
                                    .with_depth(self.config.default_permits),
                            );
                        }
                        self.config.default_permits
                    }
                };
                Arc::new(ReentrantSemaphore::new(key, permits))
            })
            .clone()
    }

    /// Returns the semaphore for `key` only if it already exists.
    pub fn get(&self, key: &str) -> Option<Arc<ReentrantSemaphore>> {
        self.semaphores.get(key).map(|s| s.clone())
    }

    /// Keys that have been referenced so far.
    pub fn keys(&self) -> Vec<String> {
        self.semaphores.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(key: &str, permits: usize) -> SemaphoreRegistry {
        let mut cfg = GateConfig::default();
        cfg.permits.insert(key.to_string(), permits);
        cfg.default_permits = 7;
        SemaphoreRegistry::new(cfg, Bus::new(8))
    }

    #[test]
    fn test_declared_key_uses_configured_permits() {
        let registry = registry_with("indexing", 5);
        let sem = registry.resolve("indexing");
        assert_eq!(sem.permits(), 5);
    }

    #[test]
    fn test_undeclared_key_falls_back_to_default() {
        let registry = registry_with("indexing", 5);
        let mut rx = registry.bus.subscribe();

        let sem = registry.resolve("reports");
        assert_eq!(sem.permits(), 7);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::KeyMisconfigured);
        assert_eq!(ev.key.as_deref(), Some("reports"));
    }

    #[test]
    fn test_default_key_fallback_is_silent() {
        let registry = registry_with("indexing", 5);
        let mut rx = registry.bus.subscribe();

        let sem = registry.resolve(DEFAULT_KEY);
        assert_eq!(sem.permits(), 7);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_resolve_returns_same_instance() {
        let registry = registry_with("indexing", 5);
        let first = registry.resolve("indexing");
        let second = registry.resolve("indexing");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.keys(), vec!["indexing".to_string()]);
    }
}
