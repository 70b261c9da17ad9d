//! # Gate configuration.
//!
//! [`GateConfig`] maps keys to permit counts and supplies the fallback used
//! for keys that were never declared. Keys are created lazily on first
//! reference, so an unconfigured key is not an error: it gets
//! [`GateConfig::default_permits`] and a warning is logged.
//!
//! # Example
//! ```
//! use gatevisor::GateConfig;
//!
//! let mut cfg = GateConfig::default();
//! cfg.permits.insert("indexing".into(), 5);
//! cfg.default_permits = 32;
//!
//! assert_eq!(cfg.permits_for("indexing"), Some(5));
//! assert_eq!(cfg.permits_for("reports"), None);
//! ```

use std::collections::HashMap;

/// Static configuration for a [`Gate`](crate::Gate).
///
/// Controls per-key admission limits, the fallback limit, and the capacity
/// of the diagnostics event bus.
#[derive(Clone, Debug)]
pub struct GateConfig {
    /// Declared permit counts per key.
    pub permits: HashMap<String, usize>,
    /// Permit count for keys absent from [`GateConfig::permits`].
    pub default_permits: usize,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for GateConfig {
    /// Provides a default configuration:
    /// - `permits = {}` (everything falls back to the default)
    /// - `default_permits = 170` (generous, sized for pooled downstream connections)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            permits: HashMap::new(),
            default_permits: 170,
            bus_capacity: 1024,
        }
    }
}

impl GateConfig {
    /// Declared permit count for `key`, if any.
    pub fn permits_for(&self, key: &str) -> Option<usize> {
        self.permits.get(key).copied()
    }
}
