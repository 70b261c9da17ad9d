//! # Declared access: which key, and in which role.
//!
//! An [`Access`] describes how one protected operation participates in
//! coordination. It replaces annotation-style interception with an explicit
//! value built at the call site:
//!
//! ```
//! use gatevisor::{Access, Intent, Key};
//!
//! // Background indexing step: throttled, yields to coordinators.
//! let indexing = Access::named("indexing").waiter();
//! assert_eq!(indexing.intent, Intent::Waiter);
//!
//! // User-facing request on the ambient key: pauses waiters while it runs.
//! let request = Access::ambient().coordinator();
//! assert_eq!(request.key, Key::Ambient);
//! ```

/// How the key for an access is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    /// A statically declared key. Always wins; no resolver is consulted.
    Named(String),
    /// The key is taken from the installed
    /// [`KeyResolver`](crate::KeyResolver) at call time, falling back to
    /// [`DEFAULT_KEY`](crate::DEFAULT_KEY) when none is installed.
    Ambient,
}

/// Role of a protected operation on its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Admission control only.
    Default,
    /// Long-running cooperative operation: checkpoints against the pause
    /// barrier before proceeding.
    Waiter,
    /// Short-lived priority operation: pauses all waiters for the duration
    /// of its critical section.
    Coordinator,
}

/// A declared protection request: key spec plus intent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Access {
    /// Key specification for this access.
    pub key: Key,
    /// Declared role.
    pub intent: Intent,
}

impl Access {
    /// Access on a statically named key, with [`Intent::Default`].
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            key: Key::Named(name.into()),
            intent: Intent::Default,
        }
    }

    /// Access on the ambient key, with [`Intent::Default`].
    pub fn ambient() -> Self {
        Self {
            key: Key::Ambient,
            intent: Intent::Default,
        }
    }

    /// Marks this access as a waiter.
    pub fn waiter(mut self) -> Self {
        self.intent = Intent::Waiter;
        self
    }

    /// Marks this access as a coordinator.
    pub fn coordinator(mut self) -> Self {
        self.intent = Intent::Coordinator;
        self
    }
}
