//! Error types used by the gate and its coordination primitives.
//!
//! The coordinator is deliberately hard to fail: interruption of a blocked
//! wait degrades to unprotected execution, misconfigured keys fall back to
//! the default permit count, and unmatched releases are logged no-ops.
//! [`GateError`] therefore only carries the conditions a caller may want to
//! observe, and provides `as_label`/`as_message` helpers for logs/metrics.

use thiserror::Error;

/// # Errors produced by blocking coordination waits.
///
/// Every variant is recoverable: the facade reacts by running the protected
/// operation in degraded, unprotected mode instead of blocking forever.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GateError {
    /// A blocked semaphore or barrier wait was interrupted through the
    /// unit's cancellation token.
    #[error("interrupted while waiting on key {key:?}; proceeding unprotected")]
    Interrupted {
        /// Key the unit was waiting on.
        key: String,
    },

    /// The underlying semaphore was closed. Gate-managed semaphores live for
    /// the process lifetime and are never closed; this exists so the close
    /// path is still a signaled failure rather than a panic.
    #[error("semaphore for key {key:?} is closed")]
    Closed {
        /// Key whose semaphore was closed.
        key: String,
    },
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gatevisor::GateError;
    ///
    /// let err = GateError::Interrupted { key: "indexing".into() };
    /// assert_eq!(err.as_label(), "wait_interrupted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::Interrupted { .. } => "wait_interrupted",
            GateError::Closed { .. } => "semaphore_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            GateError::Interrupted { key } => format!("interrupted: key={key}"),
            GateError::Closed { key } => format!("closed: key={key}"),
        }
    }

    /// Key this error refers to.
    pub fn key(&self) -> &str {
        match self {
            GateError::Interrupted { key } => key,
            GateError::Closed { key } => key,
        }
    }
}
