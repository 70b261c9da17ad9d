//! # Built-in observer that renders events through `tracing`.
//!
//! [`LogWriter`] is a reference [`GateObserver`] useful for debugging and
//! tests: anomalies (interrupted waits, unmatched releases, misconfigured
//! keys) log at `warn`, routine transitions at `debug`.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::events::{EventKind, GateEvent};
use crate::observers::observer::GateObserver;

/// Renders every coordination event as a `tracing` log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl GateObserver for LogWriter {
    async fn on_event(&self, event: &GateEvent) {
        let label = event.kind.as_label();
        let key = event.key.as_deref().unwrap_or("-");
        match event.kind {
            EventKind::AcquireInterrupted
            | EventKind::WaiterInterrupted
            | EventKind::PermitUnmatched
            | EventKind::KeyMisconfigured => {
                warn!(
                    seq = event.seq,
                    key,
                    unit = event.unit,
                    depth = event.depth,
                    reason = event.reason.as_deref(),
                    "{label}"
                );
            }
            _ => {
                debug!(
                    seq = event.seq,
                    key,
                    unit = event.unit,
                    depth = event.depth,
                    reason = event.reason.as_deref(),
                    "{label}"
                );
            }
        }
    }
}
