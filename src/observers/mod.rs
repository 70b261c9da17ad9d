//! Observers for the coordination event stream.

mod log;
mod observer;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::events::Bus;

pub use log::LogWriter;
pub use observer::GateObserver;

/// Spawns a listener pumping bus events into `observer` until `token` is
/// cancelled.
///
/// Lagged receivers skip missed events with a warning; the coordinator
/// itself never depends on delivery.
pub fn attach(bus: &Bus, observer: Arc<dyn GateObserver>, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                recv = rx.recv() => match recv {
                    Ok(event) => observer.on_event(&event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "observer lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}
