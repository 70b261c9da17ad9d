//! Reentrant admission control: per-key fair semaphores with per-unit hold
//! counting.

mod reentrant;
mod registry;

pub use reentrant::ReentrantSemaphore;
pub use registry::SemaphoreRegistry;
