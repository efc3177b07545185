//! Clock seam between the scheduler and its host.

use async_trait::async_trait;
use std::time::Duration;

/// Monotonic clock the emitter's timers run on.
///
/// The live server paces itself on tokio time; the simulation harness
/// advances a virtual clock by hand, so a 20 s scenario runs instantly
/// and always sees the same timestamps.
#[async_trait]
pub trait LinkContext: Send + Sync + 'static {
    /// Time elapsed since the context was created.
    fn now(&self) -> Duration;
    
    /// Waits until `now()` has moved on by `duration`.
    async fn sleep(&self, duration: Duration);
}
