//! Broadcast transport abstraction for the commlink emitter.

use crate::error::EnvError;

/// Fan-out of binary frames to every subscribed listener.
///
/// # Implementations
///
/// - **Live**: `TcpBroadcaster`, one TCP stream per listener
/// - **Simulation**: `SimTransport`, records every frame in memory
///
/// # Delivery
///
/// ```text
/// Emitter                 Transport                 Listeners
///   |                        |                          |
///   |-- broadcast(frame) --->|-- copy per listener ---->| (slow ones drop frames)
///   |<-- Ok(n) --------------|                          |
/// ```
///
/// Calls are fire-and-forget and must return without waiting on any
/// listener: the emitter calls this from inside its tick.
pub trait BroadcastTransport: Send + Sync + 'static {
    /// Hands a frame to every connected listener.
    ///
    /// # Returns
    /// * `Ok(n)` - Number of listeners the frame was queued for (may be 0)
    /// * `Err(EnvError::NetworkError)` - The transport is shut down
    fn broadcast(&self, frame: &[u8]) -> Result<usize, EnvError>;
    
    /// Number of listeners currently subscribed.
    fn listener_count(&self) -> usize;
}

impl<T: BroadcastTransport> BroadcastTransport for std::sync::Arc<T> {
    fn broadcast(&self, frame: &[u8]) -> Result<usize, EnvError> {
        (**self).broadcast(frame)
    }
    
    fn listener_count(&self) -> usize {
        (**self).listener_count()
    }
}
