//! Live clock on tokio time.

use crate::LinkContext;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Clock for the live server.
///
/// Reads `tokio::time::Instant`, so a runtime with paused time (tests)
/// moves it only through `sleep`.
#[derive(Debug, Clone, Copy)]
pub struct TokioContext {
    origin: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkContext for TokioContext {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
    
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
