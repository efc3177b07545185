//! Error types for the commlink environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Frame could not be handed to the listeners
    #[error("Network error: {0}")]
    NetworkError(String),
    
    /// Listening socket could not be opened
    #[error("Bind error on {addr}: {reason}")]
    BindError { addr: String, reason: String },
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
    
    /// Creates a bind error for the given address.
    pub fn bind(addr: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::BindError {
            addr: addr.to_string(),
            reason: reason.to_string(),
        }
    }
}
