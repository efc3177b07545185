//! commlink Environment Abstraction Layer
//!
//! This crate provides the seams that let the commlink engine run both
//! against a **live** host (tokio clock, TCP listeners) and inside the
//! **simulation** harness (virtual clock, capturing transport).
//!
//! # Core Concept
//!
//! The engine never touches a socket or a wall clock directly:
//! - Time (`now()`, `sleep()`) comes from a [`LinkContext`]
//! - Outbound frames go through a [`BroadcastTransport`]
//!
//! # Example
//!
//! ```ignore
//! use commlink_env::{LinkContext, BroadcastTransport};
//!
//! async fn host_loop<Ctx: LinkContext, Net: BroadcastTransport>(ctx: &Ctx, net: &Net) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(16)).await;
//!         net.broadcast(&[b'H']);
//!     }
//! }
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;
mod tcp_broadcast;

pub use context::LinkContext;
pub use network::BroadcastTransport;
pub use types::{IdentityId, ListenerId, NodeId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
pub use tcp_broadcast::{TcpBroadcaster, DEFAULT_LISTENER_BACKLOG};
