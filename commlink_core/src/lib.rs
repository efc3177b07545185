//! commlink Core - Signal-Quality Propagation Engine
//!
//! Computes, every few hundred milliseconds, how well each online agent
//! hears every other agent and every diagnostic marker through a network
//! of radios, relays and beacons, and broadcasts the result to listeners:
//!
//! 1. **Quality model**: per-link quality in [0, 1], multiplied along paths
//! 2. **Engines**: widest-path search ([`best_path`]) and a greedy relay
//!    tree ([`walk_network`]), switchable at runtime
//! 3. **Emitter**: heartbeat + compute timers, packed little-endian frames
//!
//! The engine never walks the host world itself; it asks a
//! [`DiscoveryAdapter`] for edges on demand.

pub mod node;
pub mod quality;
pub mod discovery;
pub mod search;
pub mod markers;
pub mod best_path;
pub mod walk_network;
pub mod protocol;
pub mod perf;
pub mod config;
pub mod emitter;
pub mod query;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use node::{Broadcaster, EndpointKind, NodeInfo, NodeKind, OnlineAgent, Receiver};
pub use quality::link_quality;
pub use discovery::{DiscoveryAdapter, WorldView};
pub use search::{Algorithm, ResultMap, SearchRequest, TargetSet};
pub use markers::{label_is_diagnostic, MarkerRegistry, DEFAULT_MARKER_TAG};
pub use best_path::{best_path, SearchContext};
pub use walk_network::{walk_network, TreeState};
pub use protocol::{Packet, ProtocolError};
pub use perf::{PerfStats, PerformanceLog};
pub use config::{ConfigError, ConfigStore, ServerConfig};
pub use emitter::{EmitterSettings, EmitterStats, SignalEmitter, TickReport};
pub use query::{Caller, Command, QueryError};
