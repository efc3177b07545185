//! commlink Simulation Harness
//!
//! A deterministic host for the signal engine. Everything the engine would
//! normally ask a game server for is faked here:
//! - **World**: entities with radios, beacons and lasers, moving on a fixed step
//! - **Time**: a virtual clock advanced only by the runner
//! - **Transport**: a capture buffer that decodes every frame sent
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Harness                     │
//! │  SimContext (virtual clock)                  │
//! │       │ now()                                │
//! │  ┌────▼──────────┐  broadcast  ┌───────────┐ │
//! │  │ SignalEmitter ├────────────►│SimTransport│ │
//! │  └────┬──────────┘             └───────────┘ │
//! │       │ DiscoveryAdapter                     │
//! │  ┌────▼─────┐                                │
//! │  │ SimWorld │                                │
//! │  └──────────┘                                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use commlink_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::ParallelPaths);
//! assert!(result.passed);
//! ```

mod context;
mod network;
mod world;
mod scene;
mod runner;
mod exporter;
pub mod scenarios;
pub mod serve;

pub use context::{derive_seed, SimContext};
pub use network::SimTransport;
pub use world::{EndpointSpec, EntityRole, SimEndpoint, SimEntity, SimPlayer, SimWorld, WorldError};
pub use scene::{generate, SceneConfig, SceneLayout, AGENT_ID_BASE};
pub use runner::{engine_disagreements, Harness, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use exporter::{EntityPosition, LinkRecord, QualityFrame, SimExport};
pub use serve::{advance, parse_console_line, serve, ServeError, ServeOptions};
