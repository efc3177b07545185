//! World node and endpoint model as seen by the engine.
//!
//! Nodes are never owned here: the discovery adapter hands out fresh
//! values on every query and the engine only keeps their ids.

use commlink_env::{IdentityId, NodeId};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// What a node stands for in the signal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A controllable, embodied character
    Agent,
    /// A structure relaying signal for everything attached to it
    Relay,
    /// A relay carrying the diagnostic tag
    Marker,
}

impl NodeKind {
    /// Relays and markers are structures; they collapse to a canonical group id.
    pub fn is_structure(&self) -> bool {
        matches!(self, NodeKind::Relay | NodeKind::Marker)
    }
}

/// Physical behaviour of a broadcasting or receiving endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EndpointKind {
    /// Radio whose signal fades to nothing at `radius` meters
    RangedRadio { radius: f64 },
    /// Quality-preserving relay endpoint; never becomes a frontier hop
    Beacon,
    /// Always-on link (laser, physical connector)
    AlwaysOn,
}

impl EndpointKind {
    pub fn is_beacon(&self) -> bool {
        matches!(self, EndpointKind::Beacon)
    }
}

/// An endpoint that emits signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcaster {
    /// Endpoint id
    pub id: NodeId,
    
    /// Entity physically carrying the endpoint (structure or character)
    pub owner: NodeId,
    
    /// Physical behaviour
    pub kind: EndpointKind,
    
    /// Broadcast origin in world coordinates (meters)
    pub position: Vector3<f64>,
    
    /// Display label
    pub label: String,
    
    /// Carries the diagnostic tag (synthetic radio)
    pub diagnostic: bool,
}

/// An endpoint that listens for signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Endpoint id
    pub id: NodeId,
    
    /// Entity physically carrying the endpoint
    pub owner: NodeId,
    
    /// Physical behaviour
    pub kind: EndpointKind,
    
    /// Listening position in world coordinates (meters)
    pub position: Vector3<f64>,
}

/// Metadata the adapter exposes for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    
    /// Diagnostic tag, replaces matching on the label text
    pub diagnostic: bool,
    
    pub position: Vector3<f64>,
}

/// An online participant as reported by the host world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineAgent {
    /// Public id written into packets
    pub agent_id: u64,
    
    /// Identity used for discovery queries
    pub identity: IdentityId,
    
    /// Embodied character; `None` while not physically present
    pub character: Option<NodeId>,
    
    /// Display name
    pub name: String,
}

impl OnlineAgent {
    pub fn is_embodied(&self) -> bool {
        self.character.is_some()
    }
}
