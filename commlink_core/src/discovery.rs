//! Capability interfaces onto the host world.
//!
//! The engine never walks the world itself. Every edge it considers is
//! materialised on demand through a [`DiscoveryAdapter`], and the list of
//! participants comes from a [`WorldView`]. Both must answer
//! deterministically (same content, same order) within one tick.

use crate::node::{Broadcaster, NodeInfo, OnlineAgent, Receiver};
use commlink_env::{IdentityId, NodeId};

/// Lazily materialised signal graph.
pub trait DiscoveryAdapter {
    /// Receivers attached to `node` that `viewer` may use.
    ///
    /// For a canonical relay this covers every structure in its group.
    fn receivers_of(&self, node: NodeId, viewer: IdentityId) -> Vec<Receiver>;
    
    /// Broadcasters whose signal reaches `receiver`, excluding its own entity's.
    fn broadcasters_in_range(&self, receiver: &Receiver) -> Vec<Broadcaster>;
    
    /// Outbound broadcasters carried by `node` (or its relay group).
    fn broadcasters_of(&self, node: NodeId, viewer: IdentityId) -> Vec<Broadcaster>;
    
    /// Logical group representative of a structure; identity for anything else.
    fn canonical_relay(&self, node: NodeId) -> NodeId;
    
    /// Top-level entity a broadcaster belongs to.
    fn parent_entity(&self, broadcaster: &Broadcaster) -> NodeId;
    
    /// Metadata for a node, `None` once it left the world.
    fn node_info(&self, node: NodeId) -> Option<NodeInfo>;
    
    /// Every broadcaster transitively relayed to `node` for `viewer`.
    fn relayed_broadcasters(&self, node: NodeId, viewer: IdentityId) -> Vec<Broadcaster>;
    
    /// Whether `node` is a live character controlled by an online agent.
    fn live_agent(&self, node: NodeId) -> bool;
    
    /// Canonical relay id when `node` is a structure.
    fn relay_of(&self, node: NodeId) -> Option<NodeId> {
        match self.node_info(node) {
            Some(info) if info.kind.is_structure() => Some(self.canonical_relay(node)),
            _ => None,
        }
    }
    
    /// Whether `node` currently carries the diagnostic tag.
    fn is_diagnostic(&self, node: NodeId) -> bool {
        self.node_info(node).map(|info| info.diagnostic).unwrap_or(false)
    }
}

/// Host registry of online participants.
pub trait WorldView {
    /// All online agents, embodied or not.
    fn online_agents(&self) -> Vec<OnlineAgent>;
    
    /// Looks up one online agent by public id.
    fn online_agent(&self, agent_id: u64) -> Option<OnlineAgent> {
        self.online_agents().into_iter().find(|a| a.agent_id == agent_id)
    }
}
