//! Explicit-graph adapter for unit tests.
//!
//! Every link gets its own radio broadcaster, placed so the quality model
//! yields exactly the requested quality at the listener's receiver.

use crate::discovery::{DiscoveryAdapter, WorldView};
use crate::node::{Broadcaster, EndpointKind, NodeInfo, NodeKind, OnlineAgent, Receiver};
use crate::quality::distance_for_quality;
use commlink_env::{BroadcastTransport, EnvError, IdentityId, NodeId};
use nalgebra::Vector3;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

const FIXTURE_RADIUS: f64 = 100.0;

#[derive(Default)]
pub struct GraphFixture {
    nodes: BTreeMap<NodeId, NodeInfo>,
    groups: BTreeMap<NodeId, NodeId>,
    /// (listener, broadcaster) pairs in insertion order
    links: Vec<(NodeId, Broadcaster)>,
    live: HashSet<NodeId>,
    agents: Vec<OnlineAgent>,
    next_endpoint: u64,
}

impl GraphFixture {
    pub fn new() -> Self {
        Self {
            next_endpoint: 1_000_000,
            ..Default::default()
        }
    }
    
    fn add_node(&mut self, id: u64, kind: NodeKind, label: &str, diagnostic: bool) -> NodeId {
        let id = NodeId(id);
        self.nodes.insert(id, NodeInfo {
            id,
            kind,
            label: label.to_string(),
            diagnostic,
            position: Vector3::zeros(),
        });
        id
    }
    
    /// Adds an online, embodied agent; returns its character id.
    pub fn agent(&mut self, agent_id: u64, character: u64) -> NodeId {
        let id = self.add_node(character, NodeKind::Agent, &format!("agent-{}", agent_id), false);
        self.live.insert(id);
        self.agents.push(OnlineAgent {
            agent_id,
            identity: IdentityId(agent_id as i64),
            character: Some(id),
            name: format!("agent-{}", agent_id),
        });
        id
    }
    
    /// Adds an online agent with no physical presence.
    pub fn ghost_agent(&mut self, agent_id: u64) {
        self.agents.push(OnlineAgent {
            agent_id,
            identity: IdentityId(agent_id as i64),
            character: None,
            name: format!("ghost-{}", agent_id),
        });
    }
    
    pub fn relay(&mut self, id: u64) -> NodeId {
        self.add_node(id, NodeKind::Relay, &format!("relay-{}", id), false)
    }
    
    pub fn marker(&mut self, id: u64) -> NodeId {
        self.add_node(id, NodeKind::Marker, &format!("sensor-{} [DEBUG RADIO]", id), true)
    }
    
    /// Strips the diagnostic tag from a node.
    pub fn untag(&mut self, id: NodeId) {
        if let Some(info) = self.nodes.get_mut(&id) {
            info.diagnostic = false;
            info.kind = NodeKind::Relay;
        }
    }
    
    /// Collapses `member` into `representative`'s relay group.
    pub fn group(&mut self, member: NodeId, representative: NodeId) {
        self.groups.insert(member, representative);
    }
    
    fn endpoint_id(&mut self) -> NodeId {
        self.next_endpoint += 1;
        NodeId(self.next_endpoint)
    }
    
    fn push_link(&mut self, listener: NodeId, speaker: NodeId, kind: EndpointKind, x: f64, diagnostic: bool) {
        let id = self.endpoint_id();
        let label = if diagnostic { "sensor [DEBUG RADIO]" } else { "antenna" };
        self.links.push((listener, Broadcaster {
            id,
            owner: speaker,
            kind,
            position: Vector3::new(x, 0.0, 0.0),
            label: label.to_string(),
            diagnostic,
        }));
    }
    
    /// `listener` hears `speaker` with exactly `quality`.
    pub fn link(&mut self, listener: NodeId, speaker: NodeId, quality: f64) {
        let x = distance_for_quality(quality, FIXTURE_RADIUS);
        self.push_link(listener, speaker, EndpointKind::RangedRadio { radius: FIXTURE_RADIUS }, x, false);
    }
    
    /// `listener` hears a diagnostic radio carried by `speaker`.
    pub fn diagnostic_link(&mut self, listener: NodeId, speaker: NodeId, quality: f64) {
        let x = distance_for_quality(quality, FIXTURE_RADIUS);
        self.push_link(listener, speaker, EndpointKind::RangedRadio { radius: FIXTURE_RADIUS }, x, true);
    }
    
    /// `listener` hears a beacon carried by `speaker`.
    pub fn beacon_link(&mut self, listener: NodeId, speaker: NodeId) {
        self.push_link(listener, speaker, EndpointKind::Beacon, 0.0, false);
    }
    
    /// `listener` has an always-on link from `speaker`.
    pub fn laser_link(&mut self, listener: NodeId, speaker: NodeId) {
        self.push_link(listener, speaker, EndpointKind::AlwaysOn, 5_000.0, false);
    }
    
    fn receiver_for(&self, node: NodeId) -> Receiver {
        Receiver {
            id: NodeId(node.0 + 500_000),
            owner: node,
            kind: EndpointKind::RangedRadio { radius: FIXTURE_RADIUS },
            position: Vector3::zeros(),
        }
    }
    
    fn members(&self, canonical: NodeId) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|n| self.canonical_relay(*n) == canonical)
            .collect()
    }
}

impl DiscoveryAdapter for GraphFixture {
    fn receivers_of(&self, node: NodeId, _viewer: IdentityId) -> Vec<Receiver> {
        self.members(self.canonical_relay(node))
            .into_iter()
            .filter(|m| self.links.iter().any(|(l, _)| l == m))
            .map(|m| self.receiver_for(m))
            .collect()
    }
    
    fn broadcasters_in_range(&self, receiver: &Receiver) -> Vec<Broadcaster> {
        self.links
            .iter()
            .filter(|(listener, _)| *listener == receiver.owner)
            .map(|(_, b)| b.clone())
            .collect()
    }
    
    fn broadcasters_of(&self, node: NodeId, _viewer: IdentityId) -> Vec<Broadcaster> {
        let members = self.members(self.canonical_relay(node));
        let mut seen = HashSet::new();
        self.links
            .iter()
            .filter(|(_, b)| members.contains(&b.owner) && seen.insert(b.id))
            .map(|(_, b)| b.clone())
            .collect()
    }
    
    fn canonical_relay(&self, node: NodeId) -> NodeId {
        self.groups.get(&node).copied().unwrap_or(node)
    }
    
    fn parent_entity(&self, broadcaster: &Broadcaster) -> NodeId {
        broadcaster.owner
    }
    
    fn node_info(&self, node: NodeId) -> Option<NodeInfo> {
        self.nodes.get(&node).cloned()
    }
    
    fn relayed_broadcasters(&self, node: NodeId, _viewer: IdentityId) -> Vec<Broadcaster> {
        // Breadth-first over listener -> speaker edges.
        let mut seen = HashSet::from([self.canonical_relay(node)]);
        let mut queue = vec![self.canonical_relay(node)];
        let mut found = Vec::new();
        while let Some(current) = queue.pop() {
            for (listener, b) in &self.links {
                if self.canonical_relay(*listener) != current {
                    continue;
                }
                found.push(b.clone());
                let next = self.canonical_relay(b.owner);
                if seen.insert(next) {
                    queue.push(next);
                }
            }
        }
        found
    }
    
    fn live_agent(&self, node: NodeId) -> bool {
        self.live.contains(&node)
    }
}

impl WorldView for GraphFixture {
    fn online_agents(&self) -> Vec<OnlineAgent> {
        self.agents.clone()
    }
}

/// Transport keeping every frame in memory.
#[derive(Default)]
pub struct RecordingTransport {
    pub frames: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }
}

impl BroadcastTransport for RecordingTransport {
    fn broadcast(&self, frame: &[u8]) -> Result<usize, EnvError> {
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(1)
    }
    
    fn listener_count(&self) -> usize {
        1
    }
}
