//! SimWorld - in-memory host world for the engine.
//!
//! Characters and structures carry endpoints. Structures can be joined
//! into relay groups and restricted to one identity. Positions move with
//! constant velocities on every [`SimWorld::step`].

use commlink_core::{
    label_is_diagnostic, Broadcaster, DiscoveryAdapter, EndpointKind, NodeInfo, NodeKind,
    OnlineAgent, Receiver, WorldView, DEFAULT_MARKER_TAG,
};
use commlink_env::{IdentityId, NodeId};
use nalgebra::Vector3;
use std::collections::{BTreeMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;

/// First id handed to endpoints, well above entity ids.
const ENDPOINT_ID_BASE: u64 = 1_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("Unknown entity {0}")]
    UnknownEntity(NodeId),
    
    #[error("Entity {0} is not a structure")]
    NotStructure(NodeId),
    
    #[error("Agent {0} already exists")]
    DuplicateAgent(u64),
    
    #[error("Unknown agent {0}")]
    UnknownAgent(u64),
}

/// How an endpoint links up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointSpec {
    /// Two-way radio antenna
    Radio { radius: f64 },
    /// Broadcast-only beacon heard by radios within `range`
    Beacon { range: f64 },
    /// Point-to-point link with a fixed peer entity
    Laser { peer: NodeId },
}

#[derive(Debug, Clone)]
pub struct SimEndpoint {
    pub id: NodeId,
    pub spec: EndpointSpec,
    pub enabled: bool,
}

impl SimEndpoint {
    fn kind(&self) -> EndpointKind {
        match self.spec {
            EndpointSpec::Radio { radius } => EndpointKind::RangedRadio { radius },
            EndpointSpec::Beacon { .. } => EndpointKind::Beacon,
            EndpointSpec::Laser { .. } => EndpointKind::AlwaysOn,
        }
    }
    
    fn receives(&self) -> bool {
        self.enabled && !matches!(self.spec, EndpointSpec::Beacon { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityRole {
    Character { agent_id: u64 },
    Structure { group: NodeId, access: Option<IdentityId> },
}

#[derive(Debug, Clone)]
pub struct SimEntity {
    pub id: NodeId,
    pub label: String,
    pub role: EntityRole,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub endpoints: Vec<SimEndpoint>,
}

impl SimEntity {
    fn is_structure(&self) -> bool {
        matches!(self.role, EntityRole::Structure { .. })
    }
    
    fn accessible_to(&self, viewer: IdentityId) -> bool {
        match self.role {
            EntityRole::Structure { access: Some(owner), .. } => owner == viewer,
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimPlayer {
    pub agent_id: u64,
    pub identity: IdentityId,
    pub name: String,
    pub character: Option<NodeId>,
    pub online: bool,
}

/// The simulated world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    entities: BTreeMap<NodeId, SimEntity>,
    players: BTreeMap<u64, SimPlayer>,
    marker_tag: String,
    next_entity: u64,
    next_endpoint: u64,
    time_secs: f64,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_TAG)
    }
}

impl SimWorld {
    pub fn new(marker_tag: &str) -> Self {
        Self {
            entities: BTreeMap::new(),
            players: BTreeMap::new(),
            marker_tag: marker_tag.to_string(),
            next_entity: 1,
            next_endpoint: ENDPOINT_ID_BASE,
            time_secs: 0.0,
        }
    }
    
    fn alloc_entity(&mut self) -> NodeId {
        let id = NodeId(self.next_entity);
        self.next_entity += 1;
        id
    }
    
    fn alloc_endpoint(&mut self) -> NodeId {
        let id = NodeId(self.next_endpoint);
        self.next_endpoint += 1;
        id
    }
    
    fn entity_mut(&mut self, id: NodeId) -> Result<&mut SimEntity, WorldError> {
        self.entities.get_mut(&id).ok_or(WorldError::UnknownEntity(id))
    }
    
    /// Adds an online player with an embodied character carrying a radio.
    pub fn add_character(
        &mut self,
        agent_id: u64,
        name: &str,
        position: Vector3<f64>,
        radius: f64,
    ) -> Result<NodeId, WorldError> {
        if self.players.contains_key(&agent_id) {
            return Err(WorldError::DuplicateAgent(agent_id));
        }
        let id = self.alloc_entity();
        let antenna = self.alloc_endpoint();
        self.entities.insert(id, SimEntity {
            id,
            label: name.to_string(),
            role: EntityRole::Character { agent_id },
            position,
            velocity: Vector3::zeros(),
            endpoints: vec![SimEndpoint {
                id: antenna,
                spec: EndpointSpec::Radio { radius },
                enabled: true,
            }],
        });
        self.players.insert(agent_id, SimPlayer {
            agent_id,
            identity: IdentityId(agent_id as i64),
            name: name.to_string(),
            character: Some(id),
            online: true,
        });
        Ok(id)
    }
    
    /// Adds an online player without a body.
    pub fn add_ghost(&mut self, agent_id: u64, name: &str) -> Result<(), WorldError> {
        if self.players.contains_key(&agent_id) {
            return Err(WorldError::DuplicateAgent(agent_id));
        }
        self.players.insert(agent_id, SimPlayer {
            agent_id,
            identity: IdentityId(agent_id as i64),
            name: name.to_string(),
            character: None,
            online: true,
        });
        Ok(())
    }
    
    /// Adds a bare structure with no endpoints.
    pub fn add_structure(&mut self, label: &str, position: Vector3<f64>) -> NodeId {
        let id = self.alloc_entity();
        self.entities.insert(id, SimEntity {
            id,
            label: label.to_string(),
            role: EntityRole::Structure { group: id, access: None },
            position,
            velocity: Vector3::zeros(),
            endpoints: Vec::new(),
        });
        id
    }
    
    /// Adds a structure carrying one radio antenna.
    pub fn add_relay(&mut self, label: &str, position: Vector3<f64>, radius: f64) -> NodeId {
        let id = self.add_structure(label, position);
        let antenna = self.alloc_endpoint();
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.endpoints.push(SimEndpoint {
                id: antenna,
                spec: EndpointSpec::Radio { radius },
                enabled: true,
            });
        }
        id
    }
    
    pub fn add_endpoint(&mut self, entity: NodeId, spec: EndpointSpec) -> Result<NodeId, WorldError> {
        self.entity_mut(entity)?;
        let id = self.alloc_endpoint();
        self.entity_mut(entity)?.endpoints.push(SimEndpoint { id, spec, enabled: true });
        Ok(id)
    }
    
    /// Connects two entities with a laser pair.
    pub fn add_laser(&mut self, a: NodeId, b: NodeId) -> Result<(NodeId, NodeId), WorldError> {
        self.entity_mut(b)?;
        let near = self.add_endpoint(a, EndpointSpec::Laser { peer: b })?;
        let far = self.add_endpoint(b, EndpointSpec::Laser { peer: a })?;
        Ok((near, far))
    }
    
    /// Joins `member` into the relay group led by `representative`.
    pub fn join_group(&mut self, member: NodeId, representative: NodeId) -> Result<(), WorldError> {
        if !self.entity_mut(representative)?.is_structure() {
            return Err(WorldError::NotStructure(representative));
        }
        match &mut self.entity_mut(member)?.role {
            EntityRole::Structure { group, .. } => {
                *group = representative;
                Ok(())
            }
            EntityRole::Character { .. } => Err(WorldError::NotStructure(member)),
        }
    }
    
    /// Restricts a structure to one identity (`None` = public).
    pub fn restrict(&mut self, structure: NodeId, owner: Option<IdentityId>) -> Result<(), WorldError> {
        match &mut self.entity_mut(structure)?.role {
            EntityRole::Structure { access, .. } => {
                *access = owner;
                Ok(())
            }
            EntityRole::Character { .. } => Err(WorldError::NotStructure(structure)),
        }
    }
    
    pub fn set_velocity(&mut self, entity: NodeId, velocity: Vector3<f64>) -> Result<(), WorldError> {
        self.entity_mut(entity)?.velocity = velocity;
        Ok(())
    }
    
    pub fn set_position(&mut self, entity: NodeId, position: Vector3<f64>) -> Result<(), WorldError> {
        self.entity_mut(entity)?.position = position;
        Ok(())
    }
    
    pub fn relabel(&mut self, entity: NodeId, label: &str) -> Result<(), WorldError> {
        self.entity_mut(entity)?.label = label.to_string();
        Ok(())
    }
    
    pub fn set_endpoints_enabled(&mut self, entity: NodeId, enabled: bool) -> Result<(), WorldError> {
        for endpoint in &mut self.entity_mut(entity)?.endpoints {
            endpoint.enabled = enabled;
        }
        Ok(())
    }
    
    /// Removes an entity; its player, if any, loses the body.
    pub fn remove_entity(&mut self, entity: NodeId) -> Result<SimEntity, WorldError> {
        let removed = self.entities.remove(&entity).ok_or(WorldError::UnknownEntity(entity))?;
        for player in self.players.values_mut() {
            if player.character == Some(entity) {
                player.character = None;
            }
        }
        debug!("Removed entity {} ({})", entity, removed.label);
        Ok(removed)
    }
    
    pub fn set_online(&mut self, agent_id: u64, online: bool) -> Result<(), WorldError> {
        let player = self.players.get_mut(&agent_id).ok_or(WorldError::UnknownAgent(agent_id))?;
        player.online = online;
        Ok(())
    }
    
    /// Advances every entity along its velocity.
    pub fn step(&mut self, dt: f64) {
        for entity in self.entities.values_mut() {
            entity.position += entity.velocity * dt;
        }
        self.time_secs += dt;
    }
    
    pub fn time(&self) -> f64 {
        self.time_secs
    }
    
    pub fn entity(&self, id: NodeId) -> Option<&SimEntity> {
        self.entities.get(&id)
    }
    
    pub fn entities(&self) -> impl Iterator<Item = &SimEntity> {
        self.entities.values()
    }
    
    pub fn player(&self, agent_id: u64) -> Option<&SimPlayer> {
        self.players.get(&agent_id)
    }
    
    pub fn marker_tag(&self) -> &str {
        &self.marker_tag
    }
    
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
    
    fn is_diagnostic_label(&self, label: &str) -> bool {
        label_is_diagnostic(label, &self.marker_tag)
    }
    
    fn group_of(&self, id: NodeId) -> NodeId {
        match self.entities.get(&id).map(|e| &e.role) {
            Some(EntityRole::Structure { group, .. }) => *group,
            _ => id,
        }
    }
    
    /// Entities standing for `node`: its whole group for a structure.
    fn members(&self, node: NodeId) -> Vec<&SimEntity> {
        let Some(entity) = self.entities.get(&node) else {
            return Vec::new();
        };
        if !entity.is_structure() {
            return vec![entity];
        }
        let group = self.group_of(node);
        self.entities
            .values()
            .filter(|e| e.is_structure() && self.group_of(e.id) == group)
            .collect()
    }
    
    fn broadcaster(&self, entity: &SimEntity, endpoint: &SimEndpoint) -> Broadcaster {
        Broadcaster {
            id: endpoint.id,
            owner: entity.id,
            kind: endpoint.kind(),
            position: entity.position,
            label: entity.label.clone(),
            diagnostic: entity.is_structure() && self.is_diagnostic_label(&entity.label),
        }
    }
    
    /// Whether `endpoint` on `speaker` reaches `receiver`.
    fn reaches(&self, speaker: &SimEntity, endpoint: &SimEndpoint, receiver: &Receiver) -> bool {
        let dist2 = (speaker.position - receiver.position).norm_squared();
        match (endpoint.spec, receiver.kind) {
            (EndpointSpec::Radio { radius }, EndpointKind::RangedRadio { .. }) => dist2 <= radius * radius,
            (EndpointSpec::Beacon { range }, EndpointKind::RangedRadio { .. }) => dist2 <= range * range,
            (EndpointSpec::Laser { peer }, EndpointKind::AlwaysOn) => {
                if peer != receiver.owner {
                    return false;
                }
                // The receiving end must point back at the speaker.
                self.entities
                    .get(&receiver.owner)
                    .and_then(|owner| owner.endpoints.iter().find(|e| e.id == receiver.id))
                    .map(|e| matches!(e.spec, EndpointSpec::Laser { peer } if peer == speaker.id))
                    .unwrap_or(false)
            }
            _ => false,
        }
    }
}

impl DiscoveryAdapter for SimWorld {
    fn receivers_of(&self, node: NodeId, viewer: IdentityId) -> Vec<Receiver> {
        let mut receivers = Vec::new();
        for entity in self.members(node) {
            if !entity.accessible_to(viewer) {
                continue;
            }
            for endpoint in entity.endpoints.iter().filter(|e| e.receives()) {
                receivers.push(Receiver {
                    id: endpoint.id,
                    owner: entity.id,
                    kind: endpoint.kind(),
                    position: entity.position,
                });
            }
        }
        receivers
    }
    
    fn broadcasters_in_range(&self, receiver: &Receiver) -> Vec<Broadcaster> {
        let mut heard = Vec::new();
        for speaker in self.entities.values() {
            if speaker.id == receiver.owner {
                continue;
            }
            for endpoint in speaker.endpoints.iter().filter(|e| e.enabled) {
                if self.reaches(speaker, endpoint, receiver) {
                    heard.push(self.broadcaster(speaker, endpoint));
                }
            }
        }
        heard
    }
    
    fn broadcasters_of(&self, node: NodeId, viewer: IdentityId) -> Vec<Broadcaster> {
        let mut out = Vec::new();
        for entity in self.members(node) {
            if !entity.accessible_to(viewer) {
                continue;
            }
            for endpoint in entity.endpoints.iter().filter(|e| e.enabled) {
                out.push(self.broadcaster(entity, endpoint));
            }
        }
        out
    }
    
    fn canonical_relay(&self, node: NodeId) -> NodeId {
        self.group_of(node)
    }
    
    fn parent_entity(&self, broadcaster: &Broadcaster) -> NodeId {
        broadcaster.owner
    }
    
    fn node_info(&self, node: NodeId) -> Option<NodeInfo> {
        let entity = self.entities.get(&node)?;
        let diagnostic = entity.is_structure() && self.is_diagnostic_label(&entity.label);
        let kind = match entity.role {
            EntityRole::Character { .. } => NodeKind::Agent,
            EntityRole::Structure { .. } if diagnostic => NodeKind::Marker,
            EntityRole::Structure { .. } => NodeKind::Relay,
        };
        Some(NodeInfo {
            id: node,
            kind,
            label: entity.label.clone(),
            diagnostic,
            position: entity.position,
        })
    }
    
    fn relayed_broadcasters(&self, node: NodeId, viewer: IdentityId) -> Vec<Broadcaster> {
        let start = self.canonical_relay(node);
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();
        let mut found_ids = HashSet::new();
        while let Some(current) = queue.pop_front() {
            for receiver in self.receivers_of(current, viewer) {
                for broadcaster in self.broadcasters_in_range(&receiver) {
                    let next = self.canonical_relay(broadcaster.owner);
                    let relays = self.entities.get(&next).map(|e| e.is_structure()).unwrap_or(false);
                    if found_ids.insert(broadcaster.id) {
                        found.push(broadcaster);
                    }
                    if relays && seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        found
    }
    
    fn live_agent(&self, node: NodeId) -> bool {
        match self.entities.get(&node).map(|e| &e.role) {
            Some(EntityRole::Character { agent_id }) => self
                .players
                .get(agent_id)
                .map(|p| p.online && p.character == Some(node))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl WorldView for SimWorld {
    fn online_agents(&self) -> Vec<OnlineAgent> {
        self.players
            .values()
            .filter(|p| p.online)
            .map(|p| OnlineAgent {
                agent_id: p.agent_id,
                identity: p.identity,
                character: p.character,
                name: p.name.clone(),
            })
            .collect()
    }
}
