//! Seeded scene generation.
//!
//! Everything is drawn from one ChaCha8 stream, so the same
//! [`SceneConfig`] always yields the same world.

use crate::context::SimContext;
use crate::world::{EndpointSpec, SimWorld, WorldError};
use commlink_env::{IdentityId, NodeId};
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public agent ids start here.
pub const AGENT_ID_BASE: u64 = 76_561_198_000_000_000;

const SCENE_STREAM: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Master seed
    pub seed: u64,
    /// Embodied agents
    pub agents: usize,
    /// Online agents without a body
    pub ghosts: usize,
    /// Plain relay structures
    pub relays: usize,
    /// Relays labelled with the marker tag
    pub markers: usize,
    /// Relays that also carry a beacon
    pub beacons: usize,
    /// Laser pairs between random relays
    pub lasers: usize,
    /// Half-width of the square the scene is scattered over (m)
    pub area: f64,
    /// Radio radius for agents (m)
    pub agent_radius: f64,
    /// Radio radius for relays (m)
    pub relay_radius: f64,
    /// Beacon range (m)
    pub beacon_range: f64,
    /// Chance a relay gets a companion joined into its group
    pub group_chance: f64,
    /// Chance a relay is restricted to one agent's identity
    pub restricted_chance: f64,
    /// Top agent speed (m/s)
    pub max_speed: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agents: 6,
            ghosts: 1,
            relays: 12,
            markers: 2,
            beacons: 2,
            lasers: 1,
            area: 5_000.0,
            agent_radius: 1_500.0,
            relay_radius: 4_000.0,
            beacon_range: 3_000.0,
            group_chance: 0.25,
            restricted_chance: 0.1,
            max_speed: 20.0,
        }
    }
}

impl SceneConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    
    pub fn with_agents(mut self, agents: usize) -> Self {
        self.agents = agents;
        self
    }
}

/// Ids of what [`generate`] placed.
#[derive(Debug, Clone, Default)]
pub struct SceneLayout {
    pub agent_ids: Vec<u64>,
    pub characters: Vec<NodeId>,
    pub relays: Vec<NodeId>,
    pub markers: Vec<NodeId>,
}

fn scatter<R: Rng>(rng: &mut R, area: f64) -> Vector3<f64> {
    Vector3::new(
        rng.gen_range(-area..=area),
        rng.gen_range(-area..=area),
        rng.gen_range(-area * 0.05..=area * 0.05),
    )
}

/// Builds a world from `config`.
pub fn generate(config: &SceneConfig, marker_tag: &str) -> Result<(SimWorld, SceneLayout), WorldError> {
    let mut rng = SimContext::new(config.seed).rng_for(SCENE_STREAM);
    let mut world = SimWorld::new(marker_tag);
    let mut layout = SceneLayout::default();
    let area = config.area.max(1.0);
    
    for i in 0..config.agents {
        let agent_id = AGENT_ID_BASE + i as u64;
        let position = scatter(&mut rng, area);
        let character = world.add_character(agent_id, &format!("agent-{}", i), position, config.agent_radius)?;
        let heading = rng.gen_range(0.0..std::f64::consts::TAU);
        let speed = rng.gen_range(0.0..=config.max_speed.max(0.0));
        let velocity = Vector3::new(heading.cos(), heading.sin(), 0.0) * speed;
        world.set_velocity(character, velocity)?;
        layout.agent_ids.push(agent_id);
        layout.characters.push(character);
    }
    for i in 0..config.ghosts {
        let agent_id = AGENT_ID_BASE + (config.agents + i) as u64;
        world.add_ghost(agent_id, &format!("ghost-{}", i))?;
        layout.agent_ids.push(agent_id);
    }
    
    for i in 0..config.relays {
        let position = scatter(&mut rng, area);
        let relay = world.add_relay(&format!("relay-{}", i), position, config.relay_radius);
        if rng.gen_bool(config.group_chance.clamp(0.0, 1.0)) {
            let offset = Vector3::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0), 0.0);
            let annex = world.add_relay(&format!("relay-{} annex", i), position + offset, config.relay_radius * 0.5);
            world.join_group(annex, relay)?;
        }
        if !layout.agent_ids.is_empty() && rng.gen_bool(config.restricted_chance.clamp(0.0, 1.0)) {
            let owner = layout.agent_ids[rng.gen_range(0..layout.agent_ids.len())];
            world.restrict(relay, Some(IdentityId(owner as i64)))?;
        }
        layout.relays.push(relay);
    }
    
    for i in 0..config.markers {
        let position = scatter(&mut rng, area);
        let marker = world.add_relay(&format!("sensor-{} {}", i, marker_tag), position, config.relay_radius);
        layout.markers.push(marker);
    }
    
    for i in 0..config.beacons.min(layout.relays.len()) {
        let relay = layout.relays[i];
        world.add_endpoint(relay, EndpointSpec::Beacon { range: config.beacon_range })?;
    }
    
    if layout.relays.len() >= 2 {
        for _ in 0..config.lasers {
            let a = layout.relays[rng.gen_range(0..layout.relays.len())];
            let b = layout.relays[rng.gen_range(0..layout.relays.len())];
            if a != b {
                world.add_laser(a, b)?;
            }
        }
    }
    
    debug!(
        "Generated scene seed={}: {} agents, {} relays, {} markers, {} entities",
        config.seed,
        layout.characters.len(),
        layout.relays.len(),
        layout.markers.len(),
        world.entity_count()
    );
    Ok((world, layout))
}
