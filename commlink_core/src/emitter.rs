//! Scheduler and broadcast emitter.
//!
//! Driven by the host calling [`SignalEmitter::update`] with the current
//! clock reading. Two independent timers:
//!
//! - **heartbeat** (default 5 s): one `'H'` frame to every listener
//! - **compute** (default 500 ms): search from every embodied agent and
//!   send one `'Q'` frame per (other embodied agent, agent) and
//!   (marker, agent) pair
//!
//! Everything runs synchronously inside `update`; the search state is
//! owned by the emitter and reused across ticks.

use crate::best_path::{best_path, SearchContext};
use crate::config::ServerConfig;
use crate::discovery::{DiscoveryAdapter, WorldView};
use crate::markers::MarkerRegistry;
use crate::node::OnlineAgent;
use crate::perf::PerformanceLog;
use crate::protocol::Packet;
use crate::search::{Algorithm, ResultMap, SearchRequest, TargetSet};
use crate::walk_network::{walk_network, TreeState};
use commlink_env::{BroadcastTransport, IdentityId, NodeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timer and engine settings taken from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterSettings {
    pub heartbeat_interval: Duration,
    pub compute_interval: Duration,
    pub algorithm: Algorithm,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for EmitterSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            compute_interval: config.compute_interval(),
            algorithm: config.algorithm,
        }
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub compute_ticks: u64,
    pub heartbeats: u64,
    pub quality_packets: u64,
    pub send_failures: u64,
}

/// What one call to [`SignalEmitter::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub heartbeat: bool,
    pub computed: bool,
    pub searches: usize,
    pub packets: usize,
}

pub struct SignalEmitter<W, T> {
    world: W,
    transport: T,
    settings: EmitterSettings,
    algorithm: Algorithm,
    
    markers: MarkerRegistry,
    search: SearchContext,
    tree: TreeState,
    performance: PerformanceLog,
    
    last_heartbeat: Duration,
    last_compute: Duration,
    last_results: HashMap<u64, ResultMap>,
    stats: EmitterStats,
}

impl<W, T> SignalEmitter<W, T>
where
    W: DiscoveryAdapter + WorldView,
    T: BroadcastTransport,
{
    pub fn new(world: W, transport: T, settings: EmitterSettings) -> Self {
        info!(
            "Signal emitter ready: {} (heartbeat {:?}, compute {:?})",
            settings.algorithm, settings.heartbeat_interval, settings.compute_interval
        );
        Self {
            world,
            transport,
            settings,
            algorithm: settings.algorithm,
            markers: MarkerRegistry::new(),
            search: SearchContext::new(),
            tree: TreeState::new(),
            performance: PerformanceLog::new(),
            last_heartbeat: Duration::ZERO,
            last_compute: Duration::ZERO,
            last_results: HashMap::new(),
            stats: EmitterStats::default(),
        }
    }
    
    /// Advances both timers to `now` and runs whatever came due.
    pub fn update(&mut self, now: Duration) -> TickReport {
        let mut report = TickReport::default();
        
        if now.saturating_sub(self.last_heartbeat) >= self.settings.heartbeat_interval {
            self.last_heartbeat = now;
            report.heartbeat = true;
            self.stats.heartbeats += 1;
            if self.send(Packet::Heartbeat) {
                report.packets += 1;
            }
        }
        
        if now.saturating_sub(self.last_compute) >= self.settings.compute_interval {
            self.last_compute = now;
            report.computed = true;
            let (searches, packets) = self.compute_tick();
            report.searches = searches;
            report.packets += packets;
        }
        
        report
    }
    
    /// One compute cycle. Returns (searches run, packets sent).
    pub fn compute_tick(&mut self) -> (usize, usize) {
        self.stats.compute_ticks += 1;
        self.markers.evict_stale(&self.world);
        
        let agents = self.world.online_agents();
        let targets = self.targets_for(&agents);
        
        let mut elapsed = Duration::ZERO;
        let mut searches = 0;
        let mut packets = 0;
        for agent in agents.iter().filter(|a| a.is_embodied()) {
            let started = Instant::now();
            let Some(results) = self.run_search(agent, &targets, false) else {
                continue;
            };
            elapsed += started.elapsed();
            searches += 1;
            
            packets += self.emit_results(agent, &agents, &results);
            self.last_results.insert(agent.agent_id, results);
        }
        self.performance.record(elapsed);
        
        debug!(
            "Compute tick: {} searches, {} packets, {} markers in {:?}",
            searches,
            packets,
            self.markers.len(),
            elapsed
        );
        (searches, packets)
    }
    
    /// Every embodied character plus every tracked marker.
    pub(crate) fn targets_for(&self, agents: &[OnlineAgent]) -> TargetSet {
        let mut targets: TargetSet = agents.iter().filter_map(|a| a.character).collect();
        for marker in self.markers.iter() {
            targets.insert(marker);
        }
        targets
    }
    
    /// Runs the active engine from `agent`; `None` if it is not embodied.
    pub(crate) fn run_search(
        &mut self,
        agent: &OnlineAgent,
        targets: &TargetSet,
        verbose: bool,
    ) -> Option<ResultMap> {
        let source = agent.character?;
        let request = SearchRequest::new(source, agent.identity, targets).verbose(verbose);
        let results = match self.algorithm {
            Algorithm::BestPath => best_path(&self.world, &request, &mut self.search, &mut self.markers),
            Algorithm::WalkNetwork => walk_network(&self.world, &request, &mut self.tree, &mut self.markers),
        };
        Some(results)
    }
    
    /// Sends `to`'s view of every other embodied agent and every marker.
    pub(crate) fn emit_results(
        &mut self,
        to: &OnlineAgent,
        agents: &[OnlineAgent],
        results: &ResultMap,
    ) -> usize {
        let mut sent = 0;
        for from in agents {
            if from.agent_id == to.agent_id {
                continue;
            }
            let Some(character) = from.character else {
                continue;
            };
            let quality = results.get(&character).copied().unwrap_or(0.0);
            if self.send(Packet::quality(from.agent_id, to.agent_id, quality)) {
                sent += 1;
            }
        }
        
        let markers: Vec<NodeId> = self.markers.ids();
        for marker in markers {
            let quality = results.get(&marker).copied().unwrap_or(0.0);
            if self.send(Packet::quality(marker.raw(), to.agent_id, quality)) {
                sent += 1;
            }
        }
        sent
    }
    
    fn send(&mut self, packet: Packet) -> bool {
        match self.transport.broadcast(&packet.encode()) {
            Ok(_) => {
                if matches!(packet, Packet::Quality { .. }) {
                    self.stats.quality_packets += 1;
                }
                true
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!("Failed to send {:?}: {}", packet, e);
                false
            }
        }
    }
    
    pub(crate) fn cache_result(&mut self, agent_id: u64, results: ResultMap) {
        self.last_results.insert(agent_id, results);
    }
    
    /// Drops stale markers and registers every one relayed to `origin`.
    pub(crate) fn scan_markers(&mut self, origin: NodeId, viewer: IdentityId) -> usize {
        self.markers.evict_stale(&self.world);
        self.markers.scan(&self.world, origin, viewer)
    }
    
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
    
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        if self.algorithm != algorithm {
            info!("Switching engine: {} -> {}", self.algorithm, algorithm);
        }
        self.algorithm = algorithm;
    }
    
    /// Flips between the two engines; returns the new one.
    pub fn toggle_algorithm(&mut self) -> Algorithm {
        self.set_algorithm(self.algorithm.toggled());
        self.algorithm
    }
    
    /// Last result map computed for `agent_id`.
    pub fn last_result(&self, agent_id: u64) -> Option<&ResultMap> {
        self.last_results.get(&agent_id)
    }
    
    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }
    
    pub fn performance(&self) -> &PerformanceLog {
        &self.performance
    }
    
    pub fn stats(&self) -> EmitterStats {
        self.stats
    }
    
    pub fn settings(&self) -> &EmitterSettings {
        &self.settings
    }
    
    pub fn world(&self) -> &W {
        &self.world
    }
    
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }
    
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GraphFixture, RecordingTransport};
    use std::sync::Arc;
    
    fn decode_all(transport: &RecordingTransport) -> Vec<Packet> {
        transport
            .frames()
            .iter()
            .map(|f| Packet::decode(f).unwrap().0)
            .collect()
    }
    
    fn quality_of(packets: &[Packet], from: u64, to: u64) -> Option<f32> {
        packets.iter().rev().find_map(|p| match *p {
            Packet::Quality { from: f, to: t, quality } if f == from && t == to => Some(quality),
            _ => None,
        })
    }
    
    #[test]
    fn test_timers_fire_independently() {
        let world = GraphFixture::new();
        let transport = Arc::new(RecordingTransport::default());
        let mut emitter = SignalEmitter::new(world, transport.clone(), EmitterSettings::default());
        
        let mut heartbeats = 0;
        let mut computes = 0;
        for step in 1..=200u64 {
            let report = emitter.update(Duration::from_millis(step * 100));
            heartbeats += report.heartbeat as usize;
            computes += report.computed as usize;
        }
        
        assert_eq!(heartbeats, 4);
        assert_eq!(computes, 40);
        assert_eq!(emitter.performance().len(), 40);
        assert_eq!(decode_all(&transport), vec![Packet::Heartbeat; 4]);
    }
    
    #[test]
    fn test_nothing_fires_before_interval() {
        let mut emitter = SignalEmitter::new(
            GraphFixture::new(),
            Arc::new(RecordingTransport::default()),
            EmitterSettings::default(),
        );
        let report = emitter.update(Duration::from_millis(499));
        assert!(!report.heartbeat);
        assert!(!report.computed);
    }
    
    #[test]
    fn test_compute_emits_pairwise_square_rooted_qualities() {
        let mut world = GraphFixture::new();
        let a = world.agent(1, 100);
        let b = world.agent(2, 200);
        // Third agent so the source's own slot does not end the search.
        world.agent(3, 300);
        world.link(a, b, 0.81);
        world.link(b, a, 0.25);
        
        let transport = Arc::new(RecordingTransport::default());
        let mut emitter = SignalEmitter::new(world, transport.clone(), EmitterSettings::default());
        let (searches, packets) = emitter.compute_tick();
        
        assert_eq!(searches, 3);
        assert_eq!(packets, 6);
        let sent = decode_all(&transport);
        assert!((quality_of(&sent, 2, 1).unwrap() - 0.9).abs() < 1e-6);
        assert!((quality_of(&sent, 1, 2).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(emitter.last_result(1).map(|r| r.contains_key(&b)), Some(true));
    }
    
    #[test]
    fn test_unembodied_agents_skipped_and_unreachable_reported_as_zero() {
        let mut world = GraphFixture::new();
        let a = world.agent(1, 100);
        world.agent(2, 200);
        world.ghost_agent(3);
        let relay = world.relay(300);
        world.link(a, relay, 0.5);
        
        let transport = Arc::new(RecordingTransport::default());
        let mut emitter = SignalEmitter::new(world, transport.clone(), EmitterSettings::default());
        let (searches, _) = emitter.compute_tick();
        
        assert_eq!(searches, 2);
        let sent = decode_all(&transport);
        assert_eq!(quality_of(&sent, 2, 1), Some(0.0));
        assert!(sent.iter().all(|p| !matches!(p, Packet::Quality { from: 3, .. } | Packet::Quality { to: 3, .. })));
    }
    
    #[test]
    fn test_markers_reported_once_discovered() {
        let mut world = GraphFixture::new();
        let a = world.agent(1, 100);
        world.agent(2, 400);
        world.agent(3, 500);
        let relay = world.relay(200);
        let sensor = world.marker(300);
        world.link(a, relay, 0.64);
        world.link(relay, sensor, 1.0);
        
        let transport = Arc::new(RecordingTransport::default());
        let mut emitter = SignalEmitter::new(world, transport.clone(), EmitterSettings::default());
        emitter.compute_tick();
        assert!(emitter.markers().contains(sensor));
        
        // Second tick: the marker is a target now.
        emitter.compute_tick();
        let sent = decode_all(&transport);
        assert!((quality_of(&sent, 300, 1).unwrap() - 0.8).abs() < 1e-6);
    }
    
    #[test]
    fn test_stale_marker_evicted_before_tick() {
        let mut world = GraphFixture::new();
        let a = world.agent(1, 100);
        world.agent(2, 400);
        world.agent(3, 500);
        let sensor = world.marker(300);
        world.link(a, sensor, 0.5);
        
        let mut emitter = SignalEmitter::new(
            world,
            Arc::new(RecordingTransport::default()),
            EmitterSettings::default(),
        );
        emitter.compute_tick();
        assert!(emitter.markers().contains(sensor));
        
        emitter.world_mut().untag(sensor);
        emitter.compute_tick();
        assert!(!emitter.markers().contains(sensor));
    }
    
    #[test]
    fn test_walk_network_feeds_same_emission() {
        let mut world = GraphFixture::new();
        let a = world.agent(1, 100);
        let b = world.agent(2, 200);
        let relay = world.relay(300);
        world.link(a, relay, 0.9);
        world.link(relay, b, 0.9);
        
        let transport = Arc::new(RecordingTransport::default());
        let settings = EmitterSettings {
            algorithm: Algorithm::WalkNetwork,
            ..EmitterSettings::default()
        };
        let mut emitter = SignalEmitter::new(world, transport.clone(), settings);
        emitter.compute_tick();
        
        let sent = decode_all(&transport);
        assert!((quality_of(&sent, 2, 1).unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(emitter.toggle_algorithm(), Algorithm::BestPath);
    }
}
