//! Scenario runner - drives the emitter against a simulated world.

use crate::context::SimContext;
use crate::exporter::{EntityPosition, QualityFrame, SimExport};
use crate::network::SimTransport;
use crate::scenarios::ScenarioId;
use crate::scene::{generate, SceneConfig};
use crate::world::{EndpointSpec, SimWorld, WorldError};

use commlink_core::quality::{distance_for_quality, radio_quality};
use commlink_core::{
    best_path, walk_network, Algorithm, EmitterSettings, MarkerRegistry, Packet, SearchContext,
    SearchRequest, SignalEmitter, TargetSet, TreeState, WorldView, DEFAULT_MARKER_TAG,
};
use commlink_env::{LinkContext, NodeId};
use nalgebra::Vector3;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Radio radius used by the hand-built scenarios.
const RADIUS: f64 = 1000.0;

/// Packet quality tolerance (f32 on the wire).
const WIRE_EPSILON: f64 = 1e-4;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub algorithm: Algorithm,
    pub passed: bool,
    /// Simulation steps executed
    pub total_ticks: u64,
    pub final_time_secs: f64,
    pub failure_reason: Option<String>,
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    pub heartbeats: u64,
    pub compute_ticks: u64,
    pub quality_packets: u64,
    pub send_failures: u64,
    pub protocol_errors: u64,
    pub markers_tracked: usize,
    pub avg_tick_ms: f64,
    pub max_tick_ms: f64,
    /// Targets both engines resolved with different qualities
    pub engine_disagreements: u64,
}

/// An emitter on a virtual clock with a capturing transport.
pub struct Harness {
    context: SimContext,
    transport: SimTransport,
    emitter: SignalEmitter<SimWorld, SimTransport>,
    step: Duration,
    steps: u64,
    latest: HashMap<(u64, u64), f32>,
    frames: Vec<QualityFrame>,
    record: bool,
    protocol_errors: u64,
}

impl Harness {
    pub fn new(world: SimWorld, algorithm: Algorithm, step: Duration, seed: u64) -> Self {
        let transport = SimTransport::new();
        let settings = EmitterSettings {
            algorithm,
            ..EmitterSettings::default()
        };
        Self {
            context: SimContext::new(seed),
            emitter: SignalEmitter::new(world, transport.clone(), settings),
            transport,
            step,
            steps: 0,
            latest: HashMap::new(),
            frames: Vec::new(),
            record: false,
            protocol_errors: 0,
        }
    }
    
    /// Keep a [`QualityFrame`] for every step that sent something.
    pub fn recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }
    
    /// Moves the world and the clock one step and runs due timers.
    pub fn advance(&mut self) -> Vec<Packet> {
        self.emitter.world_mut().step(self.step.as_secs_f64());
        self.context.advance_time(self.step);
        self.emitter.update(self.context.now());
        self.steps += 1;
        
        let packets = match self.transport.take_packets() {
            Ok(packets) => packets,
            Err(e) => {
                warn!("Undecodable frame captured: {}", e);
                self.protocol_errors += 1;
                Vec::new()
            }
        };
        for packet in &packets {
            if let Packet::Quality { from, to, quality } = *packet {
                self.latest.insert((from, to), quality);
            }
        }
        if self.record && !packets.is_empty() {
            let mut frame = QualityFrame::from_packets(self.time_secs(), &packets);
            frame.positions = self
                .emitter
                .world()
                .entities()
                .map(|e| EntityPosition::new(e.id.raw(), &e.label, e.position))
                .collect();
            self.frames.push(frame);
        }
        packets
    }
    
    /// Advances until `duration` more virtual time has passed.
    pub fn run_for(&mut self, duration: Duration) -> Vec<Packet> {
        let steps = (duration.as_nanos() / self.step.as_nanos().max(1)) as u64;
        let mut packets = Vec::new();
        for _ in 0..steps {
            packets.extend(self.advance());
        }
        packets
    }
    
    /// Last quality `to` was told about `from`.
    pub fn latest(&self, from: u64, to: u64) -> Option<f32> {
        self.latest.get(&(from, to)).copied()
    }
    
    pub fn time_secs(&self) -> f64 {
        self.context.now().as_secs_f64()
    }
    
    pub fn emitter(&self) -> &SignalEmitter<SimWorld, SimTransport> {
        &self.emitter
    }
    
    pub fn emitter_mut(&mut self) -> &mut SignalEmitter<SimWorld, SimTransport> {
        &mut self.emitter
    }
    
    pub fn world_mut(&mut self) -> &mut SimWorld {
        self.emitter.world_mut()
    }
    
    pub fn transport(&self) -> &SimTransport {
        &self.transport
    }
    
    pub fn take_frames(&mut self) -> Vec<QualityFrame> {
        std::mem::take(&mut self.frames)
    }
    
    fn metrics(&self) -> ScenarioMetrics {
        let stats = self.emitter.stats();
        let perf = self.emitter.performance().stats();
        ScenarioMetrics {
            heartbeats: stats.heartbeats,
            compute_ticks: stats.compute_ticks,
            quality_packets: stats.quality_packets,
            send_failures: stats.send_failures,
            protocol_errors: self.protocol_errors,
            markers_tracked: self.emitter.markers().len(),
            avg_tick_ms: perf.map(|p| p.avg_ms).unwrap_or(0.0),
            max_tick_ms: perf.map(|p| p.max_ms).unwrap_or(0.0),
            engine_disagreements: 0,
        }
    }
}

/// Runs both engines from every embodied agent on the current world and
/// counts targets they both resolved with different qualities.
pub fn engine_disagreements(world: &SimWorld, tolerance: f64) -> u64 {
    let agents = world.online_agents();
    let targets: TargetSet = agents.iter().filter_map(|a| a.character).collect();
    let mut markers = MarkerRegistry::new();
    let mut search = SearchContext::new();
    let mut tree = TreeState::new();
    let mut count = 0;
    
    for agent in agents.iter().filter(|a| a.is_embodied()) {
        let Some(source) = agent.character else {
            continue;
        };
        let request = SearchRequest::new(source, agent.identity, &targets);
        let best = best_path(world, &request, &mut search, &mut markers);
        let walk = walk_network(world, &request, &mut tree, &mut markers);
        for target in targets.iter().filter(|t| *t != source) {
            if let (Some(b), Some(w)) = (best.get(&target), walk.get(&target)) {
                if (b - w).abs() > tolerance {
                    debug!("Engines disagree on {} -> {}: {:.6} vs {:.6}", source, target, b, w);
                    count += 1;
                }
            }
        }
    }
    count
}

fn expect_quality(harness: &Harness, from: u64, to: u64, expected: f64) -> Result<(), String> {
    match harness.latest(from, to) {
        Some(actual) if (actual as f64 - expected).abs() <= WIRE_EPSILON => Ok(()),
        Some(actual) => Err(format!("{} -> {}: expected {:.4}, got {:.4}", from, to, expected, actual)),
        None => Err(format!("{} -> {}: no packet sent", from, to)),
    }
}

fn along_x(x: f64) -> Vector3<f64> {
    Vector3::new(x, 0.0, 0.0)
}

/// Runs scenarios.
pub struct ScenarioRunner {
    seed: u64,
    algorithm: Algorithm,
    step: Duration,
    duration_secs: f64,
    scene: SceneConfig,
    record: bool,
}

/// What a scenario body hands back to the runner.
struct Outcome {
    harness: Harness,
    failure: Option<String>,
    disagreements: u64,
}

impl Outcome {
    fn new(harness: Harness, check: Result<(), String>) -> Self {
        Self {
            harness,
            failure: check.err(),
            disagreements: 0,
        }
    }
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            algorithm: Algorithm::BestPath,
            step: Duration::from_millis(100),
            duration_secs: 10.0,
            scene: SceneConfig::default().with_seed(seed),
            record: false,
        }
    }
    
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
    
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }
    
    /// Sets the duration of the open-ended scenarios (`mesh`).
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }
    
    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scene = scene.with_seed(self.seed);
        self
    }
    
    pub fn with_frames(mut self, record: bool) -> Self {
        self.record = record;
        self
    }
    
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_recorded(scenario).0
    }
    
    /// Runs a scenario and returns the result along with its export.
    pub fn run_recorded(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        info!("Starting scenario: {} (seed={}, {})", scenario.name(), self.seed, self.algorithm);
        debug!("  {}", scenario.description());
        
        let attempt = match scenario {
            ScenarioId::DirectLink => self.run_direct_link(),
            ScenarioId::ParallelPaths => self.run_parallel_paths(),
            ScenarioId::ZeroEdge => self.run_zero_edge(),
            ScenarioId::EarlyExit => self.run_early_exit(),
            ScenarioId::Heartbeat => self.run_heartbeat(),
            ScenarioId::Mesh => self.run_mesh(),
            ScenarioId::BeaconRelay => self.run_beacon_relay(),
            ScenarioId::MarkerChurn => self.run_marker_churn(),
        };
        self.conclude(scenario, attempt)
    }
    
    /// Turns a scenario body's outcome into a result; a world that could
    /// not be built fails the run.
    fn conclude(&self, scenario: ScenarioId, attempt: Result<Outcome, WorldError>) -> (ScenarioResult, SimExport) {
        let outcome = attempt.unwrap_or_else(|e| {
            warn!("Scenario {} could not be set up: {}", scenario.name(), e);
            let empty = self.harness(SimWorld::new(DEFAULT_MARKER_TAG));
            Outcome::new(empty, Err(format!("setup failed: {}", e)))
        });
        
        let Outcome { mut harness, mut failure, disagreements } = outcome;
        let mut metrics = harness.metrics();
        metrics.engine_disagreements = disagreements;
        if failure.is_none() && metrics.protocol_errors > 0 {
            failure = Some(format!("{} undecodable frames", metrics.protocol_errors));
        }
        
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            algorithm: self.algorithm,
            passed: failure.is_none(),
            total_ticks: harness.steps,
            final_time_secs: harness.time_secs(),
            failure_reason: failure,
            metrics,
        };
        
        let mut export = SimExport::new(scenario.name(), self.seed, self.algorithm.name());
        for frame in harness.take_frames() {
            export.add_frame(frame);
        }
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }
    
    fn harness(&self, world: SimWorld) -> Harness {
        Harness::new(world, self.algorithm, self.step, self.seed).recording(self.record)
    }
    
    /// Three agents: the third keeps the source's own target slot from
    /// ending the search on its first pop.
    fn trio(&self, t_position: Vector3<f64>) -> Result<SimWorld, WorldError> {
        let mut world = SimWorld::new(DEFAULT_MARKER_TAG);
        world.add_character(1, "source", Vector3::zeros(), RADIUS)?;
        world.add_character(2, "target", t_position, RADIUS)?;
        world.add_character(3, "bystander", along_x(50_000.0), RADIUS)?;
        Ok(world)
    }
    
    /// A single link of quality 0.81 reads 0.9 on the wire.
    fn run_direct_link(&self) -> Result<Outcome, WorldError> {
        let world = self.trio(along_x(distance_for_quality(0.81, RADIUS)))?;
        let disagreements = engine_disagreements(&world, 1e-9);
        let mut harness = self.harness(world);
        harness.run_for(Duration::from_secs(1));
        
        let check = expect_quality(&harness, 2, 1, 0.9)
            .and_then(|_| expect_quality(&harness, 1, 2, 0.9))
            .and_then(|_| expect_quality(&harness, 3, 1, 0.0))
            .and_then(|_| match disagreements {
                0 => Ok(()),
                n => Err(format!("engines disagree on {} targets", n)),
            });
        Ok(Outcome { disagreements, ..Outcome::new(harness, check) })
    }
    
    /// The strong relay path wins over the weak one.
    fn run_parallel_paths(&self) -> Result<Outcome, WorldError> {
        let mut world = self.trio(along_x(1600.0))?;
        world.add_relay("strong", along_x(800.0), RADIUS);
        world.add_relay("weak", Vector3::new(800.0, 500.0, 0.0), RADIUS);
        let disagreements = engine_disagreements(&world, 1e-9);
        
        let hop = radio_quality(800.0 * 800.0, RADIUS);
        let strong = hop * hop;
        let weak_hop = radio_quality(800.0 * 800.0 + 500.0 * 500.0, RADIUS);
        debug!("Parallel paths: strong {:.6}, weak {:.6}", strong, weak_hop * weak_hop);
        
        let mut harness = self.harness(world);
        harness.run_for(Duration::from_secs(1));
        let check = expect_quality(&harness, 2, 1, strong.sqrt()).and_then(|_| match disagreements {
            0 => Ok(()),
            n => Err(format!("engines disagree on {} targets", n)),
        });
        Ok(Outcome { disagreements, ..Outcome::new(harness, check) })
    }
    
    /// The only edge toward the target sits exactly at the radius.
    fn run_zero_edge(&self) -> Result<Outcome, WorldError> {
        let mut world = self.trio(along_x(1500.0))?;
        world.add_relay("edge", along_x(RADIUS), RADIUS);
        
        let mut harness = self.harness(world);
        harness.run_for(Duration::from_secs(1));
        let check = expect_quality(&harness, 2, 1, 0.0).and_then(|_| expect_quality(&harness, 1, 2, 0.0));
        Ok(Outcome::new(harness, check))
    }
    
    /// With four character targets the search stops after the
    /// source and two others; the weakest reachable agent stays at zero.
    fn run_early_exit(&self) -> Result<Outcome, WorldError> {
        let mut world = SimWorld::new(DEFAULT_MARKER_TAG);
        world.add_character(1, "source", Vector3::zeros(), RADIUS)?;
        world.add_character(2, "near", along_x(300.0), RADIUS)?;
        world.add_character(3, "middle", Vector3::new(0.0, 600.0, 0.0), RADIUS)?;
        world.add_character(4, "far", along_x(-800.0), RADIUS)?;
        
        let mut harness = self.harness(world);
        harness.run_for(Duration::from_secs(1));
        
        let far = radio_quality(800.0 * 800.0, RADIUS).sqrt();
        let check = expect_quality(&harness, 2, 1, radio_quality(300.0 * 300.0, RADIUS).sqrt())
            .and_then(|_| expect_quality(&harness, 3, 1, radio_quality(600.0 * 600.0, RADIUS).sqrt()))
            .and_then(|_| match self.algorithm {
                Algorithm::BestPath => expect_quality(&harness, 4, 1, 0.0),
                Algorithm::WalkNetwork => expect_quality(&harness, 4, 1, far),
            });
        Ok(Outcome::new(harness, check))
    }
    
    /// 20 s at 100 ms steps.
    fn run_heartbeat(&self) -> Result<Outcome, WorldError> {
        let world = self.trio(along_x(500.0))?;
        let mut harness = Harness::new(world, self.algorithm, Duration::from_millis(100), self.seed)
            .recording(self.record);
        harness.run_for(Duration::from_secs(20));
        
        let stats = harness.emitter().stats();
        let check = if stats.heartbeats != 4 {
            Err(format!("expected 4 heartbeats, got {}", stats.heartbeats))
        } else if stats.compute_ticks != 40 {
            Err(format!("expected 40 compute ticks, got {}", stats.compute_ticks))
        } else {
            Ok(())
        };
        Ok(Outcome::new(harness, check))
    }
    
    fn mesh_packets(&self) -> Result<(Harness, Vec<Packet>), WorldError> {
        let (world, _) = generate(&self.scene, DEFAULT_MARKER_TAG)?;
        let mut harness = self.harness(world);
        let packets = harness.run_for(Duration::from_secs_f64(self.duration_secs.max(0.0)));
        Ok((harness, packets))
    }
    
    /// Seeded moving scene; qualities stay in range and a rerun
    /// with the same seed emits the same byte stream.
    fn run_mesh(&self) -> Result<Outcome, WorldError> {
        let (harness, packets) = self.mesh_packets()?;
        let (_, replay) = self.mesh_packets()?;
        let disagreements = engine_disagreements(harness.emitter().world(), 1e-9);
        
        let out_of_range = packets.iter().find(|p| match p {
            Packet::Quality { quality, .. } => !(0.0..=1.0).contains(quality),
            Packet::Heartbeat => false,
        });
        let expected_heartbeats = ((harness.time_secs() + 1e-9) / 5.0).floor() as u64;
        let heartbeats = harness.emitter().stats().heartbeats;
        
        let check = if let Some(packet) = out_of_range {
            Err(format!("quality out of range: {:?}", packet))
        } else if packets != replay {
            Err("same seed produced a different packet stream".to_string())
        } else if heartbeats != expected_heartbeats {
            Err(format!("expected {} heartbeats, got {}", expected_heartbeats, heartbeats))
        } else {
            Ok(())
        };
        Ok(Outcome { disagreements, ..Outcome::new(harness, check) })
    }
    
    /// A marker behind a beacon gets the relay hop's quality.
    fn run_beacon_relay(&self) -> Result<Outcome, WorldError> {
        let mut world = self.trio(along_x(-50_000.0))?;
        world.add_relay("hop", along_x(500.0), RADIUS);
        let sensor = world.add_structure(&format!("sensor {}", DEFAULT_MARKER_TAG), along_x(3000.0));
        world.add_endpoint(sensor, EndpointSpec::Beacon { range: 2600.0 })?;
        
        let mut harness = self.harness(world);
        harness.run_for(Duration::from_secs(1));
        
        let hop = radio_quality(500.0 * 500.0, RADIUS);
        let check = if harness.emitter().markers().contains(sensor) {
            expect_quality(&harness, sensor.raw(), 1, hop.sqrt())
        } else {
            Err(format!("marker {} never discovered", sensor))
        };
        Ok(Outcome::new(harness, check))
    }
    
    /// Marker packets stop while the tag is gone and come back.
    fn run_marker_churn(&self) -> Result<Outcome, WorldError> {
        let mut world = self.trio(along_x(-50_000.0))?;
        let label = format!("sensor {}", DEFAULT_MARKER_TAG);
        let sensor = world.add_relay(&label, along_x(400.0), RADIUS);
        let mut harness = self.harness(world);
        
        let mentions = |packets: &[Packet], marker: NodeId| {
            packets
                .iter()
                .filter(|p| matches!(p, Packet::Quality { from, .. } if *from == marker.raw()))
                .count()
        };
        
        let tagged = harness.run_for(Duration::from_secs(2));
        harness.world_mut().relabel(sensor, "sensor")?;
        let untagged = harness.run_for(Duration::from_secs(2));
        harness.world_mut().relabel(sensor, &label)?;
        let retagged = harness.run_for(Duration::from_secs(2));
        
        let check = match (mentions(&tagged, sensor), mentions(&untagged, sensor), mentions(&retagged, sensor)) {
            (0, _, _) => Err("marker never reported while tagged".to_string()),
            (_, n, _) if n > 0 => Err(format!("{} marker packets while untagged", n)),
            (_, _, 0) => Err("marker not reported after retagging".to_string()),
            _ => expect_quality(&harness, sensor.raw(), 1, radio_quality(400.0 * 400.0, RADIUS).sqrt()),
        };
        Ok(Outcome::new(harness, check))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commlink_core::DiscoveryAdapter;
    use commlink_env::IdentityId;
    use proptest::prelude::*;
    
    fn run_all(algorithm: Algorithm) {
        for scenario in ScenarioId::all() {
            let result = ScenarioRunner::new(42)
                .with_algorithm(algorithm)
                .with_duration(6.0)
                .run(scenario);
            assert!(
                result.passed,
                "{} under {} failed: {:?}",
                scenario,
                algorithm,
                result.failure_reason
            );
        }
    }
    
    #[test]
    fn test_all_scenarios_pass_best_path() {
        run_all(Algorithm::BestPath);
    }
    
    #[test]
    fn test_all_scenarios_pass_walk_network() {
        run_all(Algorithm::WalkNetwork);
    }
    
    #[test]
    fn test_heartbeat_metrics() {
        let result = ScenarioRunner::new(7).run(ScenarioId::Heartbeat);
        assert!(result.passed);
        assert_eq!(result.metrics.heartbeats, 4);
        assert_eq!(result.metrics.compute_ticks, 40);
        assert_eq!(result.total_ticks, 200);
        assert!((result.final_time_secs - 20.0).abs() < 1e-9);
    }
    
    #[test]
    fn test_beacon_relay_tracks_marker() {
        let result = ScenarioRunner::new(1).run(ScenarioId::BeaconRelay);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.markers_tracked, 1);
    }
    
    #[test]
    fn test_recorded_run_exports_frames() {
        let (result, export) = ScenarioRunner::new(3)
            .with_frames(true)
            .run_recorded(ScenarioId::DirectLink);
        assert!(result.passed);
        assert_eq!(export.scenario, "direct_link");
        assert!(!export.frames.is_empty());
        assert!(export.frames.iter().all(|f| !f.positions.is_empty()));
    }
    
    #[test]
    fn test_harness_tracks_latest_quality() {
        let mut world = SimWorld::new(DEFAULT_MARKER_TAG);
        world.add_character(1, "a", Vector3::zeros(), RADIUS).unwrap();
        world.add_character(2, "b", along_x(500.0), RADIUS).unwrap();
        world.add_character(3, "c", along_x(-40_000.0), RADIUS).unwrap();
        
        let mut harness = Harness::new(world, Algorithm::BestPath, Duration::from_millis(100), 0);
        assert!(harness.latest(2, 1).is_none());
        
        harness.run_for(Duration::from_millis(500));
        let expected = radio_quality(500.0 * 500.0, RADIUS).sqrt();
        assert!((harness.latest(2, 1).unwrap() as f64 - expected).abs() < 1e-6);
        
        // Moving apart drops the link to zero on the next compute.
        harness.world_mut().set_position(NodeId(2), along_x(5000.0)).unwrap();
        harness.run_for(Duration::from_millis(500));
        assert_eq!(harness.latest(2, 1), Some(0.0));
    }
    
    #[test]
    fn test_offline_transport_counts_failures() {
        let world = ScenarioRunner::new(0).trio(along_x(500.0)).unwrap();
        let mut harness = Harness::new(world, Algorithm::BestPath, Duration::from_millis(100), 0);
        harness.transport().set_offline(true);
        harness.run_for(Duration::from_secs(1));
        
        let metrics = harness.metrics();
        assert_eq!(metrics.quality_packets, 0);
        assert!(metrics.send_failures > 0);
        assert_eq!(harness.transport().rejected(), metrics.send_failures);
    }
    
    #[test]
    fn test_setup_error_fails_the_run() {
        let runner = ScenarioRunner::new(5);
        let (result, export) = runner.conclude(
            ScenarioId::MarkerChurn,
            Err(WorldError::UnknownEntity(NodeId(99))),
        );
        
        assert!(!result.passed);
        assert_eq!(result.failure_reason.as_deref(), Some("setup failed: Unknown entity 99"));
        assert_eq!(result.total_ticks, 0);
        assert!(!export.passed);
    }
    
    #[test]
    fn test_engines_agree_on_relay_chain() {
        let mut world = ScenarioRunner::new(0).trio(along_x(2400.0)).unwrap();
        world.add_relay("r1", along_x(800.0), RADIUS);
        world.add_relay("r2", along_x(1600.0), RADIUS);
        assert_eq!(engine_disagreements(&world, 1e-9), 0);
    }
    
    /// Widest path by exhaustive search over simple paths between characters
    /// and relays.
    fn brute_force_best(world: &SimWorld, source: NodeId, target: NodeId) -> f64 {
        fn neighbors(world: &SimWorld, node: NodeId) -> Vec<(NodeId, f64)> {
            let mut out = Vec::new();
            for receiver in world.receivers_of(node, IdentityId(0)) {
                for broadcaster in world.broadcasters_in_range(&receiver) {
                    let q = commlink_core::link_quality(&broadcaster, &receiver);
                    out.push((world.canonical_relay(broadcaster.owner), q));
                }
            }
            out
        }
        
        fn walk(world: &SimWorld, node: NodeId, target: NodeId, q: f64, seen: &mut Vec<NodeId>) -> f64 {
            if node == target {
                return q;
            }
            let mut best = 0.0f64;
            for (next, edge) in neighbors(world, node) {
                if edge <= 0.0 || seen.contains(&next) || (world.live_agent(next) && next != target) {
                    continue;
                }
                seen.push(next);
                best = best.max(walk(world, next, target, q * edge, seen));
                seen.pop();
            }
            best
        }
        
        walk(world, source, target, 1.0, &mut vec![source])
    }
    
    fn small_scene(relays: &[(f64, f64)], target: (f64, f64)) -> (SimWorld, NodeId, NodeId) {
        let mut world = SimWorld::new(DEFAULT_MARKER_TAG);
        let s = world.add_character(1, "s", Vector3::zeros(), RADIUS).unwrap();
        let t = world
            .add_character(2, "t", Vector3::new(target.0, target.1, 0.0), RADIUS)
            .unwrap();
        for (i, (x, y)) in relays.iter().enumerate() {
            world.add_relay(&format!("r{}", i), Vector3::new(*x, *y, 0.0), RADIUS);
        }
        (world, s, t)
    }
    
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]
        
        #[test]
        fn prop_best_path_finds_widest_path(
            relays in prop::collection::vec((-2000.0f64..2000.0, -2000.0f64..2000.0), 0..5),
            target in (-2500.0f64..2500.0, -2500.0f64..2500.0),
        ) {
            let (world, s, t) = small_scene(&relays, target);
            let targets: TargetSet = [t].into_iter().collect();
            let request = SearchRequest::new(s, IdentityId(0), &targets);
            let results = best_path(&world, &request, &mut SearchContext::new(), &mut MarkerRegistry::new());
            
            let expected = brute_force_best(&world, s, t);
            let found = results.get(&t).copied().unwrap_or(0.0);
            prop_assert!((found - expected).abs() < 1e-9, "found {} expected {}", found, expected);
        }
        
        #[test]
        fn prop_quality_packets_stay_in_unit_range(seed in 0u64..1000) {
            let scene = SceneConfig::default().with_agents(4);
            let (world, _) = generate(&scene.with_seed(seed), DEFAULT_MARKER_TAG).unwrap();
            let mut harness = Harness::new(world, Algorithm::BestPath, Duration::from_millis(250), seed);
            for packet in harness.run_for(Duration::from_secs(2)) {
                if let Packet::Quality { quality, .. } = packet {
                    prop_assert!((0.0..=1.0).contains(&quality));
                }
            }
        }
    }
    
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(4))]
        
        #[test]
        fn prop_mesh_is_deterministic(seed in 0u64..10_000) {
            let runner = ScenarioRunner::new(seed).with_duration(3.0);
            let a = runner.run(ScenarioId::Mesh);
            let b = runner.run(ScenarioId::Mesh);
            prop_assert!(a.passed, "{:?}", a.failure_reason);
            prop_assert_eq!(a.metrics.quality_packets, b.metrics.quality_packets);
            prop_assert_eq!(a.metrics.engine_disagreements, b.metrics.engine_disagreements);
        }
    }
}
