//! Named simulation scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SIG-001: one direct radio link of known quality
    DirectLink,
    
    /// SIG-002: two relay paths, the wider product must win
    ParallelPaths,
    
    /// SIG-003: a zero-quality edge is pruned
    ZeroEdge,
    
    /// SIG-004: search stops one result short of the target count
    EarlyExit,
    
    /// SIG-005: heartbeat and compute timers fire independently
    Heartbeat,
    
    /// SIG-006: seeded moving scene, both engines, determinism
    Mesh,
    
    /// SIG-007: a beacon passes quality through without a hop
    BeaconRelay,
    
    /// SIG-008: markers appear, vanish and return with their tag
    MarkerChurn,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::DirectLink,
            ScenarioId::ParallelPaths,
            ScenarioId::ZeroEdge,
            ScenarioId::EarlyExit,
            ScenarioId::Heartbeat,
            ScenarioId::Mesh,
            ScenarioId::BeaconRelay,
            ScenarioId::MarkerChurn,
        ]
    }
    
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::DirectLink => "direct_link",
            ScenarioId::ParallelPaths => "parallel_paths",
            ScenarioId::ZeroEdge => "zero_edge",
            ScenarioId::EarlyExit => "early_exit",
            ScenarioId::Heartbeat => "heartbeat",
            ScenarioId::Mesh => "mesh",
            ScenarioId::BeaconRelay => "beacon_relay",
            ScenarioId::MarkerChurn => "marker_churn",
        }
    }
    
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::DirectLink => "Two agents on one radio link of quality 0.81",
            ScenarioId::ParallelPaths => "Weak and strong relay paths between two agents",
            ScenarioId::ZeroEdge => "Target only reachable over an edge at exactly the radio radius",
            ScenarioId::EarlyExit => "Three reachable agents, the weakest left unresolved",
            ScenarioId::Heartbeat => "20 s at 100 ms steps: 4 heartbeats, 40 compute ticks",
            ScenarioId::Mesh => "Seeded scene with moving agents, relay groups, beacons and lasers",
            ScenarioId::BeaconRelay => "Marker heard only through a beacon behind a relay",
            ScenarioId::MarkerChurn => "Marker loses and regains its diagnostic tag",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct_link" | "directlink" | "sig-001" => Ok(ScenarioId::DirectLink),
            "parallel_paths" | "parallelpaths" | "sig-002" => Ok(ScenarioId::ParallelPaths),
            "zero_edge" | "zeroedge" | "sig-003" => Ok(ScenarioId::ZeroEdge),
            "early_exit" | "earlyexit" | "sig-004" => Ok(ScenarioId::EarlyExit),
            "heartbeat" | "sig-005" => Ok(ScenarioId::Heartbeat),
            "mesh" | "sig-006" => Ok(ScenarioId::Mesh),
            "beacon_relay" | "beaconrelay" | "sig-007" => Ok(ScenarioId::BeaconRelay),
            "marker_churn" | "markerchurn" | "sig-008" => Ok(ScenarioId::MarkerChurn),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
