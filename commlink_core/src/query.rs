//! Chat-style query surface onto a running emitter.
//!
//! Commands are answered with plain text. Failures are rendered into the
//! reply too, so a bad query never reaches the scheduler.

use crate::discovery::{DiscoveryAdapter, WorldView};
use crate::emitter::SignalEmitter;
use crate::node::OnlineAgent;
use crate::search::ResultMap;
use commlink_env::{BroadcastTransport, NodeId};
use std::fmt::Write as _;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown command '{0}'. Try strength, performance, switch, debug or ship.")]
    UnknownCommand(String),
    
    #[error("This command needs an agent; the console has no position.")]
    ConsoleCaller,
    
    #[error("Agent {0} is not online")]
    UnknownAgent(u64),
    
    #[error("Agent {0} has no physical presence")]
    NotEmbodied(u64),
}

/// A parsed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fresh verbose search for the caller, listed per target
    Strength,
    /// Timing stats over the recorded compute ticks
    Performance,
    /// Flip the active engine
    Switch,
    /// Tracked markers and their distance from the caller
    Debug,
    /// Labels of the caller's own broadcasters
    Ship,
}

impl FromStr for Command {
    type Err = QueryError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().trim_start_matches('!').to_lowercase();
        match word.as_str() {
            "strength" => Ok(Command::Strength),
            "performance" | "perf" => Ok(Command::Performance),
            "switch" => Ok(Command::Switch),
            "debug" => Ok(Command::Debug),
            "ship" => Ok(Command::Ship),
            _ => Err(QueryError::UnknownCommand(s.trim().to_string())),
        }
    }
}

/// Who issued a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Console,
    Agent(u64),
}

impl<W, T> SignalEmitter<W, T>
where
    W: DiscoveryAdapter + WorldView,
    T: BroadcastTransport,
{
    /// Parses and runs `text`; always answers.
    pub fn handle_command(&mut self, caller: Caller, text: &str) -> String {
        let outcome = text.parse::<Command>().and_then(|command| {
            info!("Query {:?} from {:?}", command, caller);
            self.execute(caller, command)
        });
        match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Query '{}' from {:?} failed: {}", text.trim(), caller, e);
                e.to_string()
            }
        }
    }
    
    pub fn execute(&mut self, caller: Caller, command: Command) -> Result<String, QueryError> {
        match command {
            Command::Performance => Ok(match self.performance().stats() {
                Some(stats) => stats.to_string(),
                None => "No update cycles recorded yet.".to_string(),
            }),
            Command::Switch => {
                let algorithm = self.toggle_algorithm();
                Ok(format!("Now using the {} method.", algorithm))
            }
            Command::Strength => {
                let agent = self.embodied_caller(caller)?;
                Ok(self.strength(&agent))
            }
            Command::Debug => {
                let agent = self.embodied_caller(caller)?;
                Ok(self.debug_markers(&agent))
            }
            Command::Ship => {
                let agent = self.embodied_caller(caller)?;
                Ok(self.ship(&agent))
            }
        }
    }
    
    fn embodied_caller(&self, caller: Caller) -> Result<OnlineAgent, QueryError> {
        let Caller::Agent(agent_id) = caller else {
            return Err(QueryError::ConsoleCaller);
        };
        let agent = self
            .world()
            .online_agent(agent_id)
            .ok_or(QueryError::UnknownAgent(agent_id))?;
        if !agent.is_embodied() {
            return Err(QueryError::NotEmbodied(agent_id));
        }
        Ok(agent)
    }
    
    /// Scan, search verbosely, broadcast and cache, then list the result.
    fn strength(&mut self, agent: &OnlineAgent) -> String {
        let Some(character) = agent.character else {
            return QueryError::NotEmbodied(agent.agent_id).to_string();
        };
        
        self.scan_markers(character, agent.identity);
        
        let agents = self.world().online_agents();
        let targets = self.targets_for(&agents);
        let results = self.run_search(agent, &targets, true).unwrap_or_default();
        self.emit_results(agent, &agents, &results);
        let reply = self.render_strengths(&results);
        self.cache_result(agent.agent_id, results);
        reply
    }
    
    fn render_strengths(&self, results: &ResultMap) -> String {
        let mut ids: Vec<NodeId> = results.keys().copied().collect();
        ids.sort();
        let mut reply = String::from("Your current signals:\n");
        for id in ids {
            let label = self
                .world()
                .node_info(id)
                .map(|info| info.label)
                .unwrap_or_else(|| "No Entity Found".to_string());
            let _ = writeln!(reply, "[{}] {}: {:.2}%", id, label, results[&id] * 100.0);
        }
        reply
    }
    
    fn debug_markers(&self, agent: &OnlineAgent) -> String {
        let origin = agent
            .character
            .and_then(|c| self.world().node_info(c))
            .map(|info| info.position);
        let mut reply = String::from("Current Debug Markers:\n");
        for marker in self.markers().iter() {
            let Some(info) = self.world().node_info(marker) else {
                continue;
            };
            match origin {
                Some(origin) => {
                    let distance = (info.position - origin).norm();
                    let _ = writeln!(reply, "{} - {:.3}m", info.label, distance);
                }
                None => {
                    let _ = writeln!(reply, "{}", info.label);
                }
            }
        }
        reply
    }
    
    fn ship(&self, agent: &OnlineAgent) -> String {
        let Some(character) = agent.character else {
            return QueryError::NotEmbodied(agent.agent_id).to_string();
        };
        let mut reply = String::new();
        for broadcaster in self.world().broadcasters_of(character, agent.identity) {
            let _ = writeln!(reply, "{}", broadcaster.label);
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EmitterSettings;
    use crate::search::Algorithm;
    use crate::test_support::{GraphFixture, RecordingTransport};
    use std::sync::Arc;
    
    type TestEmitter = SignalEmitter<GraphFixture, Arc<RecordingTransport>>;
    
    fn station() -> (TestEmitter, Arc<RecordingTransport>) {
        let mut world = GraphFixture::new();
        let a = world.agent(1, 100);
        let b = world.agent(2, 200);
        world.agent(3, 400);
        world.ghost_agent(4);
        let relay = world.relay(250);
        let sensor = world.marker(300);
        world.link(a, b, 0.81);
        world.link(a, relay, 0.5);
        world.link(relay, sensor, 1.0);
        world.link(b, a, 0.5);
        
        let transport = Arc::new(RecordingTransport::default());
        let emitter = SignalEmitter::new(world, transport.clone(), EmitterSettings::default());
        (emitter, transport)
    }
    
    #[test]
    fn test_parse_commands() {
        assert_eq!("strength".parse::<Command>(), Ok(Command::Strength));
        assert_eq!(" !Switch ".parse::<Command>(), Ok(Command::Switch));
        assert_eq!("perf".parse::<Command>(), Ok(Command::Performance));
        assert_eq!(
            "teleport".parse::<Command>(),
            Err(QueryError::UnknownCommand("teleport".to_string()))
        );
    }
    
    #[test]
    fn test_strength_scans_searches_and_caches() {
        let (mut emitter, transport) = station();
        
        let reply = emitter.handle_command(Caller::Agent(1), "strength");
        
        assert!(reply.starts_with("Your current signals:\n"));
        assert!(reply.contains("[200] agent-2: 81.00%"));
        assert!(reply.contains("[300] sensor-300 [DEBUG RADIO]: 50.00%"));
        assert!(emitter.markers().contains(NodeId(300)));
        assert_eq!(emitter.last_result(1).map(|r| r.len()), Some(3));
        assert!(!transport.frames().is_empty());
    }
    
    #[test]
    fn test_caller_bound_commands_refuse_console_and_ghosts() {
        let (mut emitter, _) = station();
        
        for text in ["strength", "debug", "ship"] {
            let reply = emitter.handle_command(Caller::Console, text);
            assert_eq!(reply, QueryError::ConsoleCaller.to_string());
        }
        assert_eq!(
            emitter.handle_command(Caller::Agent(4), "ship"),
            "Agent 4 has no physical presence"
        );
        assert_eq!(
            emitter.handle_command(Caller::Agent(99), "debug"),
            "Agent 99 is not online"
        );
    }
    
    #[test]
    fn test_switch_toggles_engine() {
        let (mut emitter, _) = station();
        
        assert_eq!(emitter.handle_command(Caller::Console, "switch"), "Now using the walk_network method.");
        assert_eq!(emitter.algorithm(), Algorithm::WalkNetwork);
        assert_eq!(emitter.handle_command(Caller::Agent(1), "switch"), "Now using the best_path method.");
    }
    
    #[test]
    fn test_performance_reports_recorded_ticks() {
        let (mut emitter, _) = station();
        
        assert_eq!(emitter.handle_command(Caller::Console, "performance"), "No update cycles recorded yet.");
        emitter.compute_tick();
        emitter.compute_tick();
        let reply = emitter.handle_command(Caller::Console, "performance");
        assert!(reply.starts_with("Stats for the past 2 update cycles:"));
    }
    
    #[test]
    fn test_debug_lists_markers_with_distance() {
        let (mut emitter, _) = station();
        emitter.handle_command(Caller::Agent(1), "strength");
        
        let reply = emitter.handle_command(Caller::Agent(1), "debug");
        assert!(reply.starts_with("Current Debug Markers:\n"));
        assert!(reply.contains("sensor-300 [DEBUG RADIO] - 0.000m"));
    }
    
    #[test]
    fn test_ship_lists_own_broadcasters() {
        let (mut emitter, _) = station();
        assert_eq!(emitter.handle_command(Caller::Agent(1), "ship"), "antenna\n");
    }
    
    #[test]
    fn test_unknown_command_is_answered() {
        let (mut emitter, _) = station();
        let reply = emitter.handle_command(Caller::Agent(1), "launch");
        assert!(reply.starts_with("Unknown command 'launch'"));
    }
}
