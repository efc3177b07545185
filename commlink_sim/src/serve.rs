//! Live demo server: a generated scene broadcast over TCP.
//!
//! The scene moves on a fixed tick. Lines typed on stdin are queries, either
//! `<agent_id> <command>` or a bare command from the console.

use crate::scene::{generate, SceneConfig};
use crate::world::{SimWorld, WorldError};

use commlink_core::{Caller, ConfigStore, EmitterSettings, SignalEmitter, TickReport};
use commlink_env::{BroadcastTransport, EnvError, LinkContext, TcpBroadcaster, TokioContext, DEFAULT_LISTENER_BACKLOG};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error(transparent)]
    Env(#[from] EnvError),
    
    #[error("Scene could not be built: {0}")]
    Scene(#[from] WorldError),
    
    #[error("Console input failed: {0}")]
    Console(#[from] std::io::Error),
}

/// Settings for [`serve`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub config_path: PathBuf,
    pub scene: SceneConfig,
    /// World step and timer resolution
    pub tick: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("commlink.json"),
            scene: SceneConfig::default(),
            tick: Duration::from_millis(50),
        }
    }
}

/// Splits a console line into who is asking and the command text.
pub fn parse_console_line(line: &str) -> (Caller, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => match head.parse::<u64>() {
            Ok(agent_id) => (Caller::Agent(agent_id), rest.trim()),
            Err(_) => (Caller::Console, line),
        },
        None => (Caller::Console, line),
    }
}

/// Moves the world up to `context.now()` and runs whatever timers came due.
pub fn advance<C, T>(context: &C, emitter: &mut SignalEmitter<SimWorld, T>, last: &mut Duration) -> TickReport
where
    C: LinkContext,
    T: BroadcastTransport,
{
    let now = context.now();
    emitter.world_mut().step(now.saturating_sub(*last).as_secs_f64());
    *last = now;
    emitter.update(now)
}

/// Runs until interrupted.
pub async fn serve(options: ServeOptions) -> Result<(), ServeError> {
    let config = ConfigStore::new(options.config_path.clone()).load_or_create();
    let transport = TcpBroadcaster::bind(&config.listen_addr(), DEFAULT_LISTENER_BACKLOG).await?;
    
    let (world, layout) = generate(&options.scene, &config.marker_tag)?;
    info!(
        "Scene ready: {} agents, {} relays, {} markers (agent ids from {})",
        layout.characters.len(),
        layout.relays.len(),
        layout.markers.len(),
        layout.agent_ids.first().copied().unwrap_or_default()
    );
    
    let mut emitter: SignalEmitter<SimWorld, TcpBroadcaster> =
        SignalEmitter::new(world, transport, EmitterSettings::from(&config));
    info!("Using the {} method", emitter.algorithm());
    
    let context = TokioContext::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;
    let mut last = context.now();
    
    loop {
        tokio::select! {
            _ = context.sleep(options.tick) => {
                let report = advance(&context, &mut emitter, &mut last);
                if report.computed {
                    debug!(
                        "Tick at {:?}: {} searches, {} packets, {} listeners",
                        last,
                        report.searches,
                        report.packets,
                        emitter.transport().listener_count()
                    );
                }
            }
            line = lines.next_line(), if console_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let (caller, text) = parse_console_line(&line);
                        println!("{}", emitter.handle_command(caller, text));
                    }
                    None => {
                        info!("Console closed; still broadcasting");
                        console_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }
    
    let stats = emitter.stats();
    info!(
        "Sent {} quality packets and {} heartbeats ({} failures)",
        stats.quality_packets, stats.heartbeats, stats.send_failures
    );
    Ok(())
}
