//! commlink simulator CLI
//!
//! Runs the deterministic signal scenarios, or serves a generated scene to
//! TCP listeners.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use commlink_core::Algorithm;
use commlink_sim::scenarios::ScenarioId;
use commlink_sim::{serve, SceneConfig, ScenarioResult, ScenarioRunner, ServeOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// commlink signal simulator
#[derive(Parser, Debug)]
#[command(name = "commlink-sim", version)]
#[command(about = "Deterministic signal-quality scenarios and a live demo server", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
    
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scenarios and report pass/fail.
    Run {
        /// Master seed for determinism (0 = random from time)
        #[arg(short, long, default_value = "42")]
        seed: u64,
        
        /// Scenario to run (direct_link, parallel_paths, zero_edge, early_exit,
        /// heartbeat, mesh, beacon_relay, marker_churn, all)
        #[arg(short = 'S', long, default_value = "all")]
        scenario: String,
        
        /// Number of consecutive seeds to test
        #[arg(long, default_value = "1")]
        seeds: usize,
        
        /// Duration of open-ended scenarios in seconds
        #[arg(short, long, default_value = "10")]
        duration: f64,
        
        /// Search engine (best_path, walk_network, both)
        #[arg(short, long, default_value = "both")]
        algorithm: String,
        
        /// Simulation step in milliseconds
        #[arg(long, default_value = "100")]
        step_ms: u64,
        
        /// JSON output for CI parsing
        #[arg(long)]
        json: bool,
        
        /// Export quality frames of a single scenario to a JSON file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Serve a generated scene to TCP listeners; queries are read from stdin.
    Serve {
        /// Config file, created with defaults when missing
        #[arg(short, long, default_value = "commlink.json")]
        config: PathBuf,
        
        /// Scene seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        
        /// Number of agents in the scene
        #[arg(short, long, default_value = "6")]
        agents: usize,
        
        /// World step in milliseconds
        #[arg(long, default_value = "50")]
        tick_ms: u64,
    },
}

fn parse_algorithms(text: &str) -> Result<Vec<Algorithm>> {
    if text == "both" {
        return Ok(vec![Algorithm::BestPath, Algorithm::WalkNetwork]);
    }
    let algorithm = text
        .parse::<Algorithm>()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(vec![algorithm])
}

fn parse_scenarios(text: &str) -> Result<Vec<ScenarioId>> {
    if text == "all" {
        return Ok(ScenarioId::all());
    }
    let scenario = text.parse::<ScenarioId>().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(vec![scenario])
}

#[allow(clippy::too_many_arguments)]
fn run_scenarios(
    seed: u64,
    scenario: &str,
    seeds: usize,
    duration: f64,
    algorithm: &str,
    step_ms: u64,
    json: bool,
    export: Option<PathBuf>,
) -> Result<bool> {
    let scenarios = parse_scenarios(scenario)?;
    let algorithms = parse_algorithms(algorithm)?;
    
    let base_seed = if seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("system clock before epoch")?
            .as_nanos() as u64
    } else {
        seed
    };
    
    if !json {
        info!("commlink simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    
    if let Some(path) = export {
        if scenarios.len() != 1 || algorithms.len() != 1 {
            bail!("--export needs a single scenario and a single algorithm");
        }
        let (result, export) = ScenarioRunner::new(base_seed)
            .with_algorithm(algorithms[0])
            .with_duration(duration)
            .with_step(Duration::from_millis(step_ms.max(1)))
            .with_frames(true)
            .run_recorded(scenarios[0]);
        export
            .write_to_file(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Exported {} frames to {}", export.frames.len(), path.display());
        report(&result);
        return Ok(result.passed);
    }
    
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        for algorithm in &algorithms {
            let runner = ScenarioRunner::new(seed)
                .with_algorithm(*algorithm)
                .with_duration(duration)
                .with_step(Duration::from_millis(step_ms.max(1)));
            for scenario in &scenarios {
                let result = runner.run(*scenario);
                if !json {
                    report(&result);
                }
                all_results.push(result);
            }
        }
    }
    
    let total = all_results.len();
    let failed = all_results.iter().filter(|r| !r.passed).count();
    
    if json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "algorithm": r.algorithm.name(),
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                    "quality_packets": r.metrics.quality_packets,
                    "heartbeats": r.metrics.heartbeats,
                    "markers": r.metrics.markers_tracked,
                    "avg_tick_ms": r.metrics.avg_tick_ms,
                    "max_tick_ms": r.metrics.max_tick_ms,
                    "engine_disagreements": r.metrics.engine_disagreements,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("All {} scenario runs passed", total);
        } else {
            error!("{}/{} scenario runs failed", failed, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} [{}] seed={}: {}",
                    result.scenario.name(),
                    result.algorithm,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }
    
    Ok(failed == 0)
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} [{}] (seed={}) PASSED - {} packets, avg tick {:.3}ms",
            result.scenario.name(),
            result.algorithm,
            result.seed,
            result.metrics.quality_packets,
            result.metrics.avg_tick_ms
        );
    } else {
        error!(
            "✗ {} [{}] (seed={}) FAILED: {}",
            result.scenario.name(),
            result.algorithm,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
    
    match cli.command {
        Command::Run {
            seed,
            scenario,
            seeds,
            duration,
            algorithm,
            step_ms,
            json,
            export,
        } => {
            let passed = run_scenarios(seed, &scenario, seeds, duration, &algorithm, step_ms, json, export)?;
            if !passed {
                std::process::exit(1);
            }
        }
        Command::Serve {
            config,
            seed,
            agents,
            tick_ms,
        } => {
            let options = ServeOptions {
                config_path: config,
                scene: SceneConfig::default().with_seed(seed).with_agents(agents),
                tick: Duration::from_millis(tick_ms.max(1)),
            };
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(serve(options))?;
        }
    }
    Ok(())
}
