//! Command handlers for the `gcode-sim` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use notify::{Config as WatchConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::channel::Synchronizer;
use crate::config::{Command, Config, MachineConfig};
use crate::dialect::{DialectRegistry, MILL_DIALECT};
use crate::interpreter::{PositionRecord, interpret};
use crate::simulation::{SimEvent, Simulation, coalesce};
use crate::validation::{Severity, verify_program};

/// Dispatch the parsed subcommand
pub async fn run(config: Config) -> Result<()> {
    match &config.machine_path {
        Some(path) => log::info!("Using machine config {}", path.display()),
        None => log::info!("Using built-in machine defaults"),
    }

    match config.command.clone() {
        Command::Run {
            program,
            json,
            tick_ms,
        } => run_program(&config, &program, json, tick_ms).await,
        Command::Check {
            program,
            dialect,
            json,
        } => check_program(&config, &program, dialect.as_deref(), json).await,
        Command::Watch {
            program,
            debounce_ms,
        } => watch_program(&config, &program, Duration::from_millis(debounce_ms)).await,
        Command::Dual {
            first,
            second,
            max_ticks,
        } => run_dual(&config, &first, &second, max_ticks).await,
    }
}

async fn read_program(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read program: {}", path.display()))
}

/// Interpret a program and set up a simulation for it
pub fn build_simulation(machine: &MachineConfig, program: &str) -> Result<Simulation> {
    let tool = machine.resolve_tool()?;
    let work_offsets = machine.work_offset_table();
    let tool_offsets = machine.tool_offset_table(&tool);
    let records = interpret(
        program,
        &mut machine.start_state(),
        &work_offsets,
        &tool_offsets,
    );
    let stock = machine.stock_model()?;
    Ok(Simulation::new(
        records,
        stock,
        tool,
        machine.simulation.clone(),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_records(records: &[PositionRecord]) -> Result<()> {
    for record in records {
        print_json(record)?;
    }
    Ok(())
}

async fn run_program(
    config: &Config,
    path: &Path,
    json: bool,
    tick_ms: Option<u64>,
) -> Result<()> {
    let program = read_program(path).await?;
    let mut machine = config.machine.clone();
    if let Some(tick_ms) = tick_ms {
        machine.simulation.tick_ms = tick_ms;
    }
    let mut sim = build_simulation(&machine, &program)?;

    if json {
        print_records(sim.records())?;
    }

    if tick_ms.is_some() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = sim.spawn(tx);
        while let Some(event) = rx.recv().await {
            print_json(&event)?;
            if matches!(event, SimEvent::Finished { .. }) {
                break;
            }
        }
        sim = handle.join().await?;
    } else {
        sim.run_to_end();
        if json {
            print_json(&sim.finished_event())?;
        }
    }

    if !json && tick_ms.is_none() {
        print_summary(path, &sim);
    }
    Ok(())
}

fn print_summary(path: &Path, sim: &Simulation) {
    let stock = sim.stock();
    let removed = stock.initial_occupied() - stock.occupied();
    let voxel = stock.grid().voxel_size();
    println!("{}", path.display());
    println!("  records:    {}", sim.records().len());
    println!(
        "  removed:    {} voxels ({:.1} mm³)",
        removed,
        removed as f64 * voxel * voxel * voxel
    );
    println!("  remaining:  {} of {}", stock.occupied(), stock.initial_occupied());
    println!("  collisions: {}", sim.collisions());
    println!("  surface:    {} triangles", sim.surface().triangle_count());
}

async fn load_dialects(config: &Config) -> Result<DialectRegistry> {
    let mut registry = DialectRegistry::with_embedded()?;
    for dir in &config.dialect_dirs {
        let loaded = registry.load_dialect_dir(dir).await?;
        if loaded > 0 {
            log::info!("Loaded {} dialect(s) from {}", loaded, dir.display());
        }
    }
    Ok(registry)
}

async fn check_program(
    config: &Config,
    path: &Path,
    dialect: Option<&str>,
    json: bool,
) -> Result<()> {
    let program = read_program(path).await?;
    let mut registry = load_dialects(config).await?;

    let requested = dialect
        .map(str::to_string)
        .or_else(|| registry.detect_modeline_dialect(&program))
        .or_else(|| config.machine.dialect.clone())
        .unwrap_or_else(|| MILL_DIALECT.to_string());
    if !registry.set_active(&requested) {
        log::warn!("Unknown dialect '{}', using '{}'", requested, MILL_DIALECT);
        registry.set_active(MILL_DIALECT);
    }

    let tool = config.machine.resolve_tool()?;
    let result = verify_program(&program, &registry, Some(&tool));

    if json {
        for diagnostic in &result.diagnostics {
            print_json(diagnostic)?;
        }
    } else {
        for d in &result.diagnostics {
            let label = match d.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "info",
            };
            println!("{}:{}: {}: {}", path.display(), d.line, label, d.message);
        }
    }

    let errors = result.count(Severity::Error);
    if errors > 0 {
        bail!("{} has {} error(s)", path.display(), errors);
    }
    Ok(())
}

async fn watch_program(config: &Config, path: &Path, window: Duration) -> Result<()> {
    let target: PathBuf = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve program path: {}", path.display()))?;
    let dir = target
        .parent()
        .context("Program path has no parent directory")?
        .to_path_buf();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watched = target.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let EventKind::Create(_) | EventKind::Modify(_) = event.kind {
                    if event.paths.iter().any(|p| p == &watched) {
                        let _ = tx.send(());
                    }
                }
            }
            Err(e) => log::warn!("Program watcher error: {}", e),
        },
        WatchConfig::default().with_poll_interval(Duration::from_secs(1)),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    log::info!("Watching {}", target.display());
    simulate_once(&config.machine, &target).await;

    while coalesce(&mut rx, window).await.is_some() {
        log::info!("{} changed, recomputing", target.display());
        simulate_once(&config.machine, &target).await;
    }
    Ok(())
}

/// One recompute for `watch`; failures are reported and the watch goes on
async fn simulate_once(machine: &MachineConfig, path: &Path) {
    let outcome = async {
        let program = read_program(path).await?;
        let mut sim = build_simulation(machine, &program)?;
        sim.run_to_end();
        Ok::<_, anyhow::Error>(sim)
    }
    .await;

    match outcome {
        Ok(sim) => print_summary(path, &sim),
        Err(e) => log::error!("{:#}", e),
    }
}

async fn run_dual(config: &Config, first: &Path, second: &Path, max_ticks: u64) -> Result<()> {
    let programs = [read_program(first).await?, read_program(second).await?];
    let machine = &config.machine;
    let tool = machine.resolve_tool()?;

    let mut sync = Synchronizer::with_modal(
        [programs[0].as_str(), programs[1].as_str()],
        [machine.start_state(), machine.start_state()],
        machine.work_offset_table(),
        machine.tool_offset_table(&tool),
    )?;
    let ticks = sync.run(max_ticks);

    for (index, channel) in sync.channels().iter().enumerate() {
        println!(
            "channel {}: {:?} at line {} of {}, {} records",
            index + 1,
            channel.state,
            channel.current_line(),
            channel.program.lines.len(),
            channel.records.len()
        );
    }
    println!("ticks: {}, rendezvous: {:?}", ticks, sync.sync_points());

    if !sync.is_done() {
        bail!("Channels still running after {} ticks", max_ticks);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_simulation_applies_machine_config() {
        let machine = MachineConfig::from_toml_str(
            r#"
[stock]
x = 60.0
y = 60.0
z = 20.0
voxel_size = 2.0

[[work_offsets]]
id = "G54"
z = 50.0
"#,
        )
        .unwrap();

        let mut sim = build_simulation(&machine, "G43 H1\nG1 X0 Y0 Z-4 F100").unwrap();
        // default assembly: BT40 65 + 35 stickout
        assert_eq!(sim.records()[1].effective[2], -4.0 + 50.0 + 100.0);
        sim.run_to_end();
        assert!(sim.stock().occupied() < sim.stock().initial_occupied());
    }
}
