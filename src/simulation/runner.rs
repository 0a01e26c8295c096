//! Tick-driven background runner.

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::simulation::{SimEvent, Simulation, interpolate};

/// Handle to a simulation stepping on a tokio task
#[derive(Debug)]
pub struct SimulationHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Simulation>,
}

impl SimulationHandle {
    /// Cancel the pending tick and frames, and take the simulation back
    pub async fn stop(self) -> Result<Simulation> {
        // Err only when the task already exited and dropped its receiver
        let _ = self.stop_tx.send(true);
        self.task.await.context("Simulation task panicked")
    }

    /// Wait for the simulation to run to the end
    pub async fn join(self) -> Result<Simulation> {
        let SimulationHandle { stop_tx, task } = self;
        let sim = task.await.context("Simulation task panicked")?;
        drop(stop_tx);
        Ok(sim)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Simulation {
    /// Move the simulation onto a tokio task, one step per tick
    ///
    /// Events go out over `events`; a closed receiver does not stop the run.
    pub fn spawn(self, events: mpsc::UnboundedSender<SimEvent>) -> SimulationHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run(self, events, stop_rx));
        SimulationHandle { stop_tx, task }
    }
}

async fn run(
    mut sim: Simulation,
    events: mpsc::UnboundedSender<SimEvent>,
    mut stop_rx: watch::Receiver<bool>,
) -> Simulation {
    let tick = sim.config().tick_interval();
    let frames = sim.config().interpolation_frames;
    let easing = sim.config().easing;
    let frame_gap = tick / frames.max(1);
    let mut ticker = tokio::time::interval(tick);
    // mesh already matches the stock after the last step's rebuild
    let mut surface_fresh = false;

    'ticks: loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                log::debug!("Simulation stopped at step {}", sim.cursor());
                break 'ticks;
            }
            _ = ticker.tick() => {
                let Some(outcome) = sim.step() else {
                    if !surface_fresh {
                        let triangles = sim.rebuild_surface();
                        let _ = events.send(SimEvent::SurfaceRebuilt { triangles });
                    }
                    let _ = events.send(sim.finished_event());
                    break 'ticks;
                };

                for event in outcome.events() {
                    let _ = events.send(event);
                }
                surface_fresh = match sim.maybe_rebuild() {
                    Some(triangles) => {
                        let _ = events.send(SimEvent::SurfaceRebuilt { triangles });
                        true
                    }
                    None => false,
                };

                if outcome.from == outcome.to {
                    continue;
                }
                for frame in interpolate(outcome.line, outcome.from, outcome.to, frames, easing) {
                    tokio::select! {
                        _ = stop_rx.changed() => {
                            log::debug!("Simulation stopped mid-move at step {}", sim.cursor());
                            break 'ticks;
                        }
                        _ = tokio::time::sleep(frame_gap) => {
                            let _ = events.send(SimEvent::Frame(frame));
                        }
                    }
                }
            }
        }
    }

    sim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::interpret;
    use crate::machine::{ModalState, ToolOffsetTable, WorkOffsetTable};
    use crate::simulation::SimulationConfig;
    use crate::stock::{StockDimensions, StockModel};
    use crate::tooling::ResolvedTool;

    fn simulation(program: &str, config: SimulationConfig) -> Simulation {
        let records = interpret(
            program,
            &mut ModalState::new(),
            &WorkOffsetTable::new(),
            &ToolOffsetTable::new(),
        );
        let stock = StockModel::new(StockDimensions::new(40.0, 40.0, 20.0), 2.0).unwrap();
        let tool = ResolvedTool {
            total_length: 80.0,
            diameter: 6.0,
            max_rpm: 10_000.0,
            cutting_length: 15.0,
        };
        Simulation::new(records, stock, tool, config)
    }

    #[tokio::test]
    async fn runs_to_completion_and_reports() {
        let config = SimulationConfig {
            tick_ms: 1,
            interpolation_frames: 2,
            ..SimulationConfig::default()
        };
        let sim = simulation("G0 X0 Y0 Z5\nG1 Z-4 F200\nG1 X10 F200", config);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sim = sim.spawn(tx).join().await.unwrap();
        assert!(sim.is_finished());

        let mut steps = 0;
        let mut frames = 0;
        let mut rebuilds = 0;
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SimEvent::Step { .. } => steps += 1,
                SimEvent::Frame(_) => frames += 1,
                SimEvent::SurfaceRebuilt { .. } => {
                    assert!(!finished);
                    rebuilds += 1;
                }
                SimEvent::Finished { steps: n, .. } => {
                    assert_eq!(n, 3);
                    finished = true;
                }
                _ => {}
            }
        }
        assert_eq!(steps, 3);
        // first record has no motion to animate
        assert_eq!(frames, 4);
        // three steps never reach the cadence, so only the last one rebuilds
        assert_eq!(rebuilds, 1);
        assert!(finished);
    }

    #[tokio::test]
    async fn empty_stream_still_reports_a_surface() {
        let config = SimulationConfig {
            tick_ms: 1,
            ..SimulationConfig::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        simulation("", config).spawn(tx).join().await.unwrap();

        let events: Vec<SimEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(events.as_slice(), [
            SimEvent::SurfaceRebuilt { triangles },
            SimEvent::Finished { steps: 0, .. },
        ] if *triangles > 0));
    }

    #[tokio::test]
    async fn stop_hands_back_a_resettable_simulation() {
        let config = SimulationConfig {
            tick_ms: 60_000,
            ..SimulationConfig::default()
        };
        let program = "G1 X0 Y0 Z-4 F100\nG1 X10 F100\nG1 X-10 F100";
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = simulation(program, config).spawn(tx);

        // first tick fires immediately, the second is a minute away
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut sim = handle.stop().await.unwrap();
        assert_eq!(sim.cursor(), 1);
        assert!(sim.stock().occupied() < sim.stock().initial_occupied());

        sim.reset();
        assert_eq!(sim.stock().occupied(), sim.stock().initial_occupied());
    }
}
