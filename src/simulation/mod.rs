//! Simulation runner
//!
//! Drives one position stream against the stock model a record at a time.
//! [`Simulation::step`] is synchronous; [`Simulation::spawn`] hands the
//! simulation to a tokio task that steps it on a fixed tick and streams
//! [`SimEvent`]s back.

pub mod debounce;
pub mod interpolate;
pub mod runner;

use std::time::Duration;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::interpreter::PositionRecord;
use crate::stock::{
    CollisionEvent, DEFAULT_MAX_CUTTING_FEED, RemovalResult, StockModel, SurfaceMesh,
};
use crate::tooling::ResolvedTool;

pub use debounce::{DEFAULT_WINDOW, coalesce};
pub use interpolate::{Easing, Frame, interpolate};
pub use runner::SimulationHandle;

/// Runner cadence and behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Milliseconds between steps when spawned
    pub tick_ms: u64,
    /// Display frames between consecutive records, 0 to disable
    pub interpolation_frames: u32,
    /// Rebuild the surface mesh every this many steps, 0 to only rebuild at the end
    pub rebuild_every: usize,
    pub stop_on_collision: bool,
    pub easing: Easing,
    pub max_cutting_feed: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            interpolation_frames: 0,
            rebuild_every: 25,
            stop_on_collision: false,
            easing: Easing::Linear,
            max_cutting_feed: DEFAULT_MAX_CUTTING_FEED,
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// What one step did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Index into the record stream
    pub index: usize,
    pub line: usize,
    pub from: DVec3,
    pub to: DVec3,
    pub rapid: bool,
    pub removal: RemovalResult,
    pub collision: CollisionEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    Step {
        index: usize,
        line: usize,
        position: DVec3,
        rapid: bool,
    },
    Frame(Frame),
    Removal {
        line: usize,
        result: RemovalResult,
    },
    Collision {
        line: usize,
        collision: CollisionEvent,
    },
    SurfaceRebuilt {
        triangles: usize,
    },
    Finished {
        steps: usize,
        collisions: usize,
        voxels_removed: usize,
    },
}

impl StepOutcome {
    /// Events describing this step, in emission order
    pub fn events(&self) -> Vec<SimEvent> {
        let mut events = vec![SimEvent::Step {
            index: self.index,
            line: self.line,
            position: self.to,
            rapid: self.rapid,
        }];
        if self.removal.voxels_removed > 0 {
            events.push(SimEvent::Removal {
                line: self.line,
                result: self.removal,
            });
        }
        if self.collision.collision {
            events.push(SimEvent::Collision {
                line: self.line,
                collision: self.collision,
            });
        }
        events
    }
}

/// Position stream + stock + resolved tool
#[derive(Debug, Clone)]
pub struct Simulation {
    records: Vec<PositionRecord>,
    stock: StockModel,
    tool: ResolvedTool,
    config: SimulationConfig,
    cursor: usize,
    position: Option<DVec3>,
    surface: SurfaceMesh,
    collisions: usize,
    halted: bool,
}

impl Simulation {
    pub fn new(
        records: Vec<PositionRecord>,
        stock: StockModel,
        tool: ResolvedTool,
        config: SimulationConfig,
    ) -> Self {
        let stock = stock.with_max_cutting_feed(config.max_cutting_feed);
        let surface = stock.rebuild_surface();
        Self {
            records,
            stock,
            tool,
            config,
            cursor: 0,
            position: None,
            surface,
            collisions: 0,
            halted: false,
        }
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }

    pub fn stock(&self) -> &StockModel {
        &self.stock
    }

    pub fn tool(&self) -> &ResolvedTool {
        &self.tool
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Mesh as of the last rebuild
    pub fn surface(&self) -> &SurfaceMesh {
        &self.surface
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// No more steps: end of stream, or halted on a collision
    pub fn is_finished(&self) -> bool {
        self.halted || self.cursor >= self.records.len()
    }

    /// Process the next record. Returns None when finished.
    ///
    /// The record position is the tool tip; the cutting cylinder spans from
    /// the tip up the cutting length. Rapids remove material at zero feed, so
    /// cutting during a rapid is flagged as a suspected collision.
    pub fn step(&mut self) -> Option<StepOutcome> {
        if self.is_finished() {
            return None;
        }
        let index = self.cursor;
        let record = &self.records[index];
        self.cursor += 1;

        let to = record.position();
        let from = self.position.unwrap_or(to);
        let mut outcome = StepOutcome {
            index,
            line: record.line,
            from,
            to,
            rapid: record.rapid,
            removal: RemovalResult::default(),
            collision: CollisionEvent::clear(),
        };

        if !record.is_comment {
            let length = self.tool.cutting_length;
            let lift = |p: DVec3| p + DVec3::Z * length;
            let feed = if record.rapid { 0.0 } else { record.feed };

            outcome.collision = self
                .stock
                .check_collision(to, self.tool.diameter, record.rapid);
            outcome.removal =
                self.stock
                    .remove_along(lift(from), lift(to), self.tool.diameter, length, feed);
            self.position = Some(to);
        }

        if outcome.collision.collision {
            self.collisions += 1;
            if self.config.stop_on_collision {
                log::warn!("Stopping at line {} on collision", outcome.line + 1);
                self.halted = true;
            }
        }

        Some(outcome)
    }

    /// Rebuild the mesh when the cadence says so (or at the end)
    pub fn maybe_rebuild(&mut self) -> Option<usize> {
        let due = self.config.rebuild_every > 0 && self.cursor % self.config.rebuild_every == 0;
        if due || self.is_finished() {
            Some(self.rebuild_surface())
        } else {
            None
        }
    }

    /// Rebuild the mesh now, returning its triangle count
    pub fn rebuild_surface(&mut self) -> usize {
        self.surface = self.stock.rebuild_surface();
        self.surface.triangle_count()
    }

    /// Step to the end, returning every outcome
    pub fn run_to_end(&mut self) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(self.records.len().saturating_sub(self.cursor));
        while let Some(outcome) = self.step() {
            outcomes.push(outcome);
        }
        self.rebuild_surface();

        log::info!(
            "Simulated {} records: {} of {} voxels remain, {} collisions",
            outcomes.len(),
            self.stock.occupied(),
            self.stock.initial_occupied(),
            self.collisions
        );
        outcomes
    }

    pub fn finished_event(&self) -> SimEvent {
        SimEvent::Finished {
            steps: self.cursor,
            collisions: self.collisions,
            voxels_removed: self.stock.initial_occupied() - self.stock.occupied(),
        }
    }

    /// Restore the stock and rewind to the first record
    pub fn reset(&mut self) {
        self.stock.reset();
        self.cursor = 0;
        self.position = None;
        self.collisions = 0;
        self.halted = false;
        self.rebuild_surface();
    }

    /// Swap in a recomputed position stream and start over
    pub fn replace_records(&mut self, records: Vec<PositionRecord>) {
        self.records = records;
        self.reset();
    }
}
