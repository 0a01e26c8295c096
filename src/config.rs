//! Configuration management for the simulator CLI.
//!
//! Handles:
//! - Command-line argument parsing
//! - Machine configuration (stock, tool, offsets, cadence) from TOML
//! - Dialect directory configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::machine::{
    DiameterOffset, LengthOffset, ModalState, ToolOffsetTable, WorkOffset, WorkOffsetId,
    WorkOffsetTable,
};
use crate::simulation::SimulationConfig;
use crate::stock::{StockDimensions, StockModel};
use crate::tooling::{CuttingTool, Holder, HolderType, ResolvedTool, ToolAssembly, resolve};

/// Project-local machine file, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = ".gcode-sim.toml";

/// Command-line arguments for the simulator
#[derive(Debug, Parser)]
#[command(name = "gcode-sim")]
#[command(about = "CNC motion and stock-removal simulator for G-code programs")]
#[command(version)]
pub struct Args {
    /// Machine configuration file
    #[arg(long, global = true, help = "Machine configuration TOML file")]
    pub config: Option<PathBuf>,

    /// Custom dialect directory to search for dialect files
    #[arg(long, global = true, help = "Directory containing dialect TOML files")]
    pub dialect_dir: Option<PathBuf>,

    /// Log level
    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Interpret and simulate a program against the configured stock
    Run {
        program: PathBuf,
        /// Print one JSON object per position record
        #[arg(long)]
        json: bool,
        /// Step on a timer, streaming events, instead of running flat out
        #[arg(long)]
        tick_ms: Option<u64>,
    },
    /// Verify a program against the active dialect and tool
    Check {
        program: PathBuf,
        /// Dialect to verify against (defaults to modeline, then config)
        #[arg(long)]
        dialect: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Re-simulate a program whenever it changes on disk
    Watch {
        program: PathBuf,
        /// Quiet period before recomputing, in milliseconds
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },
    /// Run two channel programs side by side with WAIT synchronization
    Dual {
        first: PathBuf,
        second: PathBuf,
        /// Give up after this many ticks
        #[arg(long, default_value_t = 1_000_000)]
        max_ticks: u64,
    },
}

/// Stock block and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub voxel_size: f64,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            x: 100.0,
            y: 100.0,
            z: 50.0,
            voxel_size: 2.0,
        }
    }
}

/// One work coordinate system entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOffsetEntry {
    pub id: WorkOffsetId,
    #[serde(flatten)]
    pub offset: WorkOffset,
}

/// One H/D register entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOffsetEntry {
    pub register: u32,
    #[serde(default)]
    pub length: Option<LengthOffset>,
    #[serde(default)]
    pub diameter: Option<DiameterOffset>,
}

/// Everything about the machine a run needs besides the program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub stock: StockConfig,
    pub tool: ToolAssembly,
    /// H/D register the resolved tool is loaded into
    pub tool_register: u32,
    pub work_offsets: Vec<WorkOffsetEntry>,
    pub tool_offsets: Vec<ToolOffsetEntry>,
    pub simulation: SimulationConfig,
    /// Programmed position before the first line
    pub start_position: [f64; 3],
    /// Dialect used by `check` when the program has no modeline
    pub dialect: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            stock: StockConfig::default(),
            tool: ToolAssembly {
                tool: CuttingTool {
                    diameter: 10.0,
                    flutes: 3,
                    stickout: 35.0,
                    cutting_length: 22.0,
                    max_rpm: None,
                },
                holder: Holder {
                    kind: HolderType::Bt40,
                    gauge_length: None,
                    max_rpm: None,
                },
                collet: None,
                extension: None,
            },
            tool_register: 1,
            work_offsets: Vec::new(),
            tool_offsets: Vec::new(),
            simulation: SimulationConfig::default(),
            start_position: [0.0; 3],
            dialect: None,
        }
    }
}

impl MachineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse machine configuration TOML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read machine config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse machine config: {}", path.display()))
    }

    pub fn resolve_tool(&self) -> Result<ResolvedTool> {
        resolve(&self.tool).context("Invalid tool assembly in machine config")
    }

    pub fn stock_model(&self) -> Result<StockModel> {
        let dims = StockDimensions::new(self.stock.x, self.stock.y, self.stock.z);
        StockModel::new(dims, self.stock.voxel_size).context("Invalid stock in machine config")
    }

    pub fn work_offset_table(&self) -> WorkOffsetTable {
        let mut table = WorkOffsetTable::new();
        for entry in &self.work_offsets {
            table.set(entry.id, entry.offset.clone());
        }
        table
    }

    /// Resolved tool loaded into `tool_register`, then explicit entries on top
    pub fn tool_offset_table(&self, tool: &ResolvedTool) -> ToolOffsetTable {
        let mut table = ToolOffsetTable::new();
        if !table.apply_assembly(self.tool_register, tool) {
            log::warn!(
                "Tool register {} is out of range; assembly not loaded",
                self.tool_register
            );
        }
        for entry in &self.tool_offsets {
            let length_ok = entry
                .length
                .is_none_or(|length| table.set_length(entry.register, length));
            let diameter_ok = entry
                .diameter
                .is_none_or(|diameter| table.set_diameter(entry.register, diameter));
            if !(length_ok && diameter_ok) {
                log::warn!("Ignoring tool offset for register {}", entry.register);
            }
        }
        table
    }

    pub fn start_state(&self) -> ModalState {
        ModalState::at(self.start_position)
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub machine: MachineConfig,
    /// Where `machine` came from, None for built-in defaults
    pub machine_path: Option<PathBuf>,
    /// Dialect directories, loaded in order (later files replace earlier names)
    pub dialect_dirs: Vec<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        Self::from_args_in(args, &cwd, dirs::config_dir().as_deref())
    }

    /// Resolve configuration against explicit project and user directories
    pub fn from_args_in(args: Args, project_dir: &Path, user_dir: Option<&Path>) -> Result<Self> {
        let machine_path = match args.config {
            Some(path) => Some(path),
            None => find_machine_config(project_dir, user_dir),
        };

        let machine = match &machine_path {
            Some(path) => MachineConfig::load(path)?,
            None => MachineConfig::default(),
        };

        let mut dialect_dirs = Vec::new();
        if let Some(user_dir) = user_dir {
            dialect_dirs.push(user_dir.join("gcode-sim").join("dialects"));
        }
        if let Some(custom_dir) = args.dialect_dir {
            dialect_dirs.push(custom_dir);
        }

        Ok(Config {
            command: args.command,
            machine,
            machine_path,
            dialect_dirs,
            log_level: args.log_level,
        })
    }
}

/// Project file first, then the user config directory
fn find_machine_config(project_dir: &Path, user_dir: Option<&Path>) -> Option<PathBuf> {
    let project = project_dir.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Some(project);
    }
    let user = user_dir?.join("gcode-sim").join("machine.toml");
    user.is_file().then_some(user)
}
