//! G-code motion simulator
//!
//! Turns G-code program text into a deterministic stream of machine-state
//! snapshots and plays it against a voxel stock model.
//!
//! This library provides:
//! - A typed G-code tokenizer and modal interpreter
//! - Work and tool offset tables
//! - Voxel stock removal, surface extraction and rapid collision checks
//! - Tool assembly resolution
//! - Two-channel WAIT synchronization
//! - A tick-driven simulation runner
//! - Dialect-driven program verification

pub mod channel;
pub mod cli;
pub mod config;
pub mod dialect;
pub mod interpreter;
pub mod machine;
pub mod parser;
pub mod simulation;
pub mod stock;
pub mod tooling;
pub mod validation;

pub use channel::{ChannelState, Synchronizer};
pub use config::{Config, MachineConfig};
pub use dialect::DialectRegistry;
pub use interpreter::{Interpreter, MACHINE_HOME, PositionRecord, interpret};
pub use machine::{ModalState, ToolOffsetTable, WorkOffsetId, WorkOffsetTable};
pub use parser::{ParsedLine, parse_line};
pub use simulation::{SimEvent, Simulation, SimulationConfig};
pub use stock::{CollisionEvent, RemovalResult, StockDimensions, StockModel, check_collision};
pub use tooling::{ResolvedTool, ToolAssembly, resolve};
pub use validation::{Diagnostic, verify_program};
