//! Work and tool offset tables
//!
//! Plain key/value structures. The engine reads them; loading and saving is
//! the caller's business.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::tooling::ResolvedTool;

/// Number of H and D registers (0..=99)
pub const REGISTER_COUNT: usize = 100;

/// One of the six fixed work coordinate systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkOffsetId {
    #[default]
    G54,
    G55,
    G56,
    G57,
    G58,
    G59,
}

impl WorkOffsetId {
    pub const ALL: [WorkOffsetId; 6] = [
        WorkOffsetId::G54,
        WorkOffsetId::G55,
        WorkOffsetId::G56,
        WorkOffsetId::G57,
        WorkOffsetId::G58,
        WorkOffsetId::G59,
    ];

    /// Map a G code number (54..=59) to its work offset
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            54 => Some(WorkOffsetId::G54),
            55 => Some(WorkOffsetId::G55),
            56 => Some(WorkOffsetId::G56),
            57 => Some(WorkOffsetId::G57),
            58 => Some(WorkOffsetId::G58),
            59 => Some(WorkOffsetId::G59),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A work coordinate origin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub description: String,
}

/// G54..G59 origins
///
/// Which system is selected is modal state, not part of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOffsetTable {
    offsets: [WorkOffset; 6],
}

impl Default for WorkOffsetTable {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkOffsetTable {
    pub fn new() -> Self {
        Self {
            offsets: std::array::from_fn(|_| WorkOffset::default()),
        }
    }

    pub fn get(&self, id: WorkOffsetId) -> &WorkOffset {
        &self.offsets[id.index()]
    }

    pub fn set(&mut self, id: WorkOffsetId, offset: WorkOffset) {
        self.offsets[id.index()] = offset;
    }

    /// Offset vector for a coordinate system
    pub fn vector(&self, id: WorkOffsetId) -> DVec3 {
        let o = self.get(id);
        DVec3::new(o.x, o.y, o.z)
    }
}

/// Length register: geometry plus wear
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthOffset {
    pub geometry: f64,
    pub wear: f64,
}

/// Diameter register: geometry plus wear
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiameterOffset {
    pub geometry: f64,
    pub wear: f64,
}

/// H and D registers, indexed 0..=99
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOffsetTable {
    h: Vec<LengthOffset>,
    d: Vec<DiameterOffset>,
}

impl Default for ToolOffsetTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolOffsetTable {
    pub fn new() -> Self {
        Self {
            h: vec![LengthOffset::default(); REGISTER_COUNT],
            d: vec![DiameterOffset::default(); REGISTER_COUNT],
        }
    }

    /// Effective tool length for H register; zero when out of range
    pub fn length(&self, register: u32) -> f64 {
        self.h
            .get(register as usize)
            .map(|h| h.geometry + h.wear)
            .unwrap_or(0.0)
    }

    /// Effective tool diameter for D register; zero when out of range
    pub fn diameter(&self, register: u32) -> f64 {
        self.d
            .get(register as usize)
            .map(|d| d.geometry + d.wear)
            .unwrap_or(0.0)
    }

    /// Returns false (and changes nothing) for registers beyond the table
    pub fn set_length(&mut self, register: u32, offset: LengthOffset) -> bool {
        match self.h.get_mut(register as usize) {
            Some(slot) => {
                *slot = offset;
                true
            }
            None => false,
        }
    }

    pub fn set_diameter(&mut self, register: u32, offset: DiameterOffset) -> bool {
        match self.d.get_mut(register as usize) {
            Some(slot) => {
                *slot = offset;
                true
            }
            None => false,
        }
    }

    pub fn length_offset(&self, register: u32) -> Option<&LengthOffset> {
        self.h.get(register as usize)
    }

    pub fn diameter_offset(&self, register: u32) -> Option<&DiameterOffset> {
        self.d.get(register as usize)
    }

    /// Load a resolved assembly into H/D `register` geometry. Wear is kept.
    pub fn apply_assembly(&mut self, register: u32, tool: &ResolvedTool) -> bool {
        let index = register as usize;
        if index >= REGISTER_COUNT {
            return false;
        }
        self.h[index].geometry = tool.total_length;
        self.d[index].geometry = tool.diameter;
        true
    }
}
