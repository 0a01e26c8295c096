//! Modal interpreter state
//!
//! Everything a G-code line may read or mutate that persists to the next
//! line. One instance per channel; the interpreter takes it by `&mut`.

use serde::{Deserialize, Serialize};

use crate::machine::offsets::WorkOffsetId;

/// Programmed units (G20/G21). Accepted, not distinguished downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Mm,
    Inch,
}

/// Distance mode (G90/G91)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Positioning {
    #[default]
    Absolute,
    Relative,
}

/// Active plane (G17/G18/G19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Plane {
    #[default]
    XY,
    XZ,
    YZ,
}

/// Cutter radius compensation (G40/G41/G42)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutterComp {
    #[default]
    None,
    Left,
    Right,
}

/// Spindle direction (M03/M04/M05)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spindle {
    #[default]
    Off,
    Cw,
    Ccw,
}

/// Coolant (M07/M08/M09)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coolant {
    #[default]
    Off,
    Mist,
    Flood,
}

/// Persistent interpreter flags for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalState {
    pub units: Units,
    pub positioning: Positioning,
    pub plane: Plane,
    pub active_work_offset: WorkOffsetId,
    pub tool_length_comp: bool,
    pub cutter_comp: CutterComp,
    pub active_h: u32,
    pub active_d: u32,
    pub feed_rate: f64,
    pub spindle_speed: f64,
    pub spindle: Spindle,
    pub coolant: Coolant,
    /// Tool number selected by the last T word
    pub active_tool: u32,
    /// Last programmed position in the active work frame
    pub position: [f64; 3],
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            units: Units::Mm,
            positioning: Positioning::Absolute,
            plane: Plane::XY,
            active_work_offset: WorkOffsetId::G54,
            tool_length_comp: false,
            cutter_comp: CutterComp::None,
            active_h: 0,
            active_d: 0,
            feed_rate: 0.0,
            spindle_speed: 0.0,
            spindle: Spindle::Off,
            coolant: Coolant::Off,
            active_tool: 0,
            position: [0.0; 3],
        }
    }
}

impl ModalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start state at a given programmed position
    pub fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Apply one axis value under the current distance mode
    pub fn target(&self, axis: usize, value: f64) -> f64 {
        match self.positioning {
            Positioning::Absolute => value,
            Positioning::Relative => self.position[axis] + value,
        }
    }
}
