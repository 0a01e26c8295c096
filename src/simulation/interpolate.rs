//! Visual interpolation between consecutive position records.
//!
//! Frames are for display only; nothing here feeds back into the stock or
//! the interpreter.

use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    /// Smoothstep, slow at both ends
    EaseInOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// One interpolated tool position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Source line of the record being approached
    pub line: usize,
    pub position: DVec3,
    /// Eased progress, 1.0 on the last frame
    pub t: f64,
}

/// `frames` positions from just after `from` up to and including `to`
pub fn interpolate(
    line: usize,
    from: DVec3,
    to: DVec3,
    frames: u32,
    easing: Easing,
) -> Vec<Frame> {
    (1..=frames)
        .map(|n| {
            let t = easing.apply(f64::from(n) / f64::from(frames));
            Frame {
                line,
                position: from.lerp(to, t),
                t,
            }
        })
        .collect()
}
