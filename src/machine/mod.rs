//! Machine State
//!
//! Modal interpreter flags and the offset tables they index into.

pub mod modal;
pub mod offsets;

pub use modal::{Coolant, CutterComp, ModalState, Plane, Positioning, Spindle, Units};
pub use offsets::{
    DiameterOffset, LengthOffset, ToolOffsetTable, WorkOffset, WorkOffsetId, WorkOffsetTable,
};
