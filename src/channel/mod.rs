//! Channel Synchronizer
//!
//! Two instruction pointers stepped cooperatively, one line per tick each,
//! meeting at `WAIT` lines. Both channels share the offset tables and the
//! macro-variable map; each owns its modal state.

pub mod program;
pub mod sync;

pub use program::{Channel, ChannelProgram, ChannelState};
pub use sync::{DEFAULT_SYNC_ID, Synchronizer};
