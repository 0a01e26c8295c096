//! Per-channel program state.

use serde::{Deserialize, Serialize};

use crate::interpreter::PositionRecord;
use crate::machine::ModalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Not yet ticked
    Idle,
    Running,
    /// Holding at a WAIT line until the other channel arrives
    WaitingAtSync,
    Done,
}

/// Program lines and instruction pointer for one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelProgram {
    pub lines: Vec<String>,
    pub current_line: usize,
    /// Reserved for subprogram returns; nothing pushes to it yet
    pub stack: Vec<f64>,
}

impl ChannelProgram {
    pub fn new(program: &str) -> Self {
        Self {
            lines: program.lines().map(str::to_string).collect(),
            current_line: 0,
            stack: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.lines.get(self.current_line).map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.current_line >= self.lines.len()
    }
}

/// One channel under the synchronizer: program, modal state, output
#[derive(Debug, Clone)]
pub struct Channel {
    pub program: ChannelProgram,
    pub state: ChannelState,
    pub modal: ModalState,
    /// Records produced so far, in execution order
    pub records: Vec<PositionRecord>,
    /// Sync id of the WAIT line the channel is holding at
    pub(crate) pending_sync: Option<u32>,
    last_numeric: Option<PositionRecord>,
}

impl Channel {
    pub fn new(program: &str, modal: ModalState) -> Self {
        Self {
            program: ChannelProgram::new(program),
            state: ChannelState::Idle,
            modal,
            records: Vec::new(),
            pending_sync: None,
            last_numeric: None,
        }
    }

    pub fn current_line(&self) -> usize {
        self.program.current_line
    }

    pub fn last_record(&self) -> Option<&PositionRecord> {
        self.records.last()
    }

    pub(crate) fn last_numeric(&self) -> Option<&PositionRecord> {
        self.last_numeric.as_ref()
    }

    pub(crate) fn push_records(&mut self, produced: Vec<PositionRecord>) {
        if let Some(last) = produced.iter().rev().find(|r| !r.is_comment) {
            self.last_numeric = Some(last.clone());
        }
        self.records.extend(produced);
    }

    pub(crate) fn advance(&mut self) {
        self.program.current_line += 1;
    }
}
