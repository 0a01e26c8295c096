//! G-code Interpreter
//!
//! Turns program text into an ordered stream of [`PositionRecord`]s, one per
//! input line (two for a `G28` line with axis words). The modal state is an
//! explicit input/output; there is no hidden state between calls.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::machine::{
    Coolant, CutterComp, ModalState, Plane, Positioning, Spindle, ToolOffsetTable, Units,
    WorkOffsetId, WorkOffsetTable,
};
use crate::parser::{Block, ParsedLine, parse_line};

/// Fixed machine home used by `G28`
pub const MACHINE_HOME: [f64; 3] = [0.0, 0.0, 200.0];

const AXES: [char; 3] = ['X', 'Y', 'Z'];

/// Machine-state snapshot after one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// 0-based source line index
    pub line: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub feed: f64,
    pub speed: f64,
    pub rapid: bool,
    pub g43: bool,
    pub h_register: u32,
    pub d_register: u32,
    pub work_offset: WorkOffsetId,
    pub is_comment: bool,
    pub source_line: String,
    /// Tool-tip world position: programmed + work offset (+ H length when g43)
    pub effective: DVec3,
}

impl PositionRecord {
    /// Programmed position in the active work frame
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// Interpreter bound to a pair of offset tables
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'a> {
    work_offsets: &'a WorkOffsetTable,
    tool_offsets: &'a ToolOffsetTable,
}

impl<'a> Interpreter<'a> {
    pub fn new(work_offsets: &'a WorkOffsetTable, tool_offsets: &'a ToolOffsetTable) -> Self {
        Self {
            work_offsets,
            tool_offsets,
        }
    }

    /// Interpret a whole program, mutating `modal` line by line
    pub fn interpret(&self, program: &str, modal: &mut ModalState) -> Vec<PositionRecord> {
        let mut records: Vec<PositionRecord> = Vec::new();
        let mut last_numeric: Option<PositionRecord> = None;

        for (index, line) in program.lines().enumerate() {
            let produced = self.interpret_line(index, line, modal, last_numeric.as_ref());
            if let Some(last) = produced.iter().rev().find(|r| !r.is_comment) {
                last_numeric = Some(last.clone());
            }
            records.extend(produced);
        }

        log::debug!(
            "Interpreted {} lines into {} position records",
            program.lines().count(),
            records.len()
        );

        records
    }

    /// Interpret one line given the last numeric record before it
    ///
    /// Comment and blank lines repeat `previous` (or the modal snapshot when
    /// nothing numeric has been seen yet) with `is_comment` set.
    pub fn interpret_line(
        &self,
        index: usize,
        line: &str,
        modal: &mut ModalState,
        previous: Option<&PositionRecord>,
    ) -> Vec<PositionRecord> {
        if is_comment_line(line) {
            return vec![self.carry_forward(index, line, modal, previous)];
        }

        match parse_line(line) {
            ParsedLine::Block(block) => self.execute_block(index, line, &block, modal),
            ParsedLine::Comment(_) | ParsedLine::Empty => {
                vec![self.carry_forward(index, line, modal, previous)]
            }
        }
    }

    fn carry_forward(
        &self,
        index: usize,
        line: &str,
        modal: &ModalState,
        previous: Option<&PositionRecord>,
    ) -> PositionRecord {
        let mut record = match previous {
            Some(prev) => prev.clone(),
            None => self.snapshot(index, line, modal, false),
        };
        record.line = index;
        record.source_line = line.to_string();
        record.is_comment = true;
        record.rapid = false;
        record
    }

    /// Record the current modal state as a position record
    pub fn snapshot(
        &self,
        index: usize,
        line: &str,
        modal: &ModalState,
        rapid: bool,
    ) -> PositionRecord {
        let [x, y, z] = modal.position;
        let origin = self.work_offsets.vector(modal.active_work_offset);
        let length = if modal.tool_length_comp {
            self.tool_offsets.length(modal.active_h)
        } else {
            0.0
        };

        PositionRecord {
            line: index,
            x,
            y,
            z,
            feed: modal.feed_rate,
            speed: modal.spindle_speed,
            rapid,
            g43: modal.tool_length_comp,
            h_register: modal.active_h,
            d_register: modal.active_d,
            work_offset: modal.active_work_offset,
            is_comment: false,
            source_line: line.to_string(),
            effective: DVec3::new(x, y, z) + origin + DVec3::Z * length,
        }
    }

    fn execute_block(
        &self,
        index: usize,
        line: &str,
        block: &Block,
        modal: &mut ModalState,
    ) -> Vec<PositionRecord> {
        let flags = apply_modal_words(block, modal);

        if flags.home {
            return self.home(index, line, block, modal);
        }

        for (axis, letter) in AXES.iter().enumerate() {
            if let Some(value) = block.value(*letter) {
                modal.position[axis] = modal.target(axis, value);
            }
        }

        log::trace!("line {}: {:?} rapid={}", index + 1, modal.position, flags.rapid);
        vec![self.snapshot(index, line, modal, flags.rapid)]
    }

    /// Two-phase `G28`: optional intermediate point, then machine home for
    /// the named axes (Z alone when no axis is named)
    fn home(
        &self,
        index: usize,
        line: &str,
        block: &Block,
        modal: &mut ModalState,
    ) -> Vec<PositionRecord> {
        let mut records = Vec::with_capacity(2);
        let mut homed = [false; 3];

        let mut has_intermediate = false;
        for (axis, letter) in AXES.iter().enumerate() {
            if let Some(value) = block.value(*letter) {
                modal.position[axis] = modal.target(axis, value);
                homed[axis] = true;
                has_intermediate = true;
            }
            if block.has_flag(*letter) {
                homed[axis] = true;
            }
        }

        if has_intermediate {
            records.push(self.snapshot(index, line, modal, true));
        }

        if !homed.iter().any(|h| *h) {
            homed[2] = true;
        }

        for (axis, is_homed) in homed.iter().enumerate() {
            if *is_homed {
                modal.position[axis] = MACHINE_HOME[axis];
            }
        }

        records.push(self.snapshot(index, line, modal, true));
        records
    }
}

/// Interpret a program against explicit offset tables
pub fn interpret(
    program: &str,
    modal: &mut ModalState,
    work_offsets: &WorkOffsetTable,
    tool_offsets: &ToolOffsetTable,
) -> Vec<PositionRecord> {
    Interpreter::new(work_offsets, tool_offsets).interpret(program, modal)
}

/// Blank lines and lines starting with `;` or `(` carry no machine state
pub fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('(')
}

/// Per-line, non-modal outcomes of the modal pass
#[derive(Debug, Default)]
struct LineFlags {
    rapid: bool,
    home: bool,
}

/// Apply every modal word on the block, in source order
fn apply_modal_words(block: &Block, modal: &mut ModalState) -> LineFlags {
    let mut flags = LineFlags::default();

    for word in &block.words {
        match word.letter {
            'G' => match word.code() {
                Some(0) => flags.rapid = true,
                Some(17) => modal.plane = Plane::XY,
                Some(18) => modal.plane = Plane::XZ,
                Some(19) => modal.plane = Plane::YZ,
                Some(20) => modal.units = Units::Inch,
                Some(21) => modal.units = Units::Mm,
                Some(28) => flags.home = true,
                Some(40) => modal.cutter_comp = CutterComp::None,
                Some(41) => modal.cutter_comp = CutterComp::Left,
                Some(42) => modal.cutter_comp = CutterComp::Right,
                Some(43) => modal.tool_length_comp = true,
                Some(49) => modal.tool_length_comp = false,
                Some(90) => modal.positioning = Positioning::Absolute,
                Some(91) => modal.positioning = Positioning::Relative,
                Some(code) => {
                    if let Some(id) = WorkOffsetId::from_code(code) {
                        modal.active_work_offset = id;
                    }
                }
                None => {}
            },
            'M' => match word.code() {
                Some(3) => modal.spindle = Spindle::Cw,
                Some(4) => modal.spindle = Spindle::Ccw,
                Some(5) => modal.spindle = Spindle::Off,
                Some(7) => modal.coolant = Coolant::Mist,
                Some(8) => modal.coolant = Coolant::Flood,
                Some(9) => modal.coolant = Coolant::Off,
                _ => {}
            },
            'F' => modal.feed_rate = word.value,
            'S' => modal.spindle_speed = word.value,
            'T' => {
                if let Some(tool) = word.code() {
                    modal.active_tool = tool;
                }
            }
            'H' => {
                if let Some(register) = word.code() {
                    modal.active_h = register;
                }
            }
            'D' => {
                if let Some(register) = word.code() {
                    modal.active_d = register;
                }
            }
            _ => {}
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{LengthOffset, WorkOffset};

    fn run(program: &str) -> Vec<PositionRecord> {
        let mut modal = ModalState::new();
        interpret(
            program,
            &mut modal,
            &WorkOffsetTable::new(),
            &ToolOffsetTable::new(),
        )
    }

    #[test]
    fn one_record_per_line() {
        let records = run("G90\nG1 X10 Y5\n\n; note\nG0 Z3");
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].line, 4);
    }

    #[test]
    fn relative_moves_accumulate() {
        let records = run("G91\nG1 X10\nG1 X10 Y-2.5");
        let last = records.last().unwrap();
        assert_eq!(last.position().to_array(), [20.0, -2.5, 0.0]);
    }

    #[test]
    fn rapid_is_per_line() {
        let records = run("G00 X1\nX2\ng0 x3\nG1 X4");
        let rapids: Vec<_> = records.iter().map(|r| r.rapid).collect();
        assert_eq!(rapids, vec![true, false, true, false]);
    }

    #[test]
    fn feed_and_speed_are_modal() {
        let records = run("G1 X1 F100 S8000\nG1 X2\nG1 X3 F250");
        assert_eq!(records[1].feed, 100.0);
        assert_eq!(records[1].speed, 8000.0);
        assert_eq!(records[2].feed, 250.0);
    }

    #[test]
    fn comments_repeat_previous_state() {
        let records = run("G0 X5 Y6 Z7 F50\n(pause)\n; more\n");
        for record in &records[1..] {
            assert!(record.is_comment);
            assert_eq!(record.position(), records[0].position());
            assert_eq!(record.feed, records[0].feed);
        }
    }

    #[test]
    fn comment_before_any_motion_uses_start_state() {
        let mut modal = ModalState::at([1.0, 2.0, 3.0]);
        let records = interpret(
            "; header\nG1 X4",
            &mut modal,
            &WorkOffsetTable::new(),
            &ToolOffsetTable::new(),
        );
        assert!(records[0].is_comment);
        assert_eq!(records[0].position().to_array(), [1.0, 2.0, 3.0]);
        assert_eq!(records[1].position().to_array(), [4.0, 2.0, 3.0]);
    }

    #[test]
    fn malformed_tokens_are_skipped() {
        let records = run("G1 X10 Y5\nG1 X1.2.3 Y8 QQ");
        assert_eq!(records[1].position().to_array(), [10.0, 8.0, 0.0]);
    }

    #[test]
    fn g28_without_axes_homes_z_only() {
        let records = run("G1 X10 Y20 Z5\nG28");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].position().to_array(), [10.0, 20.0, 200.0]);
        assert!(records[1].rapid);
    }

    #[test]
    fn g28_with_axes_moves_through_intermediate_point() {
        let records = run("G1 X10 Y20 Z5\nG28 X0 Y0");
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].position().to_array(), [0.0, 0.0, 5.0]);
        assert_eq!(records[2].position().to_array(), [0.0, 0.0, 5.0]);
        assert!(records[1].rapid && records[2].rapid);
        assert_eq!(records[1].line, records[2].line);
    }

    #[test]
    fn g28_relative_intermediate() {
        let records = run("G1 X10 Y20 Z5\nG91 G28 Z10");
        assert_eq!(records[1].position().to_array(), [10.0, 20.0, 15.0]);
        assert_eq!(records[2].position().to_array(), [10.0, 20.0, 200.0]);
    }

    #[test]
    fn g28_flagged_axis_homes_without_intermediate() {
        let records = run("G1 X10 Y20 Z5\nG28 X");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].position().to_array(), [0.0, 20.0, 5.0]);
    }

    #[test]
    fn modal_codes_update_state() {
        let mut modal = ModalState::new();
        interpret(
            "G20 G18 G55\nG41 D7\nM3 S1200 M8\nT4 M6",
            &mut modal,
            &WorkOffsetTable::new(),
            &ToolOffsetTable::new(),
        );
        assert_eq!(modal.units, Units::Inch);
        assert_eq!(modal.plane, Plane::XZ);
        assert_eq!(modal.active_work_offset, WorkOffsetId::G55);
        assert_eq!(modal.cutter_comp, CutterComp::Left);
        assert_eq!(modal.active_d, 7);
        assert_eq!(modal.spindle, Spindle::Cw);
        assert_eq!(modal.coolant, Coolant::Flood);
        assert_eq!(modal.active_tool, 4);

        interpret(
            "G40 M5 M9",
            &mut modal,
            &WorkOffsetTable::new(),
            &ToolOffsetTable::new(),
        );
        assert_eq!(modal.cutter_comp, CutterComp::None);
        assert_eq!(modal.spindle, Spindle::Off);
        assert_eq!(modal.coolant, Coolant::Off);
    }

    #[test]
    fn tool_length_compensation_on_effective_z() {
        let mut work = WorkOffsetTable::new();
        work.set(
            WorkOffsetId::G54,
            WorkOffset {
                z: 50.0,
                ..WorkOffset::default()
            },
        );
        let mut tools = ToolOffsetTable::new();
        tools.set_length(
            1,
            LengthOffset {
                geometry: 75.5,
                wear: 0.0,
            },
        );

        let mut modal = ModalState::new();
        let records = interpret("G54\nG43 H1 Z-5\nG49 Z-5", &mut modal, &work, &tools);

        assert!(records[1].g43);
        assert_eq!(records[1].h_register, 1);
        assert!((records[1].effective[2] - 120.5).abs() < 1e-9);
        assert!(!records[2].g43);
        assert!((records[2].effective[2] - 45.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_h_register_adds_nothing() {
        let mut modal = ModalState::new();
        let records = interpret(
            "G43 H250 Z-5",
            &mut modal,
            &WorkOffsetTable::new(),
            &ToolOffsetTable::new(),
        );
        assert_eq!(records[0].h_register, 250);
        assert_eq!(records[0].effective[2], -5.0);
    }
}
