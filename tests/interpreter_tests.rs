//! Interpreter behavior against the public API
use glam::DVec3;
use gcode_sim::machine::{LengthOffset, WorkOffset};
use gcode_sim::{
    MACHINE_HOME, ModalState, PositionRecord, ToolOffsetTable, WorkOffsetId, WorkOffsetTable,
    interpret,
};

fn run(program: &str) -> Vec<PositionRecord> {
    interpret(
        program,
        &mut ModalState::new(),
        &WorkOffsetTable::new(),
        &ToolOffsetTable::new(),
    )
}

#[test]
fn test_relative_round_trip_returns_to_start() {
    let records = run("G0 X12.5 Y-4 Z3\nG91\nG1 X5 Y2.25 Z-1 F100\nG1 X-5 Y-2.25 Z1\nG90");
    let start = records[0].position();
    let end = records.last().unwrap().position();
    assert!(start.abs_diff_eq(end, 1e-9));
}

#[test]
fn test_incremental_replay_matches_absolute_program() {
    let absolute = run(
        "G0 X3 Y-7.25 Z12\nG1 Z-1.5 F200\nG1 X41.3 Y2.2\nG1 X-18 Y33.75 Z-4.125\n\
         G0 Z25\nG0 X0.001 Y-0.002\nG1 Z-9.87 F80\nG1 X1000.5 Y-1000.25",
    );

    // same moves expressed as G91 deltas from the first point
    let mut incremental = String::from("G0 X3 Y-7.25 Z12\nG91\n");
    for pair in absolute.windows(2) {
        let delta = pair[1].position() - pair[0].position();
        let word = if pair[1].rapid { "G0" } else { "G1" };
        incremental.push_str(&format!("{word} X{} Y{} Z{}\n", delta.x, delta.y, delta.z));
    }
    let replayed: Vec<DVec3> = run(&incremental)
        .iter()
        .filter(|r| !r.source_line.starts_with("G91"))
        .map(|r| r.position())
        .collect();

    assert_eq!(replayed.len(), absolute.len());
    for (record, position) in absolute.iter().zip(&replayed) {
        assert!(
            record.position().abs_diff_eq(*position, 1e-9),
            "line {}: {} vs {}",
            record.line,
            record.position(),
            position
        );
    }
}

#[test]
fn test_comments_do_not_change_motion() {
    let plain = run("G0 X1 Y2\nG1 Z-1 F50\nG1 X4");
    let commented = run("; header\nG0 X1 Y2\n(plunge)\nG1 Z-1 F50\n\nG1 X4 ; finish");

    let numeric: Vec<DVec3> = commented
        .iter()
        .filter(|r| !r.is_comment)
        .map(|r| r.position())
        .collect();
    let expected: Vec<DVec3> = plain.iter().map(|r| r.position()).collect();
    assert_eq!(numeric, expected);

    // comment records mirror the last numeric record
    assert_eq!(commented[2].position(), commented[1].position());
    assert_eq!(commented[2].source_line, "(plunge)");
    assert!(!commented[2].rapid);
}

#[test]
fn test_one_record_per_line_except_g28_with_axes() {
    let program = "G0 X10 Y10 Z10\nG28 X5\nG28\n; done";
    let records = run(program);
    assert_eq!(records.len(), program.lines().count() + 1);

    // intermediate point, then home for the named axis only
    assert_eq!(records[1].position().to_array(), [5.0, 10.0, 10.0]);
    assert_eq!(records[2].position().to_array(), [MACHINE_HOME[0], 10.0, 10.0]);
    assert!(records[1].rapid && records[2].rapid);

    // bare G28 homes Z only
    assert_eq!(records[3].position().to_array(), [MACHINE_HOME[0], 10.0, MACHINE_HOME[2]]);
    assert_eq!(records[1].line, records[2].line);
}

#[test]
fn test_tool_length_compensation_scenario() {
    let mut works = WorkOffsetTable::new();
    works.set(
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
    let records = interpret("G54\nG43 H1\nG1 Z-5 F100", &mut modal, &works, &tools);
    let last = records.last().unwrap();
    assert!(last.g43);
    assert_eq!(last.h_register, 1);
    assert_eq!(last.z, -5.0);
    assert!((last.effective[2] - 120.5).abs() < 1e-9);

    // G49 drops the length again
    let records = interpret("G49\nG1 Z-5", &mut modal, &works, &tools);
    assert!((records[1].effective[2] - 45.0).abs() < 1e-9);
}

#[test]
fn test_modal_state_is_explicit_input_and_output() {
    let mut modal = ModalState::at([1.0, 2.0, 3.0]);
    let first = interpret(
        "G91\nG1 X1",
        &mut modal,
        &WorkOffsetTable::new(),
        &ToolOffsetTable::new(),
    );
    assert_eq!(first[1].position().to_array(), [2.0, 2.0, 3.0]);

    // continuing with the same state keeps relative mode and position
    let second = interpret(
        "G1 X1",
        &mut modal,
        &WorkOffsetTable::new(),
        &ToolOffsetTable::new(),
    );
    assert_eq!(second[0].position().to_array(), [3.0, 2.0, 3.0]);
}

#[test]
fn test_unknown_and_malformed_input_never_fails() {
    let records = run("G1 X10 F100\nG999 Y5\nX1.2.3 Y7\n@@@\nG2 X20 Y0 I5 J0\nG81 Z-3 R1");
    assert_eq!(records.len(), 6);
    assert_eq!(records[1].position().to_array(), [10.0, 5.0, 0.0]);
    assert_eq!(records[2].position().to_array(), [10.0, 7.0, 0.0]);
    // arcs are applied as straight moves to the endpoint
    assert_eq!(records[4].position().to_array(), [20.0, 0.0, 0.0]);
}

#[test]
fn test_records_serialize_to_json() {
    let records = run("G0 X1 Y2 Z3");
    let json = serde_json::to_string(&records[0]).unwrap();
    let back: PositionRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, records[0]);
    assert!(json.contains("\"work_offset\":\"G54\""));
}
