//! Dialect verification of the pocket and faulty fixtures
use gcode_sim::validation::{Severity, ValidationResult};
use gcode_sim::{DialectRegistry, MachineConfig, verify_program};

fn load(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

fn verify(program: &str) -> ValidationResult {
    let registry = DialectRegistry::with_embedded().unwrap();
    let tool = MachineConfig::default().resolve_tool().unwrap();
    verify_program(program, &registry, Some(&tool))
}

fn on_line(result: &ValidationResult, line: usize) -> Vec<(Severity, &str)> {
    result
        .diagnostics
        .iter()
        .filter(|d| d.line == line)
        .map(|d| (d.severity, d.message.as_str()))
        .collect()
}

#[test]
fn test_pocket_is_clean() {
    let program = load("pocket.nc");
    let registry = DialectRegistry::with_embedded().unwrap();
    assert_eq!(
        registry.detect_modeline_dialect(&program).as_deref(),
        Some("mill")
    );

    let result = verify(&program);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

#[test]
fn test_faulty_program_diagnostics() {
    let result = verify(&load("faulty.nc"));
    assert!(!result.is_valid());

    assert!(on_line(&result, 1).is_empty());
    assert_eq!(
        on_line(&result, 2),
        vec![(Severity::Warning, "Unknown command 'G999'")]
    );
    assert_eq!(
        on_line(&result, 3),
        vec![(Severity::Warning, "Unknown parameter 'Q' for command 'G1'")]
    );
    assert_eq!(
        on_line(&result, 4),
        vec![(
            Severity::Error,
            "Missing required parameter 'H' for command 'G43'"
        )]
    );
    assert!(
        on_line(&result, 5)
            .iter()
            .any(|(s, m)| *s == Severity::Error && m.starts_with("Malformed word"))
    );
    assert!(
        on_line(&result, 6)
            .iter()
            .any(|(s, m)| *s == Severity::Error && m.starts_with("Unterminated"))
    );

    // default BT40 assembly tops out at 15000 rpm
    let spindle = on_line(&result, 7);
    assert_eq!(spindle.len(), 1);
    assert_eq!(spindle[0].0, Severity::Warning);
    assert!(spindle[0].1.contains("15000"));

    assert!(
        on_line(&result, 8)
            .iter()
            .any(|(_, m)| m.starts_with("G41 without a D register"))
    );
    assert_eq!(
        on_line(&result, 9),
        vec![(
            Severity::Warning,
            "Movement command 'G0' has no X, Y or Z target"
        )]
    );
}

#[test]
fn test_verification_does_not_change_interpretation() {
    use gcode_sim::{ModalState, ToolOffsetTable, WorkOffsetTable, interpret};

    let program = load("faulty.nc");
    let before = interpret(
        &program,
        &mut ModalState::new(),
        &WorkOffsetTable::new(),
        &ToolOffsetTable::new(),
    );
    let _ = verify(&program);
    let after = interpret(
        &program,
        &mut ModalState::new(),
        &WorkOffsetTable::new(),
        &ToolOffsetTable::new(),
    );
    assert_eq!(before, after);
    assert_eq!(after.len(), program.lines().count());
}

#[test]
fn test_diagnostics_serialize_for_json_output() {
    let result = verify("G43 Z10");
    let json = serde_json::to_string(&result.diagnostics[0]).unwrap();
    assert_eq!(
        json,
        r#"{"line":1,"message":"Missing required parameter 'H' for command 'G43'","severity":"error"}"#
    );
}
