//! Verification Engine
//!
//! Lints a program against the active dialect and, when given, the resolved
//! tool. Diagnostics are data; nothing here stops interpretation.

use serde::{Deserialize, Serialize};

use crate::dialect::{CommandDef, DialectRegistry};
use crate::machine::offsets::REGISTER_COUNT;
use crate::parser::{Block, ParsedLine, parse_line};
use crate::tooling::ResolvedTool;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A diagnostic message for a verification issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based source line
    pub line: usize,
    pub message: String,
    pub severity: Severity,
}

/// Result of verifying a program or line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, line: usize, message: String) {
        self.push(line, message, Severity::Error);
    }

    pub fn add_warning(&mut self, line: usize, message: String) {
        self.push(line, message, Severity::Warning);
    }

    pub fn add_info(&mut self, line: usize, message: String) {
        self.push(line, message, Severity::Info);
    }

    fn push(&mut self, line: usize, message: String, severity: Severity) {
        self.diagnostics.push(Diagnostic {
            line,
            message,
            severity,
        });
    }

    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Modal context carried between lines while verifying
#[derive(Debug, Clone, Copy, Default)]
struct VerifyState {
    active_d: u32,
}

/// Verify a whole program
pub fn verify_program(
    content: &str,
    dialects: &DialectRegistry,
    tool: Option<&ResolvedTool>,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut state = VerifyState::default();

    if dialects.active().is_none() {
        result.add_warning(
            1,
            "No active dialect; command checks are skipped".to_string(),
        );
    }

    for (index, line) in content.lines().enumerate() {
        verify_line(index + 1, line, dialects, tool, &mut state, &mut result);
    }

    log::debug!(
        "Verified {} lines: {} errors, {} warnings",
        content.lines().count(),
        result.count(Severity::Error),
        result.count(Severity::Warning)
    );

    result
}

fn verify_line(
    line_num: usize,
    line: &str,
    dialects: &DialectRegistry,
    tool: Option<&ResolvedTool>,
    state: &mut VerifyState,
    result: &mut ValidationResult,
) {
    if has_unterminated_paren(line) {
        result.add_error(line_num, "Unterminated '(' comment".to_string());
    }

    let ParsedLine::Block(block) = parse_line(line) else {
        return;
    };

    for token in &block.malformed {
        result.add_error(line_num, format!("Malformed word '{}'", token));
    }

    if dialects.active().is_some() {
        check_commands(line_num, &block, dialects, result);
    }

    check_motion(line_num, &block, result);
    check_registers(line_num, &block, state, result);

    if let (Some(tool), Some(speed)) = (tool, block.value('S')) {
        if speed > tool.max_rpm {
            result.add_warning(
                line_num,
                format!(
                    "Spindle speed {} exceeds tool assembly limit {:.0} rpm",
                    speed, tool.max_rpm
                ),
            );
        }
    }
}

/// Known commands, their required/known parameters, and value ranges
fn check_commands(
    line_num: usize,
    block: &Block,
    dialects: &DialectRegistry,
    result: &mut ValidationResult,
) {
    let Some(dialect) = dialects.active() else {
        return;
    };

    let mut known: Vec<&CommandDef> = Vec::new();
    for word in block.words.iter().filter(|w| matches!(w.letter, 'G' | 'M')) {
        match dialects.get_command(&word.name()) {
            Some(def) => known.push(def),
            None => result.add_warning(line_num, format!("Unknown command '{}'", word.name())),
        }
    }

    for def in &known {
        for required in def.required_parameters() {
            let found = block.words.iter().any(|w| required.matches(w.letter));
            if !found {
                result.add_error(
                    line_num,
                    format!(
                        "Missing required parameter '{}' for command '{}'",
                        required.name, def.name
                    ),
                );
            }
        }
    }

    // Parameter words only have a schema when some command on the line declares one
    if !known.iter().any(|def| def.parameters.is_some()) {
        return;
    }

    for word in block.words.iter().filter(|w| !matches!(w.letter, 'G' | 'M')) {
        let param = known.iter().find_map(|def| def.find_parameter(word.letter));
        match param {
            Some(param) => {
                if let Err(message) = param.check(word.value) {
                    result.add_error(line_num, message);
                }
            }
            None if dialect.is_modal_word(word.letter) => {}
            None => {
                let names: Vec<&str> = known.iter().map(|d| d.name.as_str()).collect();
                result.add_warning(
                    line_num,
                    format!(
                        "Unknown parameter '{}' for command '{}'",
                        word.letter,
                        names.join(" ")
                    ),
                );
            }
        }
    }
}

fn check_motion(line_num: usize, block: &Block, result: &mut ValidationResult) {
    for code in [0, 1] {
        if !block.has('G', code) {
            continue;
        }
        let has_axis = block
            .words
            .iter()
            .any(|w| matches!(w.letter, 'X' | 'Y' | 'Z'));
        if !has_axis {
            result.add_warning(
                line_num,
                format!("Movement command 'G{}' has no X, Y or Z target", code),
            );
        }
    }
}

fn check_registers(
    line_num: usize,
    block: &Block,
    state: &mut VerifyState,
    result: &mut ValidationResult,
) {
    for letter in ['H', 'D'] {
        if let Some(value) = block.value(letter) {
            let in_range = value >= 0.0 && value.fract() == 0.0 && value < REGISTER_COUNT as f64;
            if !in_range {
                result.add_warning(
                    line_num,
                    format!(
                        "{} register {} is outside 0..{}; its offset reads as zero",
                        letter,
                        value,
                        REGISTER_COUNT - 1
                    ),
                );
            }
        }
    }

    if let Some(d) = block.value('D') {
        state.active_d = if d >= 0.0 { d as u32 } else { 0 };
    }
    if block.has('G', 40) {
        state.active_d = 0;
    }

    for code in [41, 42] {
        if block.has('G', code) && state.active_d == 0 {
            result.add_warning(
                line_num,
                format!("G{} without a D register; compensation uses zero diameter", code),
            );
        }
    }
}

/// A '(' opened outside a ';' comment and never closed
fn has_unterminated_paren(line: &str) -> bool {
    let mut open = false;
    for ch in line.chars() {
        match ch {
            ';' if !open => return false,
            '(' if !open => open = true,
            ')' if open => open = false,
            _ => {}
        }
    }
    open
}
