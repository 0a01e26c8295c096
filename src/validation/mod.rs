//! Verification pass
//!
//! Optional lint over a program, kept apart from interpretation: the
//! interpreter ignores what this reports.

pub mod engine;

pub use engine::{Diagnostic, Severity, ValidationResult, verify_program};
