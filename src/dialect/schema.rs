//! Dialect Schema Types
//!
//! TOML shape of a dialect file and the lookup form it is converted into.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root dialect file structure (matches TOML)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DialectFile {
    pub dialect: DialectMeta,
    #[serde(default)]
    pub commands: Vec<CommandDef>,
}

/// Dialect metadata
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DialectMeta {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Words allowed on any line regardless of its command
    #[serde(default = "default_modal_words")]
    pub modal_words: Vec<char>,
}

fn default_modal_words() -> Vec<char> {
    vec!['F', 'S', 'T', 'N', 'H', 'D']
}

/// Runtime dialect (keyed for lookups)
#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub modal_words: Vec<char>,
    pub commands: HashMap<String, CommandDef>,
}

/// G/M code definition
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CommandDef {
    pub name: String,
    pub description_short: Option<String>,
    pub description_long: Option<String>,
    /// None: the command takes no parameter words of its own
    pub parameters: Option<Vec<ParameterDef>>,
}

/// Command parameter definition
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    pub constraints: Option<ParameterConstraints>,
}

/// Parameter value kinds
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Int,
    #[default]
    Float,
}

/// Parameter value range
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ParameterConstraints {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl From<DialectFile> for Dialect {
    fn from(file: DialectFile) -> Self {
        let commands = file
            .commands
            .into_iter()
            .map(|cmd| (normalize_command(&cmd.name), cmd))
            .collect();

        Self {
            name: file.dialect.name,
            version: file.dialect.version,
            description: file.dialect.description,
            modal_words: file
                .dialect
                .modal_words
                .into_iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            commands,
        }
    }
}

/// Canonical command key: uppercase, leading zeros dropped ("g01" -> "G1")
pub fn normalize_command(name: &str) -> String {
    let name = name.trim().to_ascii_uppercase();
    let Some(letter) = name.chars().next() else {
        return name;
    };
    let number = &name[letter.len_utf8()..];
    let trimmed = number.trim_start_matches('0');
    if trimmed.is_empty() || trimmed.starts_with('.') {
        format!("{}0{}", letter, trimmed)
    } else {
        format!("{}{}", letter, trimmed)
    }
}

impl Dialect {
    pub fn is_modal_word(&self, letter: char) -> bool {
        self.modal_words.contains(&letter.to_ascii_uppercase())
    }
}

impl CommandDef {
    pub fn find_parameter(&self, letter: char) -> Option<&ParameterDef> {
        self.parameters
            .as_ref()?
            .iter()
            .find(|param| param.matches(letter))
    }

    pub fn required_parameters(&self) -> Vec<&ParameterDef> {
        self.parameters
            .as_ref()
            .map(|params| params.iter().filter(|p| p.required).collect())
            .unwrap_or_default()
    }
}

impl ParameterDef {
    pub fn matches(&self, letter: char) -> bool {
        let mut chars = self.name.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.eq_ignore_ascii_case(&letter))
    }

    /// Check a word value against the parameter's type and range
    pub fn check(&self, value: f64) -> Result<(), String> {
        if self.param_type == ParameterType::Int && value.fract() != 0.0 {
            return Err(format!(
                "Parameter '{}' expects an integer, got {}",
                self.name, value
            ));
        }

        if let Some(constraints) = &self.constraints {
            if let Some(min) = constraints.min_value {
                if value < min {
                    return Err(format!(
                        "Parameter '{}' value {} below minimum {}",
                        self.name, value, min
                    ));
                }
            }
            if let Some(max) = constraints.max_value {
                if value > max {
                    return Err(format!(
                        "Parameter '{}' value {} exceeds maximum {}",
                        self.name, value, max
                    ));
                }
            }
        }

        Ok(())
    }
}
