//! Dialect Registry
//!
//! In-memory set of dialects with one active selection. The embedded mill
//! dialect is always available; user directories can add or replace entries.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use super::schema::{CommandDef, Dialect, DialectFile, normalize_command};

/// Name of the built-in dialect
pub const MILL_DIALECT: &str = "mill";

const EMBEDDED_MILL: &str = include_str!("../../resources/dialects/mill.toml");

#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    dialects: HashMap<String, Dialect>,
    active: Option<String>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the embedded mill dialect, already active
    pub fn with_embedded() -> Result<Self> {
        let mut registry = Self::new();
        registry.add_embedded_mill_dialect()?;
        registry.set_active(MILL_DIALECT);
        Ok(registry)
    }

    /// Add a dialect, replacing any with the same name
    pub fn add(&mut self, dialect: Dialect) {
        self.dialects.insert(dialect.name.clone(), dialect);
    }

    pub fn set_active(&mut self, name: &str) -> bool {
        if self.dialects.contains_key(name) {
            self.active = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> Option<&Dialect> {
        self.active.as_ref().and_then(|name| self.dialects.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&Dialect> {
        self.dialects.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Command definition from the active dialect
    pub fn get_command(&self, name: &str) -> Option<&CommandDef> {
        self.active()?.commands.get(&normalize_command(name))
    }

    pub fn add_embedded_mill_dialect(&mut self) -> Result<()> {
        let dialect = parse_dialect(EMBEDDED_MILL, None)?;
        self.add(dialect);
        Ok(())
    }

    /// Load every `*.toml` in `dir`. Files that fail to parse are logged and
    /// skipped; a missing directory loads nothing.
    pub async fn load_dialect_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read dialect directory: {}", dir.display()))?;

        let mut loaded = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }
            match self.load_dialect_file(&path).await {
                Ok(name) => {
                    log::debug!("Loaded dialect '{}' from {}", name, path.display());
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping dialect file {}: {:#}", path.display(), e),
            }
        }

        Ok(loaded)
    }

    /// Load one dialect file, returning its name
    pub async fn load_dialect_file(&mut self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read dialect file: {}", path.display()))?;
        let dialect = parse_dialect(&content, Some(path))?;
        let name = dialect.name.clone();
        self.add(dialect);
        Ok(name)
    }

    /// Dialect named by a `gcode_dialect=<name>` modeline in the first or
    /// last five lines, if registered
    pub fn detect_modeline_dialect(&self, content: &str) -> Option<String> {
        let lines: Vec<&str> = content.lines().collect();
        let check_lines: Vec<&str> = if lines.len() <= 10 {
            lines
        } else {
            let mut check = Vec::new();
            check.extend_from_slice(&lines[0..5]);
            check.extend_from_slice(&lines[lines.len() - 5..]);
            check
        };

        let modeline_re = Regex::new(r"gcode_dialect\s*=\s*([\w-]+)").ok()?;

        check_lines
            .into_iter()
            .filter_map(|line| modeline_re.captures(line))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .find(|name| self.dialects.contains_key(name))
    }
}

/// Parse dialect TOML
pub fn parse_dialect(content: &str, source: Option<&Path>) -> Result<Dialect> {
    let file: DialectFile = toml::from_str(content).with_context(|| match source {
        Some(path) => format!("Failed to parse dialect TOML: {}", path.display()),
        None => "Failed to parse built-in dialect TOML".to_string(),
    })?;
    Ok(Dialect::from(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_embedded_mill_dialect() {
        let registry = DialectRegistry::with_embedded().unwrap();
        assert_eq!(registry.active().unwrap().name, MILL_DIALECT);
        assert!(registry.get_command("G0").is_some());
        assert!(registry.get_command("g01").is_some());
        assert!(registry.get_command("M06").is_some());
        assert!(registry.get_command("G43").unwrap().find_parameter('H').is_some());
        assert!(registry.get_command("G999").is_none());
    }

    #[test]
    fn test_nonexistent_dialect() {
        let mut registry = DialectRegistry::new();
        assert!(!registry.set_active("nonexistent"));
        assert!(registry.get_command("G1").is_none());
    }

    #[test]
    fn test_detect_modeline() {
        let registry = DialectRegistry::with_embedded().unwrap();
        assert_eq!(
            registry.detect_modeline_dialect("; gcode_dialect=mill\nG0 X0"),
            Some("mill".to_string())
        );
        assert_eq!(registry.detect_modeline_dialect("; gcode_dialect=lathe\nG0 X0"), None);

        let mut long = String::from("G0 X0\n");
        for _ in 0..20 {
            long.push_str("G1 X1\n");
        }
        long.push_str("(gcode_dialect = mill)\n");
        assert_eq!(registry.detect_modeline_dialect(&long), Some("mill".to_string()));
    }

    #[tokio::test]
    async fn test_load_dialect_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lathe.toml"),
            r#"
[dialect]
name = "lathe"

[[commands]]
name = "G96"
description_short = "Constant surface speed"
"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.toml"), "[dialect\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = DialectRegistry::with_embedded().unwrap();
        let loaded = registry.load_dialect_dir(dir.path()).await.unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(registry.names(), vec!["lathe", "mill"]);

        assert!(registry.set_active("lathe"));
        assert!(registry.get_command("G96").is_some());
        assert!(registry.get_command("G0").is_none());
    }

    #[tokio::test]
    async fn test_missing_dir_loads_nothing() {
        let mut registry = DialectRegistry::new();
        let loaded = registry
            .load_dialect_dir(Path::new("/nonexistent/gcode-sim/dialects"))
            .await
            .unwrap();
        assert_eq!(loaded, 0);
    }
}
