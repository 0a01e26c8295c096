//! Tool assembly types and the resolver that turns them into plain numbers.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Gauge length used when the holder type is not in the table
pub const DEFAULT_GAUGE_LENGTH: f64 = 60.0;

/// Spindle taper / holder family, parsed from a type tag by prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HolderType {
    Bt30,
    Bt40,
    Bt50,
    Cat40,
    Cat50,
    Hsk63,
    Hsk100,
    Other(String),
}

impl HolderType {
    /// Gauge line to holder nose, mm
    pub fn gauge_length(&self) -> f64 {
        match self {
            HolderType::Bt30 => 45.0,
            HolderType::Bt40 => 65.0,
            HolderType::Bt50 => 100.0,
            HolderType::Cat40 => 65.0,
            HolderType::Cat50 => 100.0,
            HolderType::Hsk63 => 50.0,
            HolderType::Hsk100 => 60.0,
            HolderType::Other(_) => DEFAULT_GAUGE_LENGTH,
        }
    }

    /// Rated spindle speed for the holder family
    pub fn max_rpm(&self) -> f64 {
        match self {
            HolderType::Bt30 => 20_000.0,
            HolderType::Bt40 => 15_000.0,
            HolderType::Bt50 => 8_000.0,
            HolderType::Cat40 => 12_000.0,
            HolderType::Cat50 => 8_000.0,
            HolderType::Hsk63 => 24_000.0,
            HolderType::Hsk100 => 15_000.0,
            HolderType::Other(_) => 10_000.0,
        }
    }
}

impl FromStr for HolderType {
    type Err = std::convert::Infallible;

    /// Matches on the tag prefix, so "BT40-ER32-70" is a BT40 holder
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let upper = tag.trim().to_ascii_uppercase();
        let table: [(&str, HolderType); 7] = [
            ("HSK100", HolderType::Hsk100),
            ("HSK63", HolderType::Hsk63),
            ("CAT40", HolderType::Cat40),
            ("CAT50", HolderType::Cat50),
            ("BT30", HolderType::Bt30),
            ("BT40", HolderType::Bt40),
            ("BT50", HolderType::Bt50),
        ];
        Ok(table
            .into_iter()
            .find(|(prefix, _)| upper.starts_with(prefix))
            .map(|(_, kind)| kind)
            .unwrap_or_else(|| HolderType::Other(tag.trim().to_string())))
    }
}

impl From<String> for HolderType {
    fn from(tag: String) -> Self {
        match tag.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<HolderType> for String {
    fn from(kind: HolderType) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderType::Bt30 => f.write_str("BT30"),
            HolderType::Bt40 => f.write_str("BT40"),
            HolderType::Bt50 => f.write_str("BT50"),
            HolderType::Cat40 => f.write_str("CAT40"),
            HolderType::Cat50 => f.write_str("CAT50"),
            HolderType::Hsk63 => f.write_str("HSK63"),
            HolderType::Hsk100 => f.write_str("HSK100"),
            HolderType::Other(tag) => f.write_str(tag),
        }
    }
}

/// ER collet sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColletType {
    Er11,
    Er16,
    Er20,
    Er25,
    Er32,
    Er40,
}

impl ColletType {
    /// Largest shank the collet clamps, mm
    pub fn capacity(self) -> f64 {
        match self {
            ColletType::Er11 => 7.0,
            ColletType::Er16 => 10.0,
            ColletType::Er20 => 13.0,
            ColletType::Er25 => 16.0,
            ColletType::Er32 => 20.0,
            ColletType::Er40 => 26.0,
        }
    }
}

/// The cutting tool itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuttingTool {
    pub diameter: f64,
    #[serde(default = "default_flutes")]
    pub flutes: u32,
    /// Length protruding from the holder/collet nose
    pub stickout: f64,
    pub cutting_length: f64,
    /// Manufacturer speed rating, None when unrated
    #[serde(default)]
    pub max_rpm: Option<f64>,
}

fn default_flutes() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holder {
    #[serde(rename = "type")]
    pub kind: HolderType,
    /// Overrides the table value for the holder type
    #[serde(default)]
    pub gauge_length: Option<f64>,
    #[serde(default)]
    pub max_rpm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collet {
    #[serde(rename = "type")]
    pub kind: ColletType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub length: f64,
}

/// Holder + optional collet/extension + cutting tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAssembly {
    pub tool: CuttingTool,
    pub holder: Holder,
    #[serde(default)]
    pub collet: Option<Collet>,
    #[serde(default)]
    pub extension: Option<Extension>,
}

/// Plain numbers derived from an assembly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTool {
    /// Gauge line to tool tip
    pub total_length: f64,
    pub diameter: f64,
    pub max_rpm: f64,
    pub cutting_length: f64,
}

impl ResolvedTool {
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// Compute effective length, diameter and speed limit for an assembly
pub fn resolve(assembly: &ToolAssembly) -> Result<ResolvedTool> {
    let tool = &assembly.tool;

    if !(tool.diameter > 0.0) {
        bail!("tool diameter must be positive, got {}", tool.diameter);
    }
    if tool.stickout < 0.0 {
        bail!("tool stickout cannot be negative, got {}", tool.stickout);
    }

    if let Some(collet) = &assembly.collet {
        if tool.diameter > collet.kind.capacity() {
            bail!(
                "{:?} collet clamps at most {} mm, tool is {} mm",
                collet.kind,
                collet.kind.capacity(),
                tool.diameter
            );
        }
    }

    let gauge = assembly
        .holder
        .gauge_length
        .unwrap_or_else(|| assembly.holder.kind.gauge_length());
    let extension = assembly.extension.as_ref().map(|e| e.length).unwrap_or(0.0);
    if extension < 0.0 {
        bail!("extension length cannot be negative, got {}", extension);
    }

    let total_length = gauge + tool.stickout + extension;
    if !(total_length > 0.0) {
        bail!("tool assembly length must be positive, got {}", total_length);
    }

    let holder_max = assembly
        .holder
        .max_rpm
        .unwrap_or_else(|| assembly.holder.kind.max_rpm());
    let rated = tool.max_rpm.map_or(holder_max, |t| t.min(holder_max));
    let derate = (1.0 - extension / 1000.0).max(0.0);
    let max_rpm = rated * derate;

    log::debug!(
        "Resolved {} assembly: length {:.3} mm, diameter {:.3} mm, max {:.0} rpm",
        assembly.holder.kind,
        total_length,
        tool.diameter,
        max_rpm
    );

    Ok(ResolvedTool {
        total_length,
        diameter: tool.diameter,
        max_rpm,
        cutting_length: tool.cutting_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembly(holder: &str, extension: Option<f64>) -> ToolAssembly {
        ToolAssembly {
            tool: CuttingTool {
                diameter: 10.0,
                flutes: 3,
                stickout: 30.0,
                cutting_length: 22.0,
                max_rpm: Some(18_000.0),
            },
            holder: Holder {
                kind: holder.parse().unwrap(),
                gauge_length: None,
                max_rpm: None,
            },
            collet: None,
            extension: extension.map(|length| Extension { length }),
        }
    }

    #[test]
    fn holder_prefix_lookup() {
        assert_eq!("BT40-ER32".parse::<HolderType>().unwrap(), HolderType::Bt40);
        assert_eq!("cat50".parse::<HolderType>().unwrap(), HolderType::Cat50);
        assert_eq!("HSK63A".parse::<HolderType>().unwrap(), HolderType::Hsk63);
        let other: HolderType = "SK40".parse().unwrap();
        assert_eq!(other.gauge_length(), DEFAULT_GAUGE_LENGTH);
    }

    #[test]
    fn total_length_sums_components() {
        let resolved = resolve(&assembly("BT40", Some(20.0))).unwrap();
        assert!((resolved.total_length - (65.0 + 30.0 + 20.0)).abs() < 1e-9);
        assert_eq!(resolved.diameter, 10.0);
    }

    #[test]
    fn max_rpm_is_min_of_ratings_then_derated() {
        // BT40 holder is rated 15000, lower than the tool
        let plain = resolve(&assembly("BT40", None)).unwrap();
        assert_eq!(plain.max_rpm, 15_000.0);

        let extended = resolve(&assembly("BT40", Some(100.0))).unwrap();
        assert!((extended.max_rpm - 13_500.0).abs() < 1e-6);

        // HSK63 is rated above the tool, so the tool limits
        let hsk = resolve(&assembly("HSK63", None)).unwrap();
        assert_eq!(hsk.max_rpm, 18_000.0);
    }

    #[test]
    fn explicit_gauge_length_overrides_table() {
        let mut a = assembly("BT40", None);
        a.holder.gauge_length = Some(80.0);
        assert_eq!(resolve(&a).unwrap().total_length, 110.0);
    }

    #[test]
    fn rejects_invalid_assemblies() {
        let mut a = assembly("BT40", None);
        a.tool.diameter = 0.0;
        assert!(resolve(&a).is_err());

        let mut a = assembly("BT40", None);
        a.holder.gauge_length = Some(-100.0);
        assert!(resolve(&a).is_err());

        let mut a = assembly("BT40", None);
        a.collet = Some(Collet {
            kind: ColletType::Er11,
        });
        assert!(resolve(&a).is_err());
    }
}
