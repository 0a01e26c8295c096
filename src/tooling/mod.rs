//! Tool Assembly Resolver
//!
//! Holder + collet + extension + cutting tool in, plain numbers out. The
//! renderer owns any mesh built from these; nothing here points back at it.

pub mod assembly;

pub use assembly::{
    Collet, ColletType, CuttingTool, Extension, Holder, HolderType, ResolvedTool, ToolAssembly,
    resolve,
};
