//! Dialects
//!
//! TOML definitions of the G/M codes a controller accepts and the parameter
//! words each takes. Used only by the verification pass; the interpreter
//! never consults them.

pub mod registry;
pub mod schema;

pub use registry::{DialectRegistry, MILL_DIALECT, parse_dialect};
pub use schema::{CommandDef, Dialect, DialectFile, ParameterDef, normalize_command};
