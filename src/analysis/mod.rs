//! The scop aggregate and the analyses defined on it.

pub mod scop;
pub mod context;
pub mod accesses;

pub use scop::{Scop, SkipKind};
pub use context::{expr_extract_context, stmt_extract_context};
