//! Utility modules shared by the algebra and the scop combinators.
//!
//! - Error types and diagnostics
//! - Source locations
//! - Identifier interning and the extraction context
//! - Indented dumps of sets, relations and scops

pub mod errors;
pub mod location;
pub mod intern;
pub mod poly_print;

// Re-exports
pub use errors::*;
pub use location::Loc;
pub use intern::{Ctx, Id, IdKind};
pub use poly_print::{enumerate_points, PolyPrinter};
