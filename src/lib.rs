//! # PolyScop - static control parts over an exact integer set algebra
//!
//! A static control part (scop) is a program fragment whose loops and
//! conditions are affine in the surrounding iterators and parameters.
//! This crate provides:
//! - An integer set and relation algebra with named, nested tuples
//! - The scop data model: statements, arrays, types and implications
//! - The combinators used while extracting a scop bottom-up: sequential
//!   and parallel composition, embedding in an enclosing loop, filtering
//!   on data-dependent tests, restriction, parameter alignment and gist
//! - Collection of access relations, domains and schedules
//!
//! ## Architecture
//!
//! ```text
//! notation → Frontend → Polyhedral algebra → IR (Expr, Stmt) → Scop → Transform
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use polyscop::prelude::*;
//!
//! let ctx = Ctx::new();
//! let write = Expr::write_access(parse_multi_pw_aff(&ctx, "{ [] -> A[] }")?)?;
//! let body = Scop::from_expr(&ctx, Loc::dummy(), None, 0, Expr::assign(write, Expr::Int(0)))?;
//! let domain = parse_set(&ctx, "[N] -> { [i] : 0 <= i < N }")?;
//! let embed = Embed::identity(domain, ctx.named_id("i"));
//! let scop = embed.apply(&ctx, body)?;
//! ```

#![warn(clippy::all)]

pub mod frontend;
pub mod ir;
pub mod polyhedral;
pub mod analysis;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::frontend::{
        parse_map, parse_multi_aff, parse_multi_pw_aff, parse_pw_aff, parse_set,
        parse_union_map, parse_union_set,
    };
    pub use crate::ir::{AccessExpr, Array, Expr, Implication, OpKind, Stmt, TypeDef};
    pub use crate::polyhedral::{
        Aff, AffineExpr, Constraint, IntegerMap, IntegerSet, MultiAff, MultiPwAff, PwAff,
        Space, Tuple, UnionMap, UnionSet,
    };
    pub use crate::analysis::{Scop, SkipKind};
    pub use crate::transform::{
        create_test_index, Embed, Filter, Gist, IntersectDomainPrefix, Pipeline, Prefix,
        Restrict, Transform,
    };
    pub use crate::utils::errors::*;
    pub use crate::utils::intern::{Ctx, Id, IdKind};
    pub use crate::utils::location::Loc;
    pub use crate::ScopConfig;
}

/// Naming and sizing conventions used while building a scop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopConfig {
    /// Prefix of generated statement labels
    pub stmt_prefix: String,
    /// Prefix of the virtual arrays holding data-dependent tests
    pub test_prefix: String,
    /// Prefix of reference identifiers
    pub ref_prefix: String,
    /// Size in bytes of an `int`
    pub int_size: usize,
}

impl Default for ScopConfig {
    fn default() -> Self {
        Self {
            stmt_prefix: "S".to_string(),
            test_prefix: "__pet_test".to_string(),
            ref_prefix: "__pet_ref".to_string(),
            int_size: 4,
        }
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = ScopConfig::default();
        assert_eq!(config.test_prefix, "__pet_test");
        assert_eq!(config.int_size, 4);
        let ctx = utils::intern::Ctx::with_config(ScopConfig { stmt_prefix: "T".into(), ..config });
        assert_eq!(ctx.config().stmt_prefix, "T");
    }
}
