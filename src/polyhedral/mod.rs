//! Polyhedral data structures and operations.
//!
//! This module provides the integer-set algebra the extractor builds on:
//! - Spaces and (possibly nested) tuples
//! - Affine expressions and constraints
//! - Integer sets and relations as unions of constraint systems
//! - Affine and piecewise affine functions
//! - Unions over different spaces

pub mod space;
pub mod expr;
pub mod constraint;
pub mod operations;
pub mod set;
pub mod map;
pub mod aff;
pub mod union;

pub use space::{Space, Tuple, TupleShape};
pub use expr::{AffineExpr, Col};
pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use set::IntegerSet;
pub use map::IntegerMap;
pub use aff::{Aff, MultiAff, MultiPwAff, PwAff};
pub use union::{UnionMap, UnionSet};
