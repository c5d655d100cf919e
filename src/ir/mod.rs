//! Intermediate representation of a static control part.
//!
//! This module defines two layers:
//! - Expressions: the trees executed by statements
//! - PIR: statements, arrays, types and implications

pub mod expr;
pub mod pir;

pub use expr::{AccessExpr, Expr, OpKind};
pub use pir::{Array, Implication, Stmt, TypeDef};
