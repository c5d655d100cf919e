//! Frontend: lexer and parser for the textual set notation.
//!
//! ## Notation
//!
//! ```text
//! [N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }      set
//! [N] -> { S[i] -> A[i + 1] : i < N }                     relation
//! { S[i] -> A[i, 2i] }                                    function
//! { [S[i] -> [a]] : a = 1 }                               wrapped relation
//! [b] -> { : b != 0 }                                     parameter set
//! ```
//!
//! Tuple names are looked up through the [`Ctx`], so identifiers
//! registered as virtual keep their kind.

pub mod token;
pub mod lexer;
pub mod parser;

// Re-exports
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use crate::polyhedral::{
    IntegerMap, IntegerSet, MultiAff, MultiPwAff, PwAff, UnionMap, UnionSet,
};
use crate::utils::intern::Ctx;
use anyhow::{Result, bail};

/// Parse a single set (or parameter set).
pub fn parse_set(ctx: &Ctx, source: &str) -> Result<IntegerSet> {
    let mut parts = parser::parse_parts(ctx, source)?;
    if parts.len() != 1 {
        bail!("Expected exactly one set in '{}'", source);
    }
    let (space, disjuncts) = parts.remove(0);
    if space.is_map() {
        bail!("Expected a set, found a relation in '{}'", source);
    }
    Ok(IntegerSet::from_parts(space, disjuncts).coalesce()?)
}

/// Parse a single relation.
pub fn parse_map(ctx: &Ctx, source: &str) -> Result<IntegerMap> {
    let mut parts = parser::parse_parts(ctx, source)?;
    if parts.len() != 1 {
        bail!("Expected exactly one relation in '{}'", source);
    }
    let (space, disjuncts) = parts.remove(0);
    if !space.is_map() {
        bail!("Expected a relation, found a set in '{}'", source);
    }
    Ok(IntegerMap::from_parts(space, disjuncts).coalesce()?)
}

/// Parse a union of sets separated by `;`.
pub fn parse_union_set(ctx: &Ctx, source: &str) -> Result<UnionSet> {
    let mut result = UnionSet::default();
    for (space, disjuncts) in parser::parse_parts(ctx, source)? {
        if space.is_map() {
            bail!("Expected sets only in '{}'", source);
        }
        result = result.add_set(IntegerSet::from_parts(space, disjuncts).coalesce()?)?;
    }
    Ok(result)
}

/// Parse a union of relations separated by `;`.
pub fn parse_union_map(ctx: &Ctx, source: &str) -> Result<UnionMap> {
    let mut result = UnionMap::default();
    for (space, disjuncts) in parser::parse_parts(ctx, source)? {
        if !space.is_map() {
            bail!("Expected relations only in '{}'", source);
        }
        result = result.add_map(IntegerMap::from_parts(space, disjuncts).coalesce()?)?;
    }
    Ok(result)
}

/// Parse a piecewise multi-affine function given as a single-valued relation.
pub fn parse_multi_pw_aff(ctx: &Ctx, source: &str) -> Result<MultiPwAff> {
    let map = parse_map(ctx, source)?;
    Ok(MultiPwAff::from_map(&map)?)
}

/// Parse a piecewise affine function with a single output.
pub fn parse_pw_aff(ctx: &Ctx, source: &str) -> Result<PwAff> {
    let mpa = parse_multi_pw_aff(ctx, source)?;
    if mpa.n_out() != 1 {
        bail!("Expected a single output in '{}'", source);
    }
    Ok(mpa.pw_aff(0)?.clone())
}

/// Parse a multi-affine function defined on its whole domain.
pub fn parse_multi_aff(ctx: &Ctx, source: &str) -> Result<MultiAff> {
    let mpa = parse_multi_pw_aff(ctx, source)?;
    let mut outputs = Vec::with_capacity(mpa.n_out());
    for pa in mpa.pw_affs() {
        match pa.pieces() {
            [(domain, expr)] if domain.plain_is_universe() => outputs.push(expr.clone()),
            _ => bail!("Expected an unconditional affine function in '{}'", source),
        }
    }
    Ok(MultiAff::new(mpa.space().clone(), outputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        let ctx = Ctx::new();
        let set = parse_set(&ctx, "[N] -> { S[i] : 0 <= i < N }").unwrap();
        assert_eq!(set.tuple_id().map(|id| id.name()), Some("S"));
        assert!(set.contains(&[3], &[10]));
        assert!(!set.contains(&[10], &[10]));
        assert!(parse_set(&ctx, "{ S[i] -> A[i] }").is_err());
    }

    #[test]
    fn test_parse_map_and_function() {
        let ctx = Ctx::new();
        let map = parse_map(&ctx, "{ S[i] -> A[i + 1] }").unwrap();
        assert!(map.contains(&[2], &[3], &[]));
        let ma = parse_multi_aff(&ctx, "{ S[i, j] -> [j, i] }").unwrap();
        assert_eq!(ma.apply(&[1, 2], &[]), vec![2, 1]);
        assert!(parse_multi_aff(&ctx, "{ S[i] -> [i] : i >= 0 }").is_err());
    }

    #[test]
    fn test_parse_virtual_ids_keep_kind() {
        let ctx = Ctx::new();
        ctx.virtual_id("__pet_test_0");
        let mpa = parse_multi_pw_aff(&ctx, "{ S[i] -> __pet_test_0[i] }").unwrap();
        assert!(mpa.out_id().map_or(false, |id| id.is_virtual()));
    }

    #[test]
    fn test_parse_unions() {
        let ctx = Ctx::new();
        let u = parse_union_map(&ctx, "{ S[i] -> A[i]; T[i] -> A[i]; S[i] -> A[i + 1] }").unwrap();
        assert_eq!(u.n_map(), 2);
        let s = parse_union_set(&ctx, "{ S[i] : i >= 0; T[] }").unwrap();
        assert_eq!(s.n_set(), 2);
    }
}
