//! Sequential and parallel composition of scops.
//!
//! Composing two scops concatenates their statements and arrays. The
//! result is valid only where both inputs are valid, and it skips
//! whenever either input skips.

use crate::analysis::{Scop, SkipKind};
use crate::ir::Implication;
use crate::polyhedral::{MultiPwAff, PwAff};
use crate::utils::errors::{AlgebraResult, ErrorKind, ScopResult};
use crate::utils::intern::Ctx;

/// The affine skip condition that holds when `a` or `b` holds.
fn skip_or(a: &MultiPwAff, b: &MultiPwAff) -> AlgebraResult<MultiPwAff> {
    let (pa, pb) = (a.pw_aff(0)?, b.pw_aff(0)?);
    let dom = pa.domain()?.intersect(&pb.domain()?)?;
    let cond = pa.non_zero_set()?.union(&pb.non_zero_set()?)?.coalesce()?;
    Ok(MultiPwAff::from_pw_aff(PwAff::indicator(&cond, &dom)?))
}

fn combine_skip(
    ctx: &Ctx,
    a: Option<MultiPwAff>,
    b: Option<MultiPwAff>,
) -> ScopResult<Option<MultiPwAff>> {
    match (a, b) {
        (None, None) => Ok(None),
        (Some(skip), None) | (None, Some(skip)) => Ok(Some(skip)),
        (Some(a), Some(b)) => {
            if a.has_out_id() || b.has_out_id() {
                return Err(ctx.die(ErrorKind::Internal, "can only combine affine skips"));
            }
            Ok(Some(skip_or(&a, &b)?))
        }
    }
}

/// Replace the skip conditions of `scop` by their combination with those of `other`.
fn combine_skips(ctx: &Ctx, scop: &mut Scop, other: &mut Scop) -> ScopResult<()> {
    for kind in SkipKind::ALL {
        let skip = combine_skip(ctx, scop.take_skip(kind), other.take_skip(kind))?;
        scop.put_skip(kind, skip);
    }
    Ok(())
}

/// The implications of both scops, without duplicates.
fn collect_implications(a: Vec<Implication>, b: Vec<Implication>) -> AlgebraResult<Vec<Implication>> {
    if b.is_empty() {
        return Ok(a);
    }
    if a.is_empty() {
        return Ok(b);
    }
    let mut result = a;
    for implication in b {
        let mut known = false;
        for existing in &result {
            if existing.is_equal(&implication)? {
                known = true;
                break;
            }
        }
        if !known {
            result.push(implication);
        }
    }
    Ok(result)
}

/// Combine the statements of two scops.
///
/// A scop without statements only contributes its skip conditions.
fn add(ctx: &Ctx, mut scop1: Scop, mut scop2: Scop) -> ScopResult<Scop> {
    if scop1.stmts.is_empty() || scop2.stmts.is_empty() {
        let (mut kept, mut other) = if scop1.stmts.is_empty() { (scop2, scop1) } else { (scop1, scop2) };
        combine_skips(ctx, &mut kept, &mut other)?;
        kept.inherit_input(&other);
        return Ok(kept);
    }

    log::trace!("adding scops with {} and {} statements", scop1.n_stmt(), scop2.n_stmt());
    let mut scop = Scop::empty();
    scop.stmts = std::mem::take(&mut scop1.stmts);
    scop.stmts.append(&mut scop2.stmts);
    scop.arrays = std::mem::take(&mut scop1.arrays);
    scop.arrays.append(&mut scop2.arrays);
    scop.types = std::mem::take(&mut scop1.types);
    scop.types.append(&mut scop2.types);
    scop.implications = collect_implications(
        std::mem::take(&mut scop1.implications),
        std::mem::take(&mut scop2.implications),
    )?;
    scop.context_value = scop1.context_value.intersect(&scop2.context_value)?;
    scop = scop.restrict_context(&scop1.context)?;
    scop = scop.restrict_context(&scop2.context)?;
    combine_skips(ctx, &mut scop1, &mut scop2)?;
    combine_skips(ctx, &mut scop, &mut scop1)?;
    scop = scop
        .update_start_end_from_loc(&scop1.loc)
        .update_start_end_from_loc(&scop2.loc);
    scop.inherit_input(&scop1).inherit_input(&scop2);
    Ok(scop)
}

/// Make sure `scop` is not executed when `skip` holds.
///
/// An affine skip restricts the parameters to where it is zero.
/// A skip on a virtual variable adds a filter on that variable being zero.
fn restrict_skip(ctx: &Ctx, scop: Scop, skip: &MultiPwAff) -> ScopResult<Scop> {
    if skip.has_out_id() {
        return scop.filter(ctx, skip, false);
    }
    let cond = skip.pw_aff(0)?.zero_set()?.params()?;
    scop.restrict(ctx, &cond)
}

impl Scop {
    /// Execute `self` and then `other`.
    ///
    /// The statements of `other` are not executed where the "skip now"
    /// condition of `self` holds.
    pub fn add_seq(self, ctx: &Ctx, other: Scop) -> ScopResult<Scop> {
        let other = match self.skip(SkipKind::Now) {
            Some(skip) => {
                let skip = skip.clone();
                restrict_skip(ctx, other, &skip)?
            }
            None => other,
        };
        add(ctx, self, other)
    }

    /// Execute `self` and `other` in either order.
    pub fn add_par(self, ctx: &Ctx, other: Scop) -> ScopResult<Scop> {
        add(ctx, self, other)
    }
}
