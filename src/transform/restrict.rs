//! Restriction of a scop to parameter values.

use crate::analysis::{Scop, SkipKind};
use crate::polyhedral::{IntegerSet, MultiPwAff, PwAff};
use crate::transform::Transform;
use crate::utils::errors::{ErrorKind, ScopResult};
use crate::utils::intern::Ctx;

/// Only execute a scop for parameter values satisfying `cond`.
#[derive(Debug, Clone)]
pub struct Restrict {
    /// A parameter set
    pub cond: IntegerSet,
}

impl Restrict {
    pub fn new(cond: IntegerSet) -> Self {
        Self { cond }
    }
}

impl Transform for Restrict {
    fn apply(&self, ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        scop.restrict(ctx, &self.cond)
    }

    fn name(&self) -> &str {
        "restrict"
    }
}

/// The skip condition `skip` restricted to hold only inside `cond`.
fn restrict_skip(ctx: &Ctx, skip: &MultiPwAff, cond: &IntegerSet) -> ScopResult<MultiPwAff> {
    if skip.has_out_id() {
        return Err(ctx.die(ErrorKind::Internal, "can only restrict affine skips"));
    }
    let pa = skip.pw_aff(0)?;
    let holds = cond.intersect(&pa.non_zero_set()?)?;
    Ok(MultiPwAff::from_pw_aff(PwAff::indicator(&holds, &pa.domain()?)?))
}

impl Scop {
    /// Only execute the statements for parameter values in `cond`.
    ///
    /// Outside `cond` nothing is executed, so the scop is trivially valid
    /// there and the context is extended accordingly.
    pub fn restrict(mut self, ctx: &Ctx, cond: &IntegerSet) -> ScopResult<Scop> {
        log::debug!("restricting scop to {}", cond);
        for kind in SkipKind::ALL {
            if let Some(skip) = self.take_skip(kind) {
                let skip = restrict_skip(ctx, &skip, cond)?;
                self.put_skip(kind, Some(skip));
            }
        }

        let valid = self.context.intersect(cond)?.union(&cond.complement()?)?;
        self.context = valid.coalesce()?.remove_nested_params()?;

        for stmt in &mut self.stmts {
            stmt.domain = stmt.domain.intersect_params(cond)?;
        }
        Ok(self)
    }

    /// Intersect the context with `cond`, ignoring constraints on
    /// nested accesses.
    pub fn restrict_context(mut self, cond: &IntegerSet) -> ScopResult<Scop> {
        self.context = self.context.intersect(&cond.remove_nested_params()?)?;
        Ok(self)
    }

    /// Drop all constraints on the parameters.
    pub fn reset_context(mut self) -> Scop {
        self.context = IntegerSet::universe(self.context.space().clone());
        self
    }
}
