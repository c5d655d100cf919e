//! Simplification with respect to the context.

use crate::analysis::Scop;
use crate::ir::expr::apply_value_bounds;
use crate::ir::Stmt;
use crate::polyhedral::{IntegerSet, UnionMap};
use crate::transform::Transform;
use crate::utils::errors::{AlgebraResult, ScopResult};
use crate::utils::intern::Ctx;

/// Simplify a scop assuming its context and the given bounds on the
/// values stored in arrays.
#[derive(Debug, Clone)]
pub struct Gist {
    pub value_bounds: UnionMap,
}

impl Transform for Gist {
    fn apply(&self, _ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        Ok(scop.gist(&self.value_bounds)?)
    }

    fn name(&self) -> &str {
        "gist"
    }
}

fn stmt_gist(mut stmt: Stmt, context: &IntegerSet, value_bounds: &UnionMap) -> AlgebraResult<Stmt> {
    let domain = stmt.iteration_domain()?.intersect_params(context)?;
    stmt.args = std::mem::take(&mut stmt.args).into_iter()
        .map(|arg| arg.gist(&domain, value_bounds))
        .collect::<AlgebraResult<_>>()?;
    stmt.body = stmt.body.gist(&domain, value_bounds)?;

    let universe = IntegerSet::universe(domain.space().clone()).intersect_params(context)?;
    let known = if stmt.args.is_empty() {
        universe
    } else {
        apply_value_bounds(&universe, &stmt.args, value_bounds)?
    };
    stmt.domain = stmt.domain.gist(&known)?;
    Ok(stmt)
}

impl Scop {
    /// Drop the constraints that are implied by the context.
    ///
    /// `value_bounds` maps array elements to the values they may hold
    /// and is used to simplify statements whose domain depends on
    /// arguments read from such arrays.
    pub fn gist(mut self, value_bounds: &UnionMap) -> AlgebraResult<Scop> {
        self.context = self.context.coalesce()?;
        for array in &mut self.arrays {
            array.extent = array.extent.gist_params(&self.context)?;
        }
        let context = self.context.clone();
        self.stmts = std::mem::take(&mut self.stmts).into_iter()
            .map(|stmt| stmt_gist(stmt, &context, value_bounds))
            .collect::<AlgebraResult<_>>()?;
        Ok(self)
    }
}
