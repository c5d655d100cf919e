//! Parameter bookkeeping.

use crate::analysis::Scop;
use crate::ir::{Array, Stmt};
use crate::polyhedral::space::merge_params;
use crate::utils::errors::AlgebraResult;
use crate::utils::intern::Id;

fn array_collect_params(array: &Array, params: Vec<Id>) -> Vec<Id> {
    let params = merge_params(&params, array.context.params_list());
    merge_params(&params, array.extent.params_list())
}

fn stmt_collect_params(stmt: &Stmt, params: Vec<Id>) -> Vec<Id> {
    let params = merge_params(&params, stmt.domain.params_list());
    let params = merge_params(&params, stmt.schedule.params_list());
    let params = stmt.args.iter().fold(params, |ps, arg| arg.collect_params(ps));
    stmt.body.collect_params(params)
}

fn array_align_params(mut array: Array, params: &[Id]) -> Array {
    array.context = array.context.align_params(params);
    array.extent = array.extent.align_params(params);
    array.value_bounds = array.value_bounds.map(|bounds| bounds.align_params(params));
    array
}

fn stmt_align_params(mut stmt: Stmt, params: &[Id]) -> AlgebraResult<Stmt> {
    stmt.domain = stmt.domain.align_params(params);
    stmt.schedule = stmt.schedule.align_params(params);
    stmt.args = std::mem::take(&mut stmt.args).into_iter()
        .map(|arg| arg.align_params(params))
        .collect::<AlgebraResult<_>>()?;
    stmt.body = stmt.body.align_params(params)?;
    Ok(stmt)
}

impl Scop {
    /// Every parameter used in the scop, context parameters first.
    pub fn collect_params(&self) -> Vec<Id> {
        let params = self.context.params_list().to_vec();
        let params = self.arrays.iter().fold(params, |ps, array| array_collect_params(array, ps));
        self.stmts.iter().fold(params, |ps, stmt| stmt_collect_params(stmt, ps))
    }

    /// Express every set and relation over the same parameters.
    pub fn align_params(mut self) -> AlgebraResult<Scop> {
        let params = self.collect_params();
        log::debug!("aligning scop on {} parameters", params.len());
        self.context = self.context.align_params(&params);
        self.arrays = std::mem::take(&mut self.arrays).into_iter()
            .map(|array| array_align_params(array, &params))
            .collect();
        self.stmts = std::mem::take(&mut self.stmts).into_iter()
            .map(|stmt| stmt_align_params(stmt, &params))
            .collect::<AlgebraResult<_>>()?;
        Ok(self)
    }

    /// Replace reads of 0-D arrays named after a parameter of the scop by
    /// the value of that parameter.
    pub fn detect_parameter_accesses(mut self) -> AlgebraResult<Scop> {
        let params = self.collect_params();
        for stmt in &mut self.stmts {
            stmt.body = stmt.body.clone().detect_parameter_accesses(&params)?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_multi_pw_aff, parse_set};
    use crate::ir::Expr;
    use crate::utils::intern::Ctx;
    use crate::utils::location::Loc;

    fn assign(ctx: &Ctx, write: &str, read: &str) -> Scop {
        let lhs = Expr::write_access(parse_multi_pw_aff(ctx, write).unwrap()).unwrap();
        let rhs = Expr::from_index(parse_multi_pw_aff(ctx, read).unwrap()).unwrap();
        Scop::from_expr(ctx, Loc::dummy(), None, 0, Expr::assign(lhs, rhs)).unwrap()
    }

    #[test]
    fn test_align_params() {
        let ctx = Ctx::new();
        let mut scop = assign(&ctx, "[N] -> { [] -> A[N] }", "[M] -> { [] -> B[M] }");
        scop.arrays.push(Array::new(parse_set(&ctx, "[K] -> { A[i] : i < K }").unwrap(), "int", 4));
        let scop = scop.align_params().unwrap();
        let names: Vec<&str> = scop.context.params_list().iter().map(Id::name).collect();
        assert_eq!(names.len(), 3);
        for name in ["N", "M", "K"] {
            assert!(names.contains(&name));
        }
        assert_eq!(scop.arrays[0].extent.params_list(), scop.context.params_list());
        assert_eq!(scop.stmts[0].domain.params_list(), scop.context.params_list());
        for acc in scop.stmts[0].body.accesses() {
            assert_eq!(acc.access.params_list(), scop.context.params_list());
        }
    }

    #[test]
    fn test_detect_parameter_accesses() {
        let ctx = Ctx::new();
        let mut scop = assign(&ctx, "{ [] -> A[] }", "{ [] -> N[] }");
        scop.context = parse_set(&ctx, "[N] -> { : N > 0 }").unwrap();
        let scop = scop.detect_parameter_accesses().unwrap();
        let read = scop.stmts[0].body.arg(1).and_then(Expr::as_access).unwrap();
        assert!(read.is_affine());
        assert_eq!(read.index.find_param(&ctx.id("N")), Some(0));
        // writes are left alone
        assert!(!scop.stmts[0].body.arg(0).unwrap().is_affine());
    }
}
