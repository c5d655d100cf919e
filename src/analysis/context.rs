//! Extraction of the parameter values for which a statement is valid.

use crate::ir::{Expr, OpKind, Stmt};
use crate::polyhedral::IntegerSet;
use crate::utils::errors::AlgebraResult;

/// Restrict `context` to the parameter values for which every access
/// in `expr` is valid.
///
/// For a conditional, the parameters need to be valid for the condition
/// and for at least one of the branches. An affine condition selects the
/// branch: the second argument only needs to be valid where the
/// condition is non-zero and the third where it is zero.
pub fn expr_extract_context(expr: &Expr, context: IntegerSet) -> AlgebraResult<IntegerSet> {
    if let Expr::Op { kind: OpKind::Cond, args } = expr {
        if let [cond, then, other] = args.as_slice() {
            return cond_extract_context(cond, then, other, context);
        }
    }
    let mut context = context;
    for arg in expr.args() {
        context = expr_extract_context(arg, context)?;
    }
    if let Expr::Access(acc) = expr {
        context = context.intersect(&acc.access.params()?)?;
    }
    Ok(context)
}

fn cond_extract_context(
    cond: &Expr,
    then: &Expr,
    other: &Expr,
    context: IntegerSet,
) -> AlgebraResult<IntegerSet> {
    let context = expr_extract_context(cond, context)?;
    let mut then_context = expr_extract_context(then, context.clone())?;
    let mut else_context = expr_extract_context(other, context)?;

    if let Some(acc) = cond.as_access().filter(|acc| acc.is_affine()) {
        let zero = acc.access.fix_out(0, 0).params()?;
        then_context = then_context.subtract(&zero)?;
        else_context = else_context.intersect(&zero)?;
    }

    then_context.union(&else_context)?.coalesce()
}

/// Restrict `context` to the parameter values for which `stmt` is valid.
///
/// An assume statement with an affine argument contributes the values
/// for which the argument is non-zero.
pub fn stmt_extract_context(stmt: &Stmt, context: IntegerSet) -> AlgebraResult<IntegerSet> {
    if stmt.is_assume() {
        if let Some(acc) = stmt.body.arg(0).and_then(Expr::as_access).filter(|acc| acc.is_affine()) {
            let cond = acc.index.pw_aff(0)?.non_zero_set()?.params()?;
            return context.intersect(&cond);
        }
    }

    let mut context = context;
    for arg in &stmt.args {
        context = expr_extract_context(arg, context)?;
    }
    expr_extract_context(&stmt.body, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_multi_pw_aff, parse_set};
    use crate::utils::intern::Ctx;
    use crate::utils::location::Loc;

    fn read(ctx: &Ctx, index: &str) -> Expr {
        Expr::from_index(parse_multi_pw_aff(ctx, index).unwrap()).unwrap()
    }

    fn universe() -> IntegerSet {
        IntegerSet::params_universe(Vec::new())
    }

    #[test]
    fn test_access_context() {
        let ctx = Ctx::new();
        let expr = read(&ctx, "[N] -> { S[] -> A[N] : N >= 2 }");
        let context = expr_extract_context(&expr, universe()).unwrap();
        let expected = parse_set(&ctx, "[N] -> { : N >= 2 }").unwrap();
        assert!(context.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_affine_condition_selects_branch() {
        let ctx = Ctx::new();
        let expr = Expr::op(
            OpKind::Cond,
            vec![
                read(&ctx, "[b] -> { S[] -> [b] }"),
                read(&ctx, "[N] -> { S[] -> A[N] : N >= 0 }"),
                read(&ctx, "[N] -> { S[] -> A[N] : N <= 5 }"),
            ],
        );
        let context = expr_extract_context(&expr, universe()).unwrap();
        // b != 0 needs N >= 0, b = 0 needs N <= 5
        assert!(context.contains(&[], &[1, 7]));
        assert!(!context.contains(&[], &[1, -1]));
        assert!(context.contains(&[], &[0, -1]));
        assert!(!context.contains(&[], &[0, 7]));
    }

    #[test]
    fn test_data_dependent_condition_takes_either_branch() {
        let ctx = Ctx::new();
        let expr = Expr::op(
            OpKind::Cond,
            vec![
                read(&ctx, "{ S[] -> c[] }"),
                read(&ctx, "[N] -> { S[] -> A[N] : N >= 10 }"),
                read(&ctx, "[N] -> { S[] -> A[N] : N <= 0 }"),
            ],
        );
        let context = expr_extract_context(&expr, universe()).unwrap();
        assert!(context.contains(&[], &[12]));
        assert!(context.contains(&[], &[-3]));
        assert!(!context.contains(&[], &[5]));
    }

    #[test]
    fn test_only_affine_assume_restricts_context() {
        let ctx = Ctx::new();
        let affine = Expr::op(OpKind::Assume, vec![read(&ctx, "[N] -> { [] -> [N - 3] }")]);
        let stmt = Stmt::from_expr(&ctx, Loc::dummy(), None, 0, affine).unwrap();
        let context = stmt_extract_context(&stmt, universe()).unwrap();
        assert!(!context.contains(&[], &[3]));

        let opaque = Expr::op(OpKind::Assume, vec![read(&ctx, "[N] -> { [] -> c[N] : N >= 2 }")]);
        let stmt = Stmt::from_expr(&ctx, Loc::dummy(), None, 1, opaque).unwrap();
        assert!(stmt.is_assume());
        // only the validity of the access itself is kept
        let context = stmt_extract_context(&stmt, universe()).unwrap();
        assert!(context.contains(&[], &[3]));
        assert!(!context.contains(&[], &[1]));
    }
}
