//! Operations on the outer dimensions of domains and schedules.

use crate::analysis::Scop;
use crate::polyhedral::{IntegerSet, MultiAff, Space};
use crate::transform::Transform;
use crate::utils::errors::{AlgebraResult, ScopResult};
use crate::utils::intern::Ctx;

/// Prefix every schedule with a constant dimension.
#[derive(Debug, Clone, Copy)]
pub struct Prefix {
    pub pos: i64,
}

impl Transform for Prefix {
    fn apply(&self, _ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        Ok(scop.prefix(self.pos)?)
    }

    fn name(&self) -> &str {
        "prefix"
    }
}

/// Intersect the outer dimensions of every domain with a set.
#[derive(Debug, Clone)]
pub struct IntersectDomainPrefix {
    pub domain: IntegerSet,
}

impl Transform for IntersectDomainPrefix {
    fn apply(&self, _ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        Ok(scop.intersect_domain_prefix(&self.domain)?)
    }

    fn name(&self) -> &str {
        "intersect_domain_prefix"
    }
}

/// The elements of `space` whose first dimensions lie in `prefix`.
fn lift_prefix(prefix: &IntegerSet, space: &Space) -> AlgebraResult<IntegerSet> {
    let projection = MultiAff::prefix_projection(space, prefix.tuple().clone())?;
    prefix.preimage_multi_aff(&projection)
}

impl Scop {
    /// Prefix every schedule with an extra dimension fixed to `pos`.
    ///
    /// Used to order the parts of a sequence.
    pub fn prefix(mut self, pos: i64) -> AlgebraResult<Scop> {
        for stmt in &mut self.stmts {
            stmt.schedule = stmt.schedule.insert_out_dims(0, 1)?.fix_out(0, pos);
        }
        Ok(self)
    }

    /// Intersect the initial dimensions of the statement domains with
    /// `domain`.
    ///
    /// Virtual arrays and implications range over the same iterations as
    /// the statements writing them, so they are restricted too.
    pub fn intersect_domain_prefix(mut self, domain: &IntegerSet) -> AlgebraResult<Scop> {
        log::trace!("intersecting domain prefix with {}", domain);
        for array in self.arrays.iter_mut().filter(|a| a.is_virtual()) {
            let prefix = lift_prefix(domain, array.extent.space())?;
            array.extent = array.extent.intersect(&prefix)?;
        }
        for stmt in &mut self.stmts {
            let prefix = lift_prefix(domain, stmt.domain.space())?;
            stmt.domain = stmt.domain.intersect(&prefix)?;
        }
        for implication in &mut self.implications {
            let prefix = lift_prefix(domain, &implication.extension.domain_space())?;
            implication.extension = implication.extension.intersect_domain(&prefix)?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_map, parse_multi_pw_aff, parse_set};
    use crate::ir::{Array, Expr, Implication, Stmt};
    use crate::utils::location::Loc;

    fn scop(ctx: &Ctx) -> Scop {
        let lhs = Expr::write_access(parse_multi_pw_aff(ctx, "{ S[i, j] -> A[i, j] }").unwrap()).unwrap();
        let stmt = Stmt {
            loc: Loc::dummy(),
            domain: parse_set(ctx, "{ S[i, j] : 0 <= i < 10 and 0 <= j < 10 }").unwrap(),
            schedule: parse_map(ctx, "{ S[i, j] -> [i, j] }").unwrap(),
            body: Expr::assign(lhs, Expr::Int(0)),
            args: Vec::new(),
        };
        Scop::from_stmt(stmt).unwrap()
    }

    #[test]
    fn test_prefix_schedule() {
        let ctx = Ctx::new();
        let scop = Prefix { pos: 3 }.apply(&ctx, scop(&ctx)).unwrap();
        let expected = parse_map(&ctx, "{ S[i, j] -> [3, i, j] }").unwrap();
        assert!(scop.stmts[0].schedule.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_intersect_domain_prefix() {
        let ctx = Ctx::new();
        ctx.virtual_id("__pet_test_0");
        let mut scop = scop(&ctx);
        scop.arrays.push(Array::new(parse_set(&ctx, "{ A[i, j] }").unwrap(), "int", 4));
        scop.arrays.push(Array::new(parse_set(&ctx, "{ __pet_test_0[i, j] : 0 <= i, j < 10 }").unwrap(), "int", 4));
        scop.implications.push(Implication::new(
            parse_map(&ctx, "{ __pet_test_0[i, j] -> __pet_test_0[i, k] : k <= j }").unwrap(),
            true,
        ));
        let prefix = parse_set(&ctx, "{ [i] : i < 4 }").unwrap();
        let scop = scop.intersect_domain_prefix(&prefix).unwrap();

        let domain = &scop.stmts[0].domain;
        assert!(domain.contains(&[3, 9], &[]));
        assert!(!domain.contains(&[4, 0], &[]));
        assert!(scop.arrays[0].extent.contains(&[7, 7], &[]));
        assert!(!scop.arrays[1].extent.contains(&[7, 7], &[]));
        assert!(!scop.implications[0].extension.contains(&[5, 1], &[5, 0], &[]));
        assert!(scop.implications[0].extension.contains(&[2, 1], &[2, 0], &[]));
    }

    #[test]
    fn test_prefix_of_wrapped_domain() {
        let ctx = Ctx::new();
        let mut scop = scop(&ctx);
        scop.stmts[0].domain = parse_set(&ctx, "{ [S[i, j] -> [t]] : 0 <= i < 10 and 0 <= j < 10 and t = 1 }").unwrap();
        let prefix = parse_set(&ctx, "{ [i] : i >= 8 }").unwrap();
        let scop = scop.intersect_domain_prefix(&prefix).unwrap();
        assert!(scop.stmts[0].domain.contains(&[9, 0, 1], &[]));
        assert!(!scop.stmts[0].domain.contains(&[2, 0, 1], &[]));
    }
}
