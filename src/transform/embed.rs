//! Embedding a scop in an enclosing loop.
//!
//! The scop represents one iteration of the loop body. Embedding prepends
//! the (possibly virtual) loop iterator to every iteration domain and
//! schedule. `iv_map` expresses the real iterator, which nested
//! statements may refer to as a parameter, in terms of the virtual one:
//!
//! ```text
//! for (i = 10; i > 0; i -= 2)    dom = { [t] : 0 <= t < 5 }
//!   A[i] = 0;                    iv_map = { [t] -> [10 - 2t] }
//! ```

use crate::analysis::{Scop, SkipKind};
use crate::ir::{AccessExpr, Array, Implication, Stmt};
use crate::polyhedral::{Aff, AffineExpr, IntegerMap, IntegerSet, MultiAff, MultiPwAff};
use crate::transform::Transform;
use crate::utils::errors::{AlgebraResult, ErrorKind, ScopResult};
use crate::utils::intern::{Ctx, Id};

/// Wrap a scop in a loop over `domain` with iterator `var_id`.
#[derive(Debug, Clone)]
pub struct Embed {
    /// One-dimensional domain of the virtual iterator
    pub domain: IntegerSet,
    /// Schedule of the virtual iterator
    pub schedule: Aff,
    /// Real iterator in terms of the virtual iterator
    pub iv_map: Aff,
    pub var_id: Id,
}

impl Embed {
    pub fn new(domain: IntegerSet, schedule: Aff, iv_map: Aff, var_id: Id) -> Self {
        Self { domain, schedule, iv_map, var_id }
    }

    /// A loop whose iterator is used directly.
    pub fn identity(domain: IntegerSet, var_id: Id) -> Self {
        let iv = Aff::var_on_domain(domain.space(), 0);
        Self::new(domain, iv.clone(), iv, var_id)
    }
}

impl Transform for Embed {
    fn apply(&self, ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        scop.embed(ctx, &self.domain, &self.schedule, &self.iv_map, &self.var_id)
    }

    fn name(&self) -> &str {
        "embed"
    }
}

/// `iv_map` as an expression over `n_dim` columns whose first column is
/// the virtual iterator.
fn iv_value(iv_map: &Aff, params: &[Id], n_dim: usize) -> AffineExpr {
    let mut value = iv_map.align_params(params).expr().clone();
    value.insert_dims(1, n_dim - 1);
    value
}

/// Replace the parameter `var_id` by `iv_map` applied to the first
/// dimension of `set`.
fn internalize_iv(set: IntegerSet, var_id: &Id, iv_map: &Aff) -> AlgebraResult<IntegerSet> {
    if set.find_param(var_id).is_none() {
        return Ok(set);
    }
    let set = set.align_params(&iv_map.space().params);
    match set.find_param(var_id) {
        Some(pos) => {
            let value = iv_value(iv_map, set.params_list(), set.dim());
            set.substitute_param(pos, &value)
        }
        None => Ok(set),
    }
}

fn internalize_iv_map(map: IntegerMap, var_id: &Id, iv_map: &Aff) -> AlgebraResult<IntegerMap> {
    if map.find_param(var_id).is_none() {
        return Ok(map);
    }
    internalize_iv(map.wrap(), var_id, iv_map)?.unwrap()
}

fn internalize_iv_index(index: MultiPwAff, var_id: &Id, iv_map: &Aff) -> AlgebraResult<MultiPwAff> {
    if index.find_param(var_id).is_none() {
        return Ok(index);
    }
    let index = index.align_params(&iv_map.space().params);
    match index.find_param(var_id) {
        Some(pos) => {
            let value = iv_value(iv_map, &index.space().params, index.n_in());
            index.substitute_param(pos, &value)
        }
        None => Ok(index),
    }
}

struct EmbedAccess<'a> {
    /// Drops the new outer dimension from statement instances
    extend: MultiAff,
    iv_map: &'a Aff,
    var_id: &'a Id,
}

impl EmbedAccess<'_> {
    fn is_iterator(&self, id: Option<&Id>) -> bool {
        id == Some(self.var_id)
    }

    fn relation(&self, access: IntegerMap) -> AlgebraResult<IntegerMap> {
        let is_iterator = self.is_iterator(access.out_id());
        let is_virtual = !access.range_is_wrapping() && access.out_id().map_or(false, Id::is_virtual);
        let mut access = access;
        if is_iterator || is_virtual {
            access = access.insert_out_dims(0, 1)?.equate_in_out(0, 0);
            if is_iterator {
                access = access.apply_range(&IntegerMap::from_aff(self.iv_map))?;
            }
        }
        internalize_iv_map(access, self.var_id, self.iv_map)
    }

    fn index(&self, index: MultiPwAff) -> AlgebraResult<MultiPwAff> {
        let outer = Aff::var_on_domain(&index.domain_space(), 0);
        let index = if self.is_iterator(index.out_id()) {
            let iv = self.iv_map.pullback(&MultiAff::from_aff(&outer))?;
            MultiPwAff::from_aff(&iv)
        } else if !index.range_is_wrapping() && index.out_id().map_or(false, Id::is_virtual) {
            let id = index.out_id().cloned();
            MultiPwAff::from_aff(&outer).flat_range_product(&index)?.set_out_id(id)
        } else {
            index
        };
        internalize_iv_index(index, self.var_id, self.iv_map)
    }

    fn access(&self, acc: AccessExpr) -> AlgebraResult<AccessExpr> {
        let mut acc = acc.update_domain(&self.extend)?;
        acc.access = self.relation(acc.access)?;
        acc.index = self.index(acc.index)?;
        Ok(acc)
    }
}

fn stmt_embed(stmt: Stmt, dom: &IntegerSet, sched: &IntegerMap, iv_map: &Aff, var_id: &Id) -> AlgebraResult<Stmt> {
    let Stmt { loc, domain, schedule, body, args } = stmt;

    let stmt_id;
    let domain = if domain.is_wrapping() {
        let map = domain.unwrap()?;
        stmt_id = map.in_id().cloned();
        let ext = IntegerMap::from_domain_and_range(dom, &IntegerSet::universe(map.range_space()))?;
        ext.flat_domain_product(&map)?.set_in_id(stmt_id.clone()).wrap()
    } else {
        stmt_id = domain.tuple_id().cloned();
        dom.flat_product(&domain)?.set_tuple_id(stmt_id.clone())
    };
    let domain = internalize_iv(domain, var_id, iv_map)?;

    let schedule = sched.flat_product(&schedule)?.set_in_id(stmt_id.clone());
    let schedule = internalize_iv_map(schedule, var_id, iv_map)?;

    let mut stmt = Stmt { loc, domain, schedule, body, args };
    let data = EmbedAccess {
        extend: MultiAff::identity(&stmt.space()).drop_outputs(0, 1).set_out_id(stmt_id),
        iv_map,
        var_id,
    };
    let mut map = |acc: AccessExpr| data.access(acc);
    stmt.args = std::mem::take(&mut stmt.args).into_iter()
        .map(|arg| arg.map_access(&mut map))
        .collect::<AlgebraResult<_>>()?;
    stmt.body = stmt.body.map_access(&mut map)?;
    Ok(stmt)
}

/// Virtual arrays grow along with the iteration domains.
fn array_embed(mut array: Array, dom: &IntegerSet) -> AlgebraResult<Array> {
    if !array.is_virtual() {
        return Ok(array);
    }
    let id = array.extent.tuple_id().cloned();
    array.extent = dom.flat_product(&array.extent)?.set_tuple_id(id);
    Ok(array)
}

/// The extension only relates elements within the same iteration.
fn implication_embed(mut implication: Implication, dom: &IntegerSet) -> AlgebraResult<Implication> {
    let id = implication.extension.in_id().cloned();
    implication.extension = dom.identity()
        .flat_product(&implication.extension)?
        .set_in_id(id.clone())
        .set_out_id(id);
    Ok(implication)
}

/// The parameter values for which `context` holds for every iteration.
///
/// The context only changes if it refers to the real iterator.
fn context_embed(context: IntegerSet, dom: &IntegerSet, iv_map: &Aff, var_id: &Id) -> AlgebraResult<IntegerSet> {
    let pos = match context.find_param(var_id) {
        Some(pos) => pos,
        None => return Ok(context),
    };
    let valid = context.move_param_to_dim(pos)?
        .preimage_multi_aff(&MultiAff::from_aff(iv_map))?
        .with_tuple(dom.tuple().clone())?;
    dom.subtract(&valid)?.params()?.complement()?.remove_nested_params()
}

impl Scop {
    /// Embed the scop in a loop over the one-dimensional `dom`, scheduled
    /// by `sched`.
    ///
    /// `var_id` is the real loop iterator and `iv_map` expresses it in
    /// terms of the iterator of `dom`. Skip conditions are dropped; the
    /// caller accounts for them before embedding.
    pub fn embed(
        mut self,
        ctx: &Ctx,
        dom: &IntegerSet,
        sched: &Aff,
        iv_map: &Aff,
        var_id: &Id,
    ) -> ScopResult<Scop> {
        if dom.dim() != 1 || dom.is_wrapping() {
            return Err(ctx.die(ErrorKind::Invalid, format!("loop domain {} is not one-dimensional", dom)));
        }
        log::debug!("embedding {} statements in loop over {}", self.n_stmt(), var_id);

        for kind in SkipKind::ALL {
            self.put_skip(kind, None);
        }
        self.context = context_embed(self.context, dom, iv_map, var_id)?;

        let sched = IntegerMap::from_aff(sched);
        let stmts = std::mem::take(&mut self.stmts);
        self.stmts = stmts.into_iter()
            .map(|stmt| stmt_embed(stmt, dom, &sched, iv_map, var_id))
            .collect::<AlgebraResult<_>>()?;

        let arrays = std::mem::take(&mut self.arrays);
        self.arrays = arrays.into_iter()
            .map(|array| array_embed(array, dom))
            .collect::<AlgebraResult<_>>()?;

        let implications = std::mem::take(&mut self.implications);
        self.implications = implications.into_iter()
            .map(|implication| implication_embed(implication, dom))
            .collect::<AlgebraResult<_>>()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_map, parse_multi_pw_aff, parse_set};
    use crate::ir::Expr;
    use crate::polyhedral::Space;
    use crate::utils::location::Loc;

    fn inner_scop(ctx: &Ctx, read: &str) -> Scop {
        let lhs = Expr::write_access(parse_multi_pw_aff(ctx, "{ S[i] -> A[i] }").unwrap()).unwrap();
        let rhs = Expr::from_index(parse_multi_pw_aff(ctx, read).unwrap()).unwrap();
        let stmt = Stmt {
            loc: Loc::dummy(),
            domain: parse_set(ctx, "{ S[i] : 0 <= i < 10 }").unwrap(),
            schedule: parse_map(ctx, "{ S[i] -> [i] }").unwrap(),
            body: Expr::assign(lhs, rhs),
            args: Vec::new(),
        };
        let mut scop = Scop::from_stmt(stmt).unwrap();
        scop.arrays.push(Array::new(parse_set(ctx, "{ A[i] }").unwrap(), "int", 4));
        scop
    }

    fn loop_domain(ctx: &Ctx) -> IntegerSet {
        parse_set(ctx, "{ [j] : 0 <= j < 5 }").unwrap()
    }

    #[test]
    fn test_identity_embedding() {
        let ctx = Ctx::new();
        let scop = inner_scop(&ctx, "{ S[i] -> B[i] }");
        let j = ctx.named_id("j");
        let scop = Embed::identity(loop_domain(&ctx), j).apply(&ctx, scop).unwrap();
        let stmt = &scop.stmts[0];
        let expected = parse_set(&ctx, "{ S[j, i] : 0 <= j < 5 and 0 <= i < 10 }").unwrap();
        assert!(stmt.domain.is_equal(&expected).unwrap());
        let schedule = parse_map(&ctx, "{ S[j, i] -> [j, i] }").unwrap();
        assert!(stmt.schedule.is_equal(&schedule).unwrap());

        let write = stmt.body.arg(0).and_then(Expr::as_access).unwrap();
        assert_eq!(write.access.n_in(), 2);
        assert!(write.access.contains(&[3, 4], &[4], &[]));
    }

    #[test]
    fn test_iterator_parameter_is_internalized() {
        let ctx = Ctx::new();
        let scop = inner_scop(&ctx, "[j] -> { S[i] -> B[i + j] }");
        let j = ctx.named_id("j");
        // j = 2t + 1
        let dom = parse_set(&ctx, "{ [t] : 0 <= t < 5 }").unwrap();
        let mut iv = AffineExpr::var(0, 1, 0);
        iv.coeffs[0] = 2;
        iv.constant = 1;
        let iv = Aff::new(dom.space(), iv);
        let sched = Aff::var_on_domain(dom.space(), 0);
        let scop = scop.embed(&ctx, &dom, &sched, &iv, &j).unwrap();

        let read = scop.stmts[0].body.arg(1).and_then(Expr::as_access).unwrap();
        assert_eq!(read.access.n_param(), 0);
        assert!(read.access.contains(&[2, 3], &[8], &[]));
        assert!(!read.access.contains(&[2, 3], &[5], &[]));
    }

    #[test]
    fn test_iterator_access_becomes_value() {
        let ctx = Ctx::new();
        let j = ctx.named_id("j");
        let scop = inner_scop(&ctx, "{ S[i] -> j[] }");
        let scop = scop.embed(&ctx, &loop_domain(&ctx), &Aff::var_on_domain(loop_domain(&ctx).space(), 0),
            &Aff::var_on_domain(loop_domain(&ctx).space(), 0), &j).unwrap();
        let read = scop.stmts[0].body.arg(1).and_then(Expr::as_access).unwrap();
        assert!(read.is_affine());
        assert!(read.access.contains(&[3, 7], &[3], &[]));
    }

    #[test]
    fn test_virtual_arrays_grow() {
        let ctx = Ctx::new();
        ctx.virtual_id("__pet_test_0");
        let mut scop = inner_scop(&ctx, "{ S[i] -> __pet_test_0[i] }");
        scop.arrays.push(Array::new(parse_set(&ctx, "{ __pet_test_0[i] : 0 <= i < 10 }").unwrap(), "int", 4));
        scop.implications.push(Implication::new(
            parse_map(&ctx, "{ __pet_test_0[i] -> __pet_test_0[k] : k <= i }").unwrap(),
            true,
        ));
        let scop = Embed::identity(loop_domain(&ctx), ctx.named_id("j")).apply(&ctx, scop).unwrap();

        assert_eq!(scop.arrays[0].extent.dim(), 1);
        assert_eq!(scop.arrays[1].extent.dim(), 2);
        let read = scop.stmts[0].body.arg(1).and_then(Expr::as_access).unwrap();
        assert_eq!(read.index.n_out(), 2);
        assert!(read.access.contains(&[3, 7], &[3, 7], &[]));
        let extension = &scop.implications[0].extension;
        assert!(extension.contains(&[2, 5], &[2, 4], &[]));
        assert!(!extension.contains(&[2, 5], &[1, 4], &[]));
    }

    #[test]
    fn test_context_holds_for_all_iterations() {
        let ctx = Ctx::new();
        let mut scop = inner_scop(&ctx, "{ S[i] -> B[i] }");
        scop.context = parse_set(&ctx, "[N, j] -> { : j < N }").unwrap();
        let scop = scop.set_skip(SkipKind::Now, parse_multi_pw_aff(&ctx, "{ [] -> [1] }").unwrap());
        let scop = Embed::identity(loop_domain(&ctx), ctx.named_id("j")).apply(&ctx, scop).unwrap();
        assert!(!scop.has_skip(SkipKind::Now));
        assert_eq!(scop.context.n_param(), 1);
        assert!(scop.context.contains(&[], &[5]));
        assert!(!scop.context.contains(&[], &[4]));
    }

    fn stride_two(ctx: &Ctx) -> (IntegerSet, Aff, Aff) {
        let dom = parse_set(ctx, "{ [t] : 0 <= t < 5 }").unwrap();
        let mut iv = AffineExpr::var(0, 1, 0);
        iv.coeffs[0] = 2;
        let iv = Aff::new(dom.space(), iv);
        let sched = Aff::var_on_domain(dom.space(), 0);
        (dom, sched, iv)
    }

    #[test]
    fn test_strided_context_keeps_odd_values() {
        let ctx = Ctx::new();
        let mut scop = inner_scop(&ctx, "{ S[i] -> B[i] }");
        scop.context = parse_set(&ctx, "[N, j] -> { : j < N or j > N }").unwrap();
        let (dom, sched, iv) = stride_two(&ctx);
        let scop = scop.embed(&ctx, &dom, &sched, &iv, &ctx.named_id("j")).unwrap();

        // j = 2t only hits the even values 0..8
        let context = &scop.context;
        assert_eq!(context.n_param(), 1);
        for n in [1, 3, 5, 7, -1, 9] {
            assert!(context.contains(&[], &[n]), "N = {} should be valid", n);
        }
        for n in [0, 2, 4, 6, 8] {
            assert!(!context.contains(&[], &[n]), "N = {} should be invalid", n);
        }
        let expected = parse_set(&ctx, "[N] -> { : N < 0 or N > 8 or N mod 2 = 1 }").unwrap();
        assert!(context.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_strided_domain_parity() {
        let ctx = Ctx::new();
        let lhs = Expr::write_access(parse_multi_pw_aff(&ctx, "{ S[i] -> A[i] }").unwrap()).unwrap();
        let stmt = Stmt {
            loc: Loc::dummy(),
            domain: parse_set(&ctx, "[j] -> { S[i] : 0 <= i < 10 and i = j }").unwrap(),
            schedule: parse_map(&ctx, "{ S[i] -> [i] }").unwrap(),
            body: Expr::assign(lhs, Expr::Int(0)),
            args: Vec::new(),
        };
        let (dom, sched, iv) = stride_two(&ctx);
        let scop = Scop::from_stmt(stmt)
            .unwrap()
            .add_array(Array::new(parse_set(&ctx, "{ A[i] }").unwrap(), "int", 4))
            .embed(&ctx, &dom, &sched, &iv, &ctx.named_id("j"))
            .unwrap();

        let domain = &scop.stmts[0].domain;
        assert_eq!(domain.n_param(), 0);
        assert!(domain.contains(&[2, 4], &[]));
        assert!(!domain.contains(&[2, 5], &[]));
        // only even elements are written
        let written = domain.project_out_dims(0, 1).unwrap();
        assert!(written.contains(&[4], &[]));
        assert!(!written.contains(&[5], &[]));
        assert!(!written.contains(&[10], &[]));
        let writes = scop.collect_may_writes().unwrap();
        let range = writes.maps()[0].range().unwrap();
        assert!(range.contains(&[6], &[]));
        assert!(!range.contains(&[7], &[]));
    }

    #[test]
    fn test_domain_must_be_one_dimensional() {
        let ctx = Ctx::new();
        let dom = IntegerSet::universe(Space::set(Vec::new(), crate::polyhedral::Tuple::anonymous(2)));
        let aff = Aff::var_on_domain(dom.space(), 0);
        let result = inner_scop(&ctx, "{ S[i] -> B[i] }").embed(&ctx, &dom, &aff, &aff, &ctx.named_id("j"));
        assert!(result.is_err());
        assert_eq!(ctx.last_error(), Some(ErrorKind::Invalid));
    }
}
