//! Integer relations for schedules, access relations and implications.
//!
//! A relation is stored like a set whose columns are the domain columns
//! followed by the range columns. Many operations are implemented by
//! wrapping the relation into a set and back.

use std::fmt;

use crate::polyhedral::aff::{Aff, MultiAff};
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::{AffineExpr, Col};
use crate::polyhedral::operations::intersect_disjuncts;
use crate::polyhedral::set::{fmt_disjuncts, IntegerSet};
use crate::polyhedral::space::{merge_params, Space, Tuple};
use crate::utils::errors::{AlgebraError, AlgebraResult};
use crate::utils::intern::Id;

/// A binary relation between integer tuples.
#[derive(Debug, Clone)]
pub struct IntegerMap {
    pub(crate) space: Space,
    pub(crate) disjuncts: Vec<ConstraintSystem>,
}

impl IntegerMap {
    pub(crate) fn from_parts(space: Space, disjuncts: Vec<ConstraintSystem>) -> Self {
        debug_assert!(space.is_map());
        Self { space, disjuncts }
    }

    pub fn universe(space: Space) -> Self {
        let cs = ConstraintSystem::new(space.n_dim(), space.n_param());
        Self::from_parts(space, vec![cs])
    }

    pub fn empty(space: Space) -> Self {
        Self::from_parts(space, Vec::new())
    }

    /// The relation from `domain` to the anonymous 0-dimensional tuple.
    pub fn from_domain(domain: &IntegerSet) -> Self {
        Self::from_parts(domain.space.from_domain(), domain.disjuncts.clone())
    }

    /// The relation `domain x range`.
    pub fn from_domain_and_range(domain: &IntegerSet, range: &IntegerSet) -> AlgebraResult<Self> {
        let product = domain.flat_product(range)?;
        let space = Space::map(product.space.params.clone(), domain.tuple().clone(), range.tuple().clone());
        Ok(Self::from_parts(space, product.disjuncts))
    }

    /// The graph of `ma`.
    pub fn from_multi_aff(ma: &MultiAff) -> Self {
        let n_in = ma.n_in();
        let n_out = ma.n_out();
        let np = ma.n_param();
        let mut cs = ConstraintSystem::new(n_in + n_out, np);
        for (j, out) in ma.outputs().iter().enumerate() {
            let mut expr = out.clone();
            expr.insert_dims(n_in, n_out);
            expr.set_coeff(n_in + j, -1);
            cs.add(Constraint::eq_zero(expr));
        }
        Self::from_parts(ma.space().clone(), vec![cs])
    }

    /// The graph of `aff`.
    pub fn from_aff(aff: &Aff) -> Self {
        Self::from_multi_aff(&MultiAff::from_aff(aff))
    }

    pub fn space(&self) -> &Space { &self.space }
    pub fn n_in(&self) -> usize { self.space.n_in() }
    pub fn n_out(&self) -> usize { self.space.n_out() }
    pub fn n_param(&self) -> usize { self.space.n_param() }
    pub fn params_list(&self) -> &[Id] { &self.space.params }
    pub fn disjuncts(&self) -> &[ConstraintSystem] { &self.disjuncts }

    pub fn domain_tuple(&self) -> &Tuple {
        // invariant: relations always have a domain tuple
        self.space.domain.as_ref().unwrap_or(&self.space.range)
    }

    pub fn range_tuple(&self) -> &Tuple { &self.space.range }
    pub fn in_id(&self) -> Option<&Id> { self.domain_tuple().id.as_ref() }
    pub fn out_id(&self) -> Option<&Id> { self.space.range.id.as_ref() }
    pub fn has_out_id(&self) -> bool { self.space.range.id.is_some() }
    pub fn range_is_wrapping(&self) -> bool { self.space.range.is_wrapping() }
    pub fn domain_is_wrapping(&self) -> bool { self.domain_tuple().is_wrapping() }

    pub fn find_param(&self, id: &Id) -> Option<usize> {
        self.space.find_param(id)
    }

    pub fn domain_space(&self) -> Space { self.space.domain_space() }
    pub fn range_space(&self) -> Space { self.space.range_space() }

    /// The set of pairs in this relation.
    pub fn wrap(&self) -> IntegerSet {
        let space = Space::set(
            self.space.params.clone(),
            Tuple::wrapped(self.domain_tuple().clone(), self.space.range.clone()),
        );
        IntegerSet::from_parts(space, self.disjuncts.clone())
    }

    pub fn contains(&self, input: &[i64], output: &[i64], params: &[i64]) -> bool {
        let point: Vec<i64> = input.iter().chain(output).copied().collect();
        self.disjuncts.iter().any(|d| d.is_satisfied(&point, params))
    }

    pub fn domain(&self) -> AlgebraResult<IntegerSet> {
        let set = self.wrap().project_out_dims(self.n_in(), self.n_out())?;
        set.with_tuple(self.domain_tuple().clone())
    }

    pub fn range(&self) -> AlgebraResult<IntegerSet> {
        let set = self.wrap().project_out_dims(0, self.n_in())?;
        set.with_tuple(self.space.range.clone())
    }

    pub fn params(&self) -> AlgebraResult<IntegerSet> {
        self.wrap().params()
    }

    pub fn is_empty(&self) -> AlgebraResult<bool> {
        self.wrap().is_empty()
    }

    pub fn plain_is_empty(&self) -> bool {
        self.disjuncts.is_empty()
    }

    pub fn is_subset(&self, other: &IntegerMap) -> AlgebraResult<bool> {
        self.wrap().is_subset(&other.wrap())
    }

    pub fn is_equal(&self, other: &IntegerMap) -> AlgebraResult<bool> {
        self.wrap().is_equal(&other.wrap())
    }

    pub fn intersect(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        self.wrap().intersect(&other.wrap())?.unwrap()
    }

    pub fn union(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        self.wrap().union(&other.wrap())?.unwrap()
    }

    pub fn subtract(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        self.wrap().subtract(&other.wrap())?.unwrap()
    }

    pub fn coalesce(&self) -> AlgebraResult<IntegerMap> {
        self.wrap().coalesce()?.unwrap()
    }

    pub fn intersect_params(&self, params: &IntegerSet) -> AlgebraResult<IntegerMap> {
        self.wrap().intersect_params(params)?.unwrap()
    }

    pub fn intersect_domain(&self, domain: &IntegerSet) -> AlgebraResult<IntegerMap> {
        if domain.tuple() != self.domain_tuple() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "domain {} of {}",
                domain.space, self.space
            )));
        }
        let range = IntegerSet::universe(self.range_space());
        self.intersect(&IntegerMap::from_domain_and_range(domain, &range)?)
    }

    pub fn intersect_range(&self, range: &IntegerSet) -> AlgebraResult<IntegerMap> {
        if range.tuple() != self.range_tuple() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "range {} of {}",
                range.space, self.space
            )));
        }
        let domain = IntegerSet::universe(self.domain_space());
        self.intersect(&IntegerMap::from_domain_and_range(&domain, range)?)
    }

    /// The inverse relation.
    pub fn reverse(&self) -> IntegerMap {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let map: Vec<usize> = (0..n_in).map(|i| n_out + i).chain(0..n_out).collect();
        let disjuncts = self.disjuncts.iter().map(|d| d.remap_dims(&map, n_in + n_out)).collect();
        let space = Space::map(self.space.params.clone(), self.space.range.clone(), self.domain_tuple().clone());
        IntegerMap::from_parts(space, disjuncts)
    }

    /// Compose `self` with `other`: `{ x -> z : x -> y in self, y -> z in other }`.
    pub fn apply_range(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        if self.n_out() != other.n_in() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "apply_range {} to {}",
                other.space, self.space
            )));
        }
        let params = merge_params(&self.space.params, &other.space.params);
        let a = self.align_params(&params);
        let b = other.align_params(&params);
        let (na, nb, nc) = (a.n_in(), a.n_out(), b.n_out());
        let left: Vec<ConstraintSystem> = a.disjuncts.iter()
            .map(|d| { let mut d = d.clone(); d.insert_dims(na + nb, nc); d })
            .collect();
        let right: Vec<ConstraintSystem> = b.disjuncts.iter()
            .map(|d| { let mut d = d.clone(); d.insert_dims(0, na); d })
            .collect();
        let mut disjuncts = Vec::new();
        for d in intersect_disjuncts(&left, &right)? {
            disjuncts.extend(d.project_out_dims(na, nb)?);
        }
        let space = Space::map(params, a.domain_tuple().clone(), b.space.range.clone());
        Ok(IntegerMap::from_parts(space, disjuncts))
    }

    /// `{ y -> z : x -> z in self, x -> y in other }`.
    pub fn apply_domain(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        other.reverse().apply_range(self)
    }

    /// Insert `n` unconstrained output dimensions at `pos` of a flat range.
    pub fn insert_out_dims(&self, pos: usize, n: usize) -> AlgebraResult<IntegerMap> {
        if self.range_is_wrapping() {
            return Err(AlgebraError::Unsupported(format!("inserting dimensions into {}", self.space)));
        }
        let n_in = self.n_in();
        let mut disjuncts = self.disjuncts.clone();
        for d in &mut disjuncts {
            d.insert_dims(n_in + pos, n);
        }
        let mut space = self.space.clone();
        space.range = Tuple::flat(self.out_id().cloned(), self.n_out() + n);
        Ok(IntegerMap::from_parts(space, disjuncts))
    }

    pub fn add_out_dims(&self, n: usize) -> AlgebraResult<IntegerMap> {
        self.insert_out_dims(self.n_out(), n)
    }

    /// Fix output dimension `pos` to `value`.
    pub fn fix_out(&self, pos: usize, value: i64) -> IntegerMap {
        let mut map = self.clone();
        let c = Constraint::fix(self.n_in() + pos, value, self.space.n_dim(), self.n_param());
        for d in &mut map.disjuncts {
            d.add(c.clone());
        }
        map
    }

    /// Equate input dimension `i` with output dimension `o`.
    pub fn equate_in_out(&self, i: usize, o: usize) -> IntegerMap {
        let mut map = self.clone();
        let (n, np) = (self.space.n_dim(), self.n_param());
        let c = Constraint::eq(AffineExpr::var(i, n, np), AffineExpr::var(self.n_in() + o, n, np));
        for d in &mut map.disjuncts {
            d.add(c.clone());
        }
        map
    }

    pub fn set_in_id(&self, id: Option<Id>) -> IntegerMap {
        let mut map = self.clone();
        let tuple = map.domain_tuple().with_id(id);
        map.space.domain = Some(tuple);
        map
    }

    pub fn set_out_id(&self, id: Option<Id>) -> IntegerMap {
        let mut map = self.clone();
        map.space.range = map.space.range.with_id(id);
        map
    }

    /// `[A, C] -> [B, D]` from `A -> B` and `C -> D`, with anonymous flat tuples.
    pub fn flat_product(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        let params = merge_params(&self.space.params, &other.space.params);
        let a = self.align_params(&params);
        let b = other.align_params(&params);
        let (na, nb, nc, nd) = (a.n_in(), a.n_out(), b.n_in(), b.n_out());
        let total = na + nb + nc + nd;
        let map_a: Vec<usize> = (0..na).chain(na + nc..na + nc + nb).collect();
        let map_b: Vec<usize> = (na..na + nc).chain(na + nc + nb..total).collect();
        let left: Vec<ConstraintSystem> = a.disjuncts.iter().map(|d| d.remap_dims(&map_a, total)).collect();
        let right: Vec<ConstraintSystem> = b.disjuncts.iter().map(|d| d.remap_dims(&map_b, total)).collect();
        let disjuncts = intersect_disjuncts(&left, &right)?;
        let space = Space::map(params, Tuple::anonymous(na + nc), Tuple::anonymous(nb + nd));
        Ok(IntegerMap::from_parts(space, disjuncts))
    }

    /// `[A, B] -> R` from `A -> R` and `B -> R`, with an anonymous flat domain.
    pub fn flat_domain_product(&self, other: &IntegerMap) -> AlgebraResult<IntegerMap> {
        if self.range_tuple() != other.range_tuple() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "flat_domain_product {} and {}",
                self.space, other.space
            )));
        }
        let params = merge_params(&self.space.params, &other.space.params);
        let a = self.align_params(&params);
        let b = other.align_params(&params);
        let (na, nb, nr) = (a.n_in(), b.n_in(), a.n_out());
        let total = na + nb + nr;
        let map_a: Vec<usize> = (0..na).chain(na + nb..total).collect();
        let map_b: Vec<usize> = (na..na + nb).chain(na + nb..total).collect();
        let left: Vec<ConstraintSystem> = a.disjuncts.iter().map(|d| d.remap_dims(&map_a, total)).collect();
        let right: Vec<ConstraintSystem> = b.disjuncts.iter().map(|d| d.remap_dims(&map_b, total)).collect();
        let disjuncts = intersect_disjuncts(&left, &right)?;
        let space = Space::map(params, Tuple::anonymous(na + nb), a.space.range.clone());
        Ok(IntegerMap::from_parts(space, disjuncts))
    }

    /// `{ x -> y : ma(x) -> y in self }`.
    pub fn preimage_domain_multi_aff(&self, ma: &MultiAff) -> AlgebraResult<IntegerMap> {
        if ma.n_out() != self.n_in() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "preimage of {} under {}",
                self.space, ma.space()
            )));
        }
        let params = merge_params(&self.space.params, &ma.space().params);
        let map = self.align_params(&params);
        let ma = ma.align_params(&params);
        let (n_x, n_out) = (ma.n_in(), map.n_out());
        let np = params.len();
        let mut values: Vec<AffineExpr> = ma.outputs().iter()
            .map(|e| { let mut e = e.clone(); e.insert_dims(n_x, n_out); e })
            .collect();
        values.extend((0..n_out).map(|j| AffineExpr::var(n_x + j, n_x + n_out, np)));
        let mut disjuncts = Vec::with_capacity(map.disjuncts.len());
        for d in &map.disjuncts {
            let mut out = ConstraintSystem::new(n_x + n_out, np);
            for c in &d.constraints {
                out.constraints.push(Constraint::new(c.expr.substitute_dims(&values, n_x + n_out)?, c.kind));
            }
            if let Some(out) = out.simplify() {
                disjuncts.push(out);
            }
        }
        let domain = ma.space().domain_tuple().clone();
        let space = Space::map(params, domain, map.space.range.clone());
        Ok(IntegerMap::from_parts(space, disjuncts))
    }

    /// For a relation with domain `[D -> A]`, project out the `A` part.
    pub fn domain_factor_domain(&self) -> AlgebraResult<IntegerMap> {
        let (d, a) = match self.domain_tuple().unwrap_pair() {
            Some((d, a)) => (d.clone(), a.dim()),
            None => return Ok(self.clone()),
        };
        let mut disjuncts = Vec::with_capacity(self.disjuncts.len());
        for cs in &self.disjuncts {
            disjuncts.extend(cs.clone().project_out_dims(d.dim(), a)?);
        }
        let space = Space::map(self.space.params.clone(), d, self.space.range.clone());
        Ok(IntegerMap::from_parts(space, disjuncts))
    }

    /// Replace the domain tuple by `[D -> tag]` without adding dimensions.
    pub fn tag_domain(&self, tag: Tuple) -> IntegerMap {
        let mut map = self.clone();
        map.space.domain = Some(Tuple::wrapped(self.domain_tuple().clone(), tag));
        map
    }

    /// `{ [x -> y] -> x : x -> y in self }`.
    pub fn domain_map(&self) -> IntegerMap {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let np = self.n_param();
        let total = n_in + n_out + n_in;
        let disjuncts = self.disjuncts.iter()
            .map(|d| {
                let mut d = d.clone();
                d.insert_dims(n_in + n_out, n_in);
                for i in 0..n_in {
                    d.add(Constraint::eq(AffineExpr::var(n_in + n_out + i, total, np), AffineExpr::var(i, total, np)));
                }
                d
            })
            .collect();
        let space = Space::map(
            self.space.params.clone(),
            Tuple::wrapped(self.domain_tuple().clone(), self.space.range.clone()),
            self.domain_tuple().clone(),
        );
        IntegerMap::from_parts(space, disjuncts)
    }

    /// The value of output dimension `pos` if it is fixed by an explicit equality.
    pub fn plain_get_fixed_out(&self, pos: usize) -> Option<i64> {
        let col = self.n_in() + pos;
        let mut value = None;
        for d in &self.disjuncts {
            let v = d.equalities().find_map(|c| {
                let a = c.expr.get(Col::Dim(col));
                let only = c.expr.coeffs.iter().enumerate().all(|(i, &x)| i == col || x == 0)
                    && c.expr.param_coeffs.iter().all(|&x| x == 0);
                if only && a.abs() == 1 {
                    Some(-c.expr.constant * a)
                } else {
                    None
                }
            })?;
            match value {
                None => value = Some(v),
                Some(w) if w == v => {}
                Some(_) => return None,
            }
        }
        value
    }

    /// Simplify assuming the domain lies in `context`.
    pub fn gist_domain(&self, context: &IntegerSet) -> AlgebraResult<IntegerMap> {
        if context.is_params() {
            return self.wrap().gist_params(context)?.unwrap();
        }
        let range = IntegerSet::universe(self.range_space());
        let lifted = IntegerMap::from_domain_and_range(context, &range)?;
        self.wrap().gist(&lifted.wrap())?.unwrap()
    }

    pub fn gist_params(&self, context: &IntegerSet) -> AlgebraResult<IntegerMap> {
        self.wrap().gist_params(context)?.unwrap()
    }

    pub fn align_params(&self, params: &[Id]) -> IntegerMap {
        let set = self.wrap().align_params(params);
        IntegerMap::from_parts(
            Space::map(set.space.params.clone(), self.domain_tuple().clone(), self.space.range.clone()),
            set.disjuncts,
        )
    }

    /// Replace parameter `pos` by `value` (over the relation columns) and drop it.
    pub fn substitute_param(&self, pos: usize, value: &AffineExpr) -> AlgebraResult<IntegerMap> {
        self.wrap().substitute_param(pos, value)?.unwrap()
    }

    pub fn reset_user(&self) -> IntegerMap {
        IntegerMap::from_parts(self.space.reset_user(), self.disjuncts.clone())
    }
}

impl fmt::Display for IntegerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_disjuncts(f, &self.space, &self.disjuncts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::intern::Ctx;

    fn shift(ctx: &Ctx, k: i64) -> IntegerMap {
        // { S[i] -> A[i + k] }
        let space = Space::map(vec![], Tuple::named(ctx.id("S"), 1), Tuple::named(ctx.id("A"), 1));
        let mut out = AffineExpr::var(0, 1, 0);
        out.constant = k;
        IntegerMap::from_multi_aff(&MultiAff::new(space, vec![out]))
    }

    #[test]
    fn test_domain_range() {
        let ctx = Ctx::new();
        let map = shift(&ctx, 1);
        let dom = map.domain().unwrap();
        assert_eq!(dom.tuple_id().map(Id::name), Some("S"));
        assert!(dom.plain_is_universe() || dom.contains(&[5], &[]));
        let ran = map.range().unwrap();
        assert_eq!(ran.tuple_id().map(Id::name), Some("A"));
    }

    #[test]
    fn test_apply_range() {
        let ctx = Ctx::new();
        let a = shift(&ctx, 1);
        let b = shift(&ctx, 2).set_in_id(Some(ctx.id("A"))).set_out_id(Some(ctx.id("B")));
        let c = a.apply_range(&b).unwrap();
        assert!(c.contains(&[0], &[3], &[]));
        assert!(!c.contains(&[0], &[2], &[]));
        assert_eq!(c.out_id().map(Id::name), Some("B"));
    }

    #[test]
    fn test_reverse_apply_domain() {
        let ctx = Ctx::new();
        let a = shift(&ctx, 1);
        let r = a.reverse();
        assert!(r.contains(&[4], &[3], &[]));
        let id = a.domain().unwrap().identity();
        let c = id.apply_domain(&a).unwrap();
        assert!(c.contains(&[4], &[3], &[]));
    }

    #[test]
    fn test_insert_fix_equate() {
        let ctx = Ctx::new();
        let map = shift(&ctx, 0).insert_out_dims(0, 1).unwrap().equate_in_out(0, 0);
        assert_eq!(map.n_out(), 2);
        assert!(map.contains(&[7], &[7, 7], &[]));
        let fixed = map.fix_out(0, 3);
        assert_eq!(fixed.plain_get_fixed_out(0), Some(3));
        assert_eq!(map.plain_get_fixed_out(0), None);
    }

    #[test]
    fn test_flat_domain_product() {
        let ctx = Ctx::new();
        let a = IntegerSet::rectangular(&[5]);
        let space = Space::map(vec![], Tuple::anonymous(1), Tuple::anonymous(0));
        let left = IntegerMap::from_domain(&a);
        let right = IntegerMap::universe(space).set_in_id(Some(ctx.id("S")));
        let p = left.flat_domain_product(&right).unwrap();
        assert_eq!(p.n_in(), 2);
        assert!(p.contains(&[4, 100], &[], &[]));
        assert!(!p.contains(&[5, 0], &[], &[]));
    }

    #[test]
    fn test_domain_map() {
        let ctx = Ctx::new();
        let map = shift(&ctx, 1);
        let dm = map.domain_map();
        assert!(dm.domain_is_wrapping());
        assert!(dm.contains(&[2, 3], &[2], &[]));
        assert!(!dm.contains(&[2, 4], &[2], &[]));
    }

    #[test]
    fn test_gist_domain() {
        let ctx = Ctx::new();
        let mut map = shift(&ctx, 0);
        map = map.intersect_domain(&IntegerSet::rectangular(&[4]).set_tuple_id(Some(ctx.id("S")))).unwrap();
        let context = IntegerSet::rectangular(&[4]).set_tuple_id(Some(ctx.id("S")));
        let g = map.gist_domain(&context).unwrap();
        assert_eq!(g.disjuncts()[0].len(), 1);
    }
}
