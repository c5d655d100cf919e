//! Integer sets: finite unions of integer polyhedra.
//!
//! Iteration domains, contexts and array extents are all integer sets. A set
//! lives in a [`Space`] and is represented by a list of disjuncts, each a
//! [`ConstraintSystem`] over the set columns and the parameters.

use std::fmt;

use crate::polyhedral::aff::MultiAff;
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::{AffineExpr, Col};
use crate::polyhedral::map::IntegerMap;
use crate::polyhedral::operations::{
    coalesce_disjuncts, complement_disjuncts, disjuncts_are_empty, gist_disjuncts,
    intersect_disjuncts, subtract_disjuncts, MAX_DISJUNCTS,
};
use crate::polyhedral::space::{merge_params, Space, Tuple};
use crate::utils::errors::{AlgebraError, AlgebraResult};
use crate::utils::intern::Id;

/// An integer set defined by a union of affine constraint systems.
#[derive(Debug, Clone)]
pub struct IntegerSet {
    pub(crate) space: Space,
    pub(crate) disjuncts: Vec<ConstraintSystem>,
}

/// Re-express `disjuncts` over `params`, a superset of `old`.
pub(crate) fn align_disjuncts(
    disjuncts: &[ConstraintSystem],
    old: &[Id],
    params: &[Id],
) -> Vec<ConstraintSystem> {
    if old == params {
        return disjuncts.to_vec();
    }
    let map: Vec<usize> = old.iter()
        .map(|p| params.iter().position(|q| q == p).unwrap_or(0))
        .collect();
    disjuncts.iter().map(|d| d.remap_params(&map, params.len())).collect()
}

impl IntegerSet {
    pub(crate) fn from_parts(space: Space, disjuncts: Vec<ConstraintSystem>) -> Self {
        Self { space, disjuncts }
    }

    /// The set of all points in `space`.
    pub fn universe(space: Space) -> Self {
        let cs = ConstraintSystem::new(space.n_dim(), space.n_param());
        Self { space, disjuncts: vec![cs] }
    }

    /// The empty set in `space`.
    pub fn empty(space: Space) -> Self {
        Self { space, disjuncts: Vec::new() }
    }

    /// The universe of a parameter space.
    pub fn params_universe(params: Vec<Id>) -> Self {
        Self::universe(Space::params(params))
    }

    /// An anonymous box `0 <= x_i < bounds[i]`.
    pub fn rectangular(bounds: &[i64]) -> Self {
        let n_dim = bounds.len();
        let mut set = Self::universe(Space::set(vec![], Tuple::anonymous(n_dim)));
        for (i, &bound) in bounds.iter().enumerate() {
            set.add_constraint(Constraint::lower_bound(i, 0, n_dim, 0));
            set.add_constraint(Constraint::strict_upper_bound(i, bound, n_dim, 0));
        }
        set
    }

    pub fn space(&self) -> &Space { &self.space }
    pub fn dim(&self) -> usize { self.space.n_out() }
    pub fn n_param(&self) -> usize { self.space.n_param() }
    pub fn params_list(&self) -> &[Id] { &self.space.params }
    pub fn tuple(&self) -> &Tuple { &self.space.range }
    pub fn tuple_id(&self) -> Option<&Id> { self.space.range.id.as_ref() }
    pub fn has_tuple_id(&self) -> bool { self.space.range.id.is_some() }
    pub fn is_wrapping(&self) -> bool { self.space.range.is_wrapping() }
    pub fn is_params(&self) -> bool { self.space.is_params() }
    pub fn disjuncts(&self) -> &[ConstraintSystem] { &self.disjuncts }

    pub fn find_param(&self, id: &Id) -> Option<usize> {
        self.space.find_param(id)
    }

    /// Add a constraint to every disjunct.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        for d in &mut self.disjuncts {
            d.add(constraint.clone());
        }
    }

    /// Check if the point (with the given parameter values) is in the set.
    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        self.disjuncts.iter().any(|d| d.is_satisfied(point, params))
    }

    /// The set has no disjuncts.
    pub fn plain_is_empty(&self) -> bool {
        self.disjuncts.is_empty()
    }

    /// Some disjunct is unconstrained.
    pub fn plain_is_universe(&self) -> bool {
        self.disjuncts.iter().any(ConstraintSystem::is_unconstrained)
    }

    pub fn is_empty(&self) -> AlgebraResult<bool> {
        disjuncts_are_empty(&self.disjuncts)
    }

    /// Is every element of `self` in `other`? Sets in different spaces are unrelated.
    pub fn is_subset(&self, other: &IntegerSet) -> AlgebraResult<bool> {
        if !self.space.same_tuples(&other.space) {
            return Ok(false);
        }
        self.subtract(other)?.is_empty()
    }

    pub fn is_equal(&self, other: &IntegerSet) -> AlgebraResult<bool> {
        Ok(self.is_subset(other)? && other.is_subset(self)?)
    }

    /// Both sets re-expressed over a common parameter list.
    pub(crate) fn aligned_with(&self, other: &IntegerSet) -> (IntegerSet, IntegerSet) {
        if self.space.params == other.space.params {
            return (self.clone(), other.clone());
        }
        let params = merge_params(&self.space.params, &other.space.params);
        (self.align_params(&params), other.align_params(&params))
    }

    fn check_same_tuples(&self, other: &IntegerSet, op: &str) -> AlgebraResult<()> {
        if !self.space.same_tuples(&other.space) {
            return Err(AlgebraError::SpaceMismatch(format!(
                "{}: {} vs {}",
                op, self.space, other.space
            )));
        }
        Ok(())
    }

    pub fn intersect(&self, other: &IntegerSet) -> AlgebraResult<IntegerSet> {
        if other.is_params() && !self.is_params() {
            return self.intersect_params(other);
        }
        self.check_same_tuples(other, "intersect")?;
        let (a, b) = self.aligned_with(other);
        let disjuncts = intersect_disjuncts(&a.disjuncts, &b.disjuncts)?;
        Ok(IntegerSet::from_parts(a.space, disjuncts))
    }

    /// Intersect with a parameter set.
    pub fn intersect_params(&self, params: &IntegerSet) -> AlgebraResult<IntegerSet> {
        if !params.is_params() {
            return Err(AlgebraError::SpaceMismatch(format!("{} is not a parameter set", params.space)));
        }
        let (a, b) = self.aligned_with(params);
        let lifted: Vec<ConstraintSystem> = b.disjuncts.iter()
            .map(|d| {
                let mut d = d.clone();
                d.insert_dims(0, a.space.n_dim());
                d
            })
            .collect();
        let disjuncts = intersect_disjuncts(&a.disjuncts, &lifted)?;
        Ok(IntegerSet::from_parts(a.space, disjuncts))
    }

    pub fn union(&self, other: &IntegerSet) -> AlgebraResult<IntegerSet> {
        self.check_same_tuples(other, "union")?;
        let (a, b) = self.aligned_with(other);
        let mut disjuncts = a.disjuncts;
        disjuncts.extend(b.disjuncts);
        if disjuncts.len() > MAX_DISJUNCTS {
            return Err(AlgebraError::TooComplex(format!("{} disjuncts", disjuncts.len())));
        }
        Ok(IntegerSet::from_parts(a.space, disjuncts))
    }

    pub fn subtract(&self, other: &IntegerSet) -> AlgebraResult<IntegerSet> {
        self.check_same_tuples(other, "subtract")?;
        let (a, b) = self.aligned_with(other);
        let disjuncts = subtract_disjuncts(&a.disjuncts, &b.disjuncts)?;
        Ok(IntegerSet::from_parts(a.space, disjuncts))
    }

    pub fn complement(&self) -> AlgebraResult<IntegerSet> {
        let disjuncts = complement_disjuncts(&self.disjuncts, self.space.n_dim(), self.space.n_param())?;
        Ok(IntegerSet::from_parts(self.space.clone(), disjuncts))
    }

    pub fn coalesce(&self) -> AlgebraResult<IntegerSet> {
        let disjuncts = coalesce_disjuncts(self.disjuncts.clone())?;
        Ok(IntegerSet::from_parts(self.space.clone(), disjuncts))
    }

    /// Project out the set dimensions `pos..pos + n`.
    ///
    /// The result has an anonymous flat tuple.
    pub fn project_out_dims(&self, pos: usize, n: usize) -> AlgebraResult<IntegerSet> {
        let mut disjuncts = Vec::with_capacity(self.disjuncts.len());
        for d in &self.disjuncts {
            disjuncts.extend(d.clone().project_out_dims(pos, n)?);
        }
        let space = Space::set(self.space.params.clone(), Tuple::anonymous(self.dim() - n));
        Ok(IntegerSet::from_parts(space, disjuncts))
    }

    /// The parameter values for which the set is non-empty.
    pub fn params(&self) -> AlgebraResult<IntegerSet> {
        self.project_out_dims(0, self.dim())
    }

    /// Project out parameter `pos`.
    pub fn project_out_param(&self, pos: usize) -> AlgebraResult<IntegerSet> {
        let mut disjuncts = Vec::with_capacity(self.disjuncts.len());
        for d in &self.disjuncts {
            disjuncts.extend(d.clone().project_out_param(pos)?);
        }
        let mut space = self.space.clone();
        space.params.remove(pos);
        Ok(IntegerSet::from_parts(space, disjuncts))
    }

    /// Project out all parameters standing for nested accesses.
    pub fn remove_nested_params(&self) -> AlgebraResult<IntegerSet> {
        let mut set = self.clone();
        while let Some(pos) = set.space.params.iter().position(Id::is_nested) {
            set = set.project_out_param(pos)?;
        }
        Ok(set)
    }

    /// Insert `n` unconstrained dimensions at `pos` of a flat tuple.
    pub fn insert_dims(&self, pos: usize, n: usize) -> AlgebraResult<IntegerSet> {
        if self.is_wrapping() {
            return Err(AlgebraError::Unsupported(format!("inserting dimensions into {}", self.space)));
        }
        let mut disjuncts = self.disjuncts.clone();
        for d in &mut disjuncts {
            d.insert_dims(pos, n);
        }
        let tuple = Tuple::flat(self.tuple_id().cloned(), self.dim() + n);
        Ok(IntegerSet::from_parts(Space::set(self.space.params.clone(), tuple), disjuncts))
    }

    /// Append `n` unconstrained dimensions.
    pub fn add_dims(&self, n: usize) -> AlgebraResult<IntegerSet> {
        self.insert_dims(self.dim(), n)
    }

    /// Fix dimension `pos` to `value`.
    pub fn fix_dim(&self, pos: usize, value: i64) -> IntegerSet {
        let mut set = self.clone();
        set.add_constraint(Constraint::fix(pos, value, self.space.n_dim(), self.n_param()));
        set
    }

    pub fn lower_bound(&self, pos: usize, value: i64) -> IntegerSet {
        let mut set = self.clone();
        set.add_constraint(Constraint::lower_bound(pos, value, self.space.n_dim(), self.n_param()));
        set
    }

    pub fn upper_bound(&self, pos: usize, value: i64) -> IntegerSet {
        let mut set = self.clone();
        set.add_constraint(Constraint::upper_bound(pos, value, self.space.n_dim(), self.n_param()));
        set
    }

    /// Turn parameter `pos` into a new last set dimension.
    pub fn move_param_to_dim(&self, pos: usize) -> AlgebraResult<IntegerSet> {
        if self.is_wrapping() {
            return Err(AlgebraError::Unsupported(format!("moving a parameter into {}", self.space)));
        }
        let n = self.dim();
        let mut disjuncts = self.disjuncts.clone();
        for d in &mut disjuncts {
            d.insert_dims(n, 1);
            for c in &mut d.constraints {
                let v = c.expr.get(Col::Param(pos));
                c.expr.set(Col::Dim(n), v);
                c.expr.set(Col::Param(pos), 0);
            }
            d.remove_param(pos);
        }
        let mut params = self.space.params.clone();
        params.remove(pos);
        Ok(IntegerSet::from_parts(Space::set(params, Tuple::anonymous(n + 1)), disjuncts))
    }

    /// Replace parameter `pos` by `value`, an expression over the set
    /// columns and parameters, and drop the parameter.
    pub fn substitute_param(&self, pos: usize, value: &AffineExpr) -> AlgebraResult<IntegerSet> {
        let mut disjuncts = Vec::with_capacity(self.disjuncts.len());
        for d in &self.disjuncts {
            let mut d = d.clone();
            for c in &mut d.constraints {
                c.expr = c.expr.substitute(Col::Param(pos), value)?;
            }
            d.remove_param(pos);
            if let Some(d) = d.simplify() {
                disjuncts.push(d);
            }
        }
        let mut space = self.space.clone();
        space.params.remove(pos);
        Ok(IntegerSet::from_parts(space, disjuncts))
    }

    pub fn set_tuple_id(&self, id: Option<Id>) -> IntegerSet {
        let mut set = self.clone();
        set.space.range = set.space.range.with_id(id);
        set
    }

    /// Replace the tuple by one with the same number of dimensions.
    pub fn with_tuple(&self, tuple: Tuple) -> AlgebraResult<IntegerSet> {
        if tuple.dim() != self.dim() {
            return Err(AlgebraError::SpaceMismatch(format!("{} does not fit {}", tuple, self.space)));
        }
        let mut set = self.clone();
        set.space.range = tuple;
        Ok(set)
    }

    /// The set of concatenations of elements of both sets, in an anonymous tuple.
    pub fn flat_product(&self, other: &IntegerSet) -> AlgebraResult<IntegerSet> {
        let (a, b) = self.aligned_with(other);
        let (na, nb) = (a.dim(), b.dim());
        let left: Vec<ConstraintSystem> = a.disjuncts.iter()
            .map(|d| { let mut d = d.clone(); d.insert_dims(na, nb); d })
            .collect();
        let right: Vec<ConstraintSystem> = b.disjuncts.iter()
            .map(|d| { let mut d = d.clone(); d.insert_dims(0, na); d })
            .collect();
        let disjuncts = intersect_disjuncts(&left, &right)?;
        let space = Space::set(a.space.params.clone(), Tuple::anonymous(na + nb));
        Ok(IntegerSet::from_parts(space, disjuncts))
    }

    /// The elements of the domain of `ma` that `ma` maps into this set.
    pub fn preimage_multi_aff(&self, ma: &MultiAff) -> AlgebraResult<IntegerSet> {
        if ma.n_out() != self.dim() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "preimage of {} under {}",
                self.space, ma.space()
            )));
        }
        let params = merge_params(&self.space.params, &ma.space().params);
        let set = self.align_params(&params);
        let ma = ma.align_params(&params);
        let n_in = ma.n_in();
        let mut disjuncts = Vec::with_capacity(set.disjuncts.len());
        for d in &set.disjuncts {
            let mut out = ConstraintSystem::new(n_in, params.len());
            for c in &d.constraints {
                let expr = c.expr.substitute_dims(ma.outputs(), n_in)?;
                out.constraints.push(Constraint::new(expr, c.kind));
            }
            if let Some(out) = out.simplify() {
                disjuncts.push(out);
            }
        }
        Ok(IntegerSet::from_parts(ma.space().domain_space(), disjuncts))
    }

    /// The identity relation on this set.
    pub fn identity(&self) -> IntegerMap {
        let n = self.dim();
        let np = self.n_param();
        let disjuncts = self.disjuncts.iter()
            .map(|d| {
                let mut d = d.clone();
                d.insert_dims(n, n);
                for i in 0..n {
                    d.add(Constraint::eq(AffineExpr::var(n + i, 2 * n, np), AffineExpr::var(i, 2 * n, np)));
                }
                d
            })
            .collect();
        IntegerMap::from_parts(self.space.map_from_set(), disjuncts)
    }

    /// The relation wrapped by this set.
    pub fn unwrap(&self) -> AlgebraResult<IntegerMap> {
        Ok(IntegerMap::from_parts(self.space.unwrap()?, self.disjuncts.clone()))
    }

    /// Re-express the set over `params` followed by any of its own parameters not in `params`.
    pub fn align_params(&self, params: &[Id]) -> IntegerSet {
        let all = merge_params(params, &self.space.params);
        let disjuncts = align_disjuncts(&self.disjuncts, &self.space.params, &all);
        let mut space = self.space.clone();
        space.params = all;
        IntegerSet::from_parts(space, disjuncts)
    }

    /// Simplify the set assuming `context`, a set in the same space or a parameter set.
    pub fn gist(&self, context: &IntegerSet) -> AlgebraResult<IntegerSet> {
        if context.is_params() && !self.is_params() {
            return self.gist_params(context);
        }
        self.check_same_tuples(context, "gist")?;
        let (a, b) = self.aligned_with(context);
        let disjuncts = gist_disjuncts(&a.disjuncts, &b.disjuncts)?;
        Ok(IntegerSet::from_parts(a.space, disjuncts))
    }

    /// Simplify the set assuming the parameter constraints `context`.
    pub fn gist_params(&self, context: &IntegerSet) -> AlgebraResult<IntegerSet> {
        let lifted = IntegerSet::universe(self.space.clone()).intersect_params(context)?;
        self.gist(&lifted)
    }

    /// Drop the source identity of every identifier.
    pub fn reset_user(&self) -> IntegerSet {
        IntegerSet::from_parts(self.space.reset_user(), self.disjuncts.clone())
    }
}

/// Format a list of disjuncts.
pub(crate) fn fmt_disjuncts(
    f: &mut fmt::Formatter<'_>,
    space: &Space,
    disjuncts: &[ConstraintSystem],
) -> fmt::Result {
    let names = space.column_names();
    let params = space.param_names();
    if !params.is_empty() {
        write!(f, "[{}] -> ", params.join(", "))?;
    }
    write!(f, "{{ ")?;
    if space.is_params() {
        write!(f, ":")?;
    } else {
        write!(f, "{}", space.fmt_tuples(&names))?;
    }
    if disjuncts.is_empty() {
        write!(f, " : false")?;
    } else if !disjuncts.iter().any(ConstraintSystem::is_unconstrained) {
        if !space.is_params() {
            write!(f, " :")?;
        }
        for (i, d) in disjuncts.iter().enumerate() {
            if i > 0 { write!(f, " or")?; }
            let parts: Vec<String> = d.constraints.iter()
                .map(|c| c.to_string_with_names(&names, &params))
                .collect();
            if disjuncts.len() > 1 {
                write!(f, " ({})", parts.join(" and "))?;
            } else {
                write!(f, " {}", parts.join(" and "))?;
            }
        }
    } else if space.is_params() {
        write!(f, " true")?;
    }
    write!(f, " }}")
}

impl fmt::Display for IntegerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_disjuncts(f, &self.space, &self.disjuncts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::intern::Ctx;

    fn n_range(ctx: &Ctx, name: &str) -> IntegerSet {
        // [N] -> { S[i] : 0 <= i < N }
        let n = ctx.id("N");
        let space = Space::set(vec![n], Tuple::named(ctx.id(name), 1));
        let mut set = IntegerSet::universe(space);
        set.add_constraint(Constraint::lower_bound(0, 0, 1, 1));
        let upper = AffineExpr::param(0, 1, 1) - AffineExpr::var(0, 1, 1) - AffineExpr::constant(1, 1, 1);
        set.add_constraint(Constraint::ge_zero(upper));
        set
    }

    #[test]
    fn test_rectangular() {
        let set = IntegerSet::rectangular(&[10, 20]);
        assert!(set.contains(&[0, 0], &[]));
        assert!(set.contains(&[9, 19], &[]));
        assert!(!set.contains(&[10, 0], &[]));
    }

    #[test]
    fn test_params() {
        let ctx = Ctx::new();
        let params = n_range(&ctx, "S").params().unwrap();
        assert!(params.is_params());
        assert!(params.contains(&[], &[1]));
        assert!(!params.contains(&[], &[0]));
    }

    #[test]
    fn test_subset_and_equal() {
        let ctx = Ctx::new();
        let small = IntegerSet::rectangular(&[5]);
        let big = IntegerSet::rectangular(&[10]);
        assert!(small.is_subset(&big).unwrap());
        assert!(!big.is_subset(&small).unwrap());
        assert!(big.is_equal(&big.coalesce().unwrap()).unwrap());
        // different tuples are never subsets
        let named = n_range(&ctx, "S");
        assert!(!small.is_subset(&named).unwrap());
    }

    #[test]
    fn test_intersect_aligns_params() {
        let ctx = Ctx::new();
        let a = n_range(&ctx, "S");
        let m = ctx.id("M");
        let mut b = IntegerSet::universe(Space::set(vec![m], Tuple::named(ctx.id("S"), 1)));
        // i <= M
        b.add_constraint(Constraint::le(AffineExpr::var(0, 1, 1), AffineExpr::param(0, 1, 1)));
        let c = a.intersect(&b).unwrap();
        assert_eq!(c.n_param(), 2);
        assert!(c.contains(&[3], &[10, 3]));
        assert!(!c.contains(&[3], &[10, 2]));
    }

    #[test]
    fn test_complement_of_params() {
        let ctx = Ctx::new();
        let params = n_range(&ctx, "S").params().unwrap();
        let comp = params.complement().unwrap();
        assert!(comp.contains(&[], &[0]));
        assert!(!comp.contains(&[], &[5]));
        assert!(params.union(&comp).unwrap().complement().unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_move_param_to_dim() {
        let ctx = Ctx::new();
        let params = n_range(&ctx, "S").params().unwrap();
        let moved = params.move_param_to_dim(0).unwrap();
        assert_eq!(moved.dim(), 1);
        assert_eq!(moved.n_param(), 0);
        assert!(moved.contains(&[1], &[]));
        assert!(!moved.contains(&[0], &[]));
    }

    #[test]
    fn test_identity_and_unwrap() {
        let set = IntegerSet::rectangular(&[4]);
        let id = set.identity();
        assert_eq!(id.n_in(), 1);
        assert_eq!(id.n_out(), 1);
        let wrapped = id.wrap();
        assert!(wrapped.contains(&[2, 2], &[]));
        assert!(!wrapped.contains(&[2, 3], &[]));
        assert!(wrapped.unwrap().is_ok());
        assert!(set.unwrap().is_err());
    }

    #[test]
    fn test_gist_params() {
        let ctx = Ctx::new();
        let set = n_range(&ctx, "S");
        let context = set.params().unwrap();
        let restricted = set.intersect_params(&context).unwrap();
        assert_eq!(restricted.disjuncts()[0].len(), 3);
        let g = restricted.gist_params(&context).unwrap();
        assert_eq!(g.disjuncts()[0].len(), 2);
        assert!(g.is_equal(&set).unwrap());
    }

    #[test]
    fn test_display() {
        let ctx = Ctx::new();
        let s = n_range(&ctx, "S").to_string();
        assert_eq!(s, "[N] -> { S[i0] : i0 >= 0 and N >= i0 + 1 }");
    }
}
