//! Affine and piecewise affine functions.
//!
//! - [`Aff`]: a single affine function on a domain space
//! - [`MultiAff`]: a tuple of affine functions (schedules, projections)
//! - [`PwAff`]: a piecewise affine function with explicit piece domains
//! - [`MultiPwAff`]: a tuple of piecewise affine functions (index expressions)

use std::fmt;

use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::{AffineExpr, Col};
use crate::polyhedral::map::IntegerMap;
use crate::polyhedral::operations::intersect_disjuncts;
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::{merge_params, Space, Tuple};
use crate::utils::errors::{AlgebraError, AlgebraResult};
use crate::utils::intern::Id;

/// Remap an expression from parameter list `old` to `params`, a superset.
fn align_expr(expr: &AffineExpr, old: &[Id], params: &[Id]) -> AffineExpr {
    if old == params {
        return expr.clone();
    }
    let map: Vec<usize> = old.iter()
        .map(|p| params.iter().position(|q| q == p).unwrap_or(0))
        .collect();
    expr.remap_params(&map, params.len())
}

/// An affine function from a domain space to a single anonymous value.
#[derive(Debug, Clone)]
pub struct Aff {
    space: Space,
    expr: AffineExpr,
}

impl Aff {
    /// Create the function `expr` on the set space `domain`.
    pub fn new(domain: &Space, expr: AffineExpr) -> Self {
        let space = Space::map(domain.params.clone(), domain.range.clone(), Tuple::anonymous(1));
        Self { space, expr }
    }

    pub fn zero_on_domain(domain: &Space) -> Self {
        Self::new(domain, AffineExpr::zero(domain.n_out(), domain.n_param()))
    }

    pub fn val_on_domain(domain: &Space, value: i64) -> Self {
        Self::new(domain, AffineExpr::constant(value, domain.n_out(), domain.n_param()))
    }

    /// The function returning dimension `pos` of its argument.
    pub fn var_on_domain(domain: &Space, pos: usize) -> Self {
        Self::new(domain, AffineExpr::var(pos, domain.n_out(), domain.n_param()))
    }

    pub fn space(&self) -> &Space { &self.space }
    pub fn expr(&self) -> &AffineExpr { &self.expr }
    pub fn n_in(&self) -> usize { self.space.n_in() }
    pub fn n_param(&self) -> usize { self.space.n_param() }
    pub fn domain_space(&self) -> Space { self.space.domain_space() }

    pub fn find_param(&self, id: &Id) -> Option<usize> {
        self.space.find_param(id)
    }

    pub fn eval(&self, point: &[i64], params: &[i64]) -> i64 {
        self.expr.evaluate(point, params)
    }

    pub fn align_params(&self, params: &[Id]) -> Aff {
        let all = merge_params(params, &self.space.params);
        let expr = align_expr(&self.expr, &self.space.params, &all);
        let mut space = self.space.clone();
        space.params = all;
        Aff { space, expr }
    }

    /// `self ∘ ma`.
    pub fn pullback(&self, ma: &MultiAff) -> AlgebraResult<Aff> {
        let pulled = MultiAff::from_aff(self).pullback(ma)?;
        let expr = pulled.outputs[0].clone();
        Ok(Aff::new(&pulled.space.domain_space(), expr))
    }
}

impl fmt::Display for Aff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", MultiAff::from_aff(self))
    }
}

/// A tuple of affine functions on a common domain.
#[derive(Debug, Clone)]
pub struct MultiAff {
    space: Space,
    /// Output expressions (one per output dimension)
    outputs: Vec<AffineExpr>,
}

impl MultiAff {
    /// Create from a map space and one expression per output dimension.
    pub fn new(space: Space, outputs: Vec<AffineExpr>) -> Self {
        debug_assert_eq!(space.n_out(), outputs.len());
        Self { space, outputs }
    }

    /// The identity function on the set space `domain`.
    pub fn identity(domain: &Space) -> Self {
        let n = domain.n_out();
        let np = domain.n_param();
        let outputs = (0..n).map(|i| AffineExpr::var(i, n, np)).collect();
        Self { space: domain.map_from_set(), outputs }
    }

    /// The function mapping everything to zero in the range of `space`.
    pub fn zero(space: Space) -> Self {
        let n_in = space.n_in();
        let np = space.n_param();
        let outputs = (0..space.n_out()).map(|_| AffineExpr::zero(n_in, np)).collect();
        Self { space, outputs }
    }

    pub fn from_aff(aff: &Aff) -> Self {
        Self { space: aff.space.clone(), outputs: vec![aff.expr.clone()] }
    }

    /// Project the set space `domain` onto its first `range.dim()` dimensions.
    pub fn prefix_projection(domain: &Space, range: Tuple) -> AlgebraResult<Self> {
        let n = domain.n_out();
        if range.dim() > n {
            return Err(AlgebraError::SpaceMismatch(format!(
                "cannot project {} onto {} dimensions",
                domain,
                range.dim()
            )));
        }
        let np = domain.n_param();
        let outputs = (0..range.dim()).map(|i| AffineExpr::var(i, n, np)).collect();
        let space = Space::map(domain.params.clone(), domain.range.clone(), range);
        Ok(Self { space, outputs })
    }

    pub fn space(&self) -> &Space { &self.space }
    pub fn outputs(&self) -> &[AffineExpr] { &self.outputs }

    /// Get input dimensions.
    pub fn n_in(&self) -> usize { self.space.n_in() }

    /// Get output dimensions.
    pub fn n_out(&self) -> usize { self.space.n_out() }

    /// Get number of parameters.
    pub fn n_param(&self) -> usize { self.space.n_param() }

    /// Apply the function to a point.
    pub fn apply(&self, input: &[i64], params: &[i64]) -> Vec<i64> {
        self.outputs.iter()
            .map(|expr| expr.evaluate(input, params))
            .collect()
    }

    /// Check if this is an identity function.
    pub fn is_identity(&self) -> bool {
        self.n_in() == self.n_out()
            && self.outputs.iter().enumerate().all(|(i, e)| {
                *e == AffineExpr::var(i, self.n_in(), self.n_param())
            })
    }

    pub fn align_params(&self, params: &[Id]) -> MultiAff {
        let all = merge_params(params, &self.space.params);
        let outputs = self.outputs.iter().map(|e| align_expr(e, &self.space.params, &all)).collect();
        let mut space = self.space.clone();
        space.params = all;
        MultiAff { space, outputs }
    }

    /// Compose two functions: `self` after `other`.
    pub fn pullback(&self, other: &MultiAff) -> AlgebraResult<MultiAff> {
        if self.n_in() != other.n_out() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "pullback of {} by {}",
                self.space, other.space
            )));
        }
        let params = merge_params(&self.space.params, &other.space.params);
        let outer = self.align_params(&params);
        let inner = other.align_params(&params);
        let n_in = inner.n_in();
        let outputs = outer.outputs.iter()
            .map(|e| e.substitute_dims(&inner.outputs, n_in))
            .collect::<AlgebraResult<_>>()?;
        let space = Space::map(params, inner.space.domain_tuple().clone(), outer.space.range.clone());
        Ok(MultiAff { space, outputs })
    }

    /// Drop the outputs `pos..pos + n`; the range becomes an anonymous flat tuple.
    pub fn drop_outputs(&self, pos: usize, n: usize) -> MultiAff {
        let mut outputs = self.outputs.clone();
        outputs.drain(pos..pos + n);
        let mut space = self.space.clone();
        space.range = Tuple::anonymous(outputs.len());
        MultiAff { space, outputs }
    }

    pub fn set_out_id(&self, id: Option<Id>) -> MultiAff {
        let mut ma = self.clone();
        ma.space.range = ma.space.range.with_id(id);
        ma
    }

    /// Replace the range tuple by one with the same number of dimensions.
    pub fn set_out_tuple(&self, tuple: Tuple) -> AlgebraResult<MultiAff> {
        if tuple.dim() != self.n_out() {
            return Err(AlgebraError::SpaceMismatch(format!("{} does not fit {}", tuple, self.space)));
        }
        let mut ma = self.clone();
        ma.space.range = tuple;
        Ok(ma)
    }

    /// The function `x -> [self(x), other(x)]`.
    pub fn flat_range_product(&self, other: &MultiAff) -> AlgebraResult<MultiAff> {
        if self.n_in() != other.n_in() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "range product of {} and {}",
                self.space, other.space
            )));
        }
        let params = merge_params(&self.space.params, &other.space.params);
        let a = self.align_params(&params);
        let b = other.align_params(&params);
        let mut outputs = a.outputs;
        outputs.extend(b.outputs);
        let space = Space::map(params, a.space.domain_tuple().clone(), Tuple::anonymous(outputs.len()));
        Ok(MultiAff { space, outputs })
    }

    /// Extend `D -> R` to `[D -> A] -> [R -> A]` for the argument tuple `args`.
    pub fn lift_wrapped(&self, args: &Tuple) -> MultiAff {
        let n_in = self.n_in();
        let n_arg = args.dim();
        let np = self.n_param();
        let mut outputs: Vec<AffineExpr> = self.outputs.iter()
            .map(|e| { let mut e = e.clone(); e.insert_dims(n_in, n_arg); e })
            .collect();
        outputs.extend((0..n_arg).map(|k| AffineExpr::var(n_in + k, n_in + n_arg, np)));
        let space = Space::map(
            self.space.params.clone(),
            Tuple::wrapped(self.space.domain_tuple().clone(), args.clone()),
            Tuple::wrapped(self.space.range.clone(), args.clone()),
        );
        MultiAff { space, outputs }
    }
}

impl fmt::Display for MultiAff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.space.domain_space().column_names();
        let params = self.space.param_names();
        if !params.is_empty() {
            write!(f, "[{}] -> ", params.join(", "))?;
        }
        let outs: Vec<String> = self.outputs.iter().map(|e| e.to_string_with_names(&names, &params)).collect();
        let domain = self.space.domain_tuple().fmt_with(&names, &mut 0);
        write!(f, "{{ {} -> {}", domain, self.space.range.fmt_with(&outs, &mut 0))?;
        write!(f, " }}")
    }
}

/// A piecewise affine function with a single anonymous output.
#[derive(Debug, Clone)]
pub struct PwAff {
    space: Space,
    pieces: Vec<(IntegerSet, AffineExpr)>,
}

/// The subset of `set` where `constraint` holds.
fn restrict(set: &IntegerSet, constraint: Constraint) -> AlgebraResult<IntegerSet> {
    let mut cs = ConstraintSystem::new(set.space.n_dim(), set.n_param());
    cs.add(constraint);
    set.intersect(&IntegerSet::from_parts(set.space.clone(), vec![cs]))
}

impl PwAff {
    pub fn from_aff(aff: &Aff) -> Self {
        let domain = IntegerSet::universe(aff.domain_space());
        Self { space: aff.space.clone(), pieces: vec![(domain, aff.expr.clone())] }
    }

    /// The function with no pieces on the set space `domain`.
    pub fn empty(domain: &Space) -> Self {
        let space = Space::map(domain.params.clone(), domain.range.clone(), Tuple::anonymous(1));
        Self { space, pieces: Vec::new() }
    }

    /// The function that is 1 on `set ∩ dom` and 0 on the rest of `dom`.
    ///
    /// `set` may also be a parameter set.
    pub fn indicator(set: &IntegerSet, dom: &IntegerSet) -> AlgebraResult<PwAff> {
        let inside = if set.is_params() && !dom.is_params() {
            dom.intersect_params(set)?
        } else {
            dom.intersect(set)?
        };
        let outside = dom.subtract(&inside)?;
        let params = merge_params(&inside.space.params, &outside.space.params);
        let inside = inside.align_params(&params).coalesce()?;
        let outside = outside.align_params(&params).coalesce()?;
        let domain = inside.space.clone();
        let (n, np) = (domain.n_out(), params.len());
        let mut pieces = Vec::with_capacity(2);
        if !inside.is_empty()? {
            pieces.push((inside, AffineExpr::constant(1, n, np)));
        }
        if !outside.is_empty()? {
            pieces.push((outside, AffineExpr::constant(0, n, np)));
        }
        let space = Space::map(params, domain.range, Tuple::anonymous(1));
        Ok(PwAff { space, pieces })
    }

    pub fn space(&self) -> &Space { &self.space }
    pub fn pieces(&self) -> &[(IntegerSet, AffineExpr)] { &self.pieces }
    pub fn n_in(&self) -> usize { self.space.n_in() }
    pub fn domain_space(&self) -> Space { self.space.domain_space() }

    pub fn find_param(&self, id: &Id) -> Option<usize> {
        self.space.find_param(id)
    }

    /// The value at `point`, if it lies in the domain.
    pub fn eval(&self, point: &[i64], params: &[i64]) -> Option<i64> {
        self.pieces.iter()
            .find(|(set, _)| set.contains(point, params))
            .map(|(_, e)| e.evaluate(point, params))
    }

    /// The union of the piece domains.
    pub fn domain(&self) -> AlgebraResult<IntegerSet> {
        let mut domain = IntegerSet::empty(self.domain_space());
        for (set, _) in &self.pieces {
            domain = domain.union(set)?;
        }
        domain.coalesce()
    }

    /// The part of the domain where the function is not zero.
    pub fn non_zero_set(&self) -> AlgebraResult<IntegerSet> {
        let mut result = IntegerSet::empty(self.domain_space());
        for (set, expr) in &self.pieces {
            let mut pos = expr.clone();
            pos.constant -= 1;
            let mut neg = -expr.clone();
            neg.constant -= 1;
            result = result
                .union(&restrict(set, Constraint::ge_zero(pos))?)?
                .union(&restrict(set, Constraint::ge_zero(neg))?)?;
        }
        result.coalesce()
    }

    /// The part of the domain where the function is zero.
    pub fn zero_set(&self) -> AlgebraResult<IntegerSet> {
        let mut result = IntegerSet::empty(self.domain_space());
        for (set, expr) in &self.pieces {
            result = result.union(&restrict(set, Constraint::eq_zero(expr.clone()))?)?;
        }
        result.coalesce()
    }

    pub fn intersect_domain(&self, domain: &IntegerSet) -> AlgebraResult<PwAff> {
        let mut pieces = Vec::with_capacity(self.pieces.len());
        for (set, expr) in &self.pieces {
            let set = if domain.is_params() { set.intersect_params(domain)? } else { set.intersect(domain)? };
            if !set.is_empty()? {
                pieces.push((set, expr.clone()));
            }
        }
        Ok(PwAff::from_pieces(self.space.clone(), pieces))
    }

    fn from_pieces(space: Space, pieces: Vec<(IntegerSet, AffineExpr)>) -> PwAff {
        let params = pieces.iter().fold(space.params.clone(), |ps, (set, _)| merge_params(&ps, &set.space.params));
        let mut pa = PwAff { space, pieces };
        if params != pa.space.params {
            pa = pa.align_params(&params);
        }
        pa
    }

    pub fn align_params(&self, params: &[Id]) -> PwAff {
        let all = merge_params(params, &self.space.params);
        let pieces = self.pieces.iter()
            .map(|(set, expr)| {
                // piece parameters always match the function parameters
                (set.align_params(&all), align_expr(expr, &self.space.params, &all))
            })
            .collect();
        let mut space = self.space.clone();
        space.params = all;
        PwAff { space, pieces }
    }

    /// `self ∘ ma`.
    pub fn pullback(&self, ma: &MultiAff) -> AlgebraResult<PwAff> {
        if ma.n_out() != self.n_in() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "pullback of {} by {}",
                self.space, ma.space()
            )));
        }
        let params = merge_params(&self.space.params, &ma.space().params);
        let pa = self.align_params(&params);
        let ma = ma.align_params(&params);
        let mut pieces = Vec::with_capacity(pa.pieces.len());
        for (set, expr) in &pa.pieces {
            let set = set.preimage_multi_aff(&ma)?;
            if set.plain_is_empty() {
                continue;
            }
            pieces.push((set, expr.substitute_dims(ma.outputs(), ma.n_in())?));
        }
        let space = Space::map(params, ma.space().domain_tuple().clone(), Tuple::anonymous(1));
        Ok(PwAff { space, pieces })
    }

    /// Simplify the pieces assuming the domain lies in `context`.
    pub fn gist_domain(&self, context: &IntegerSet) -> AlgebraResult<PwAff> {
        let mut pieces = Vec::with_capacity(self.pieces.len());
        for (set, expr) in &self.pieces {
            let meets = if context.is_params() {
                set.intersect_params(context)?
            } else {
                set.intersect(context)?
            };
            if meets.is_empty()? {
                continue;
            }
            pieces.push((set.gist(context)?, expr.clone()));
        }
        Ok(PwAff::from_pieces(self.space.clone(), pieces))
    }

    /// Replace parameter `pos` by `value` (over the domain columns) and drop it.
    pub fn substitute_param(&self, pos: usize, value: &AffineExpr) -> AlgebraResult<PwAff> {
        let mut pieces = Vec::with_capacity(self.pieces.len());
        for (set, expr) in &self.pieces {
            let set = set.substitute_param(pos, value)?;
            let mut expr = expr.substitute(Col::Param(pos), value)?;
            expr.remove_param(pos);
            pieces.push((set, expr));
        }
        let mut space = self.space.clone();
        space.params.remove(pos);
        Ok(PwAff { space, pieces })
    }

    /// The graph of the function.
    pub fn to_map(&self) -> IntegerMap {
        let n_in = self.n_in();
        let mut disjuncts = Vec::new();
        for (set, expr) in &self.pieces {
            let mut value = expr.clone();
            value.insert_dims(n_in, 1);
            value.set_coeff(n_in, -1);
            for d in &set.disjuncts {
                let mut d = d.clone();
                d.insert_dims(n_in, 1);
                d.add(Constraint::eq_zero(value.clone()));
                disjuncts.push(d);
            }
        }
        IntegerMap::from_parts(self.space.clone(), disjuncts)
    }

    pub fn reset_user(&self) -> PwAff {
        PwAff {
            space: self.space.reset_user(),
            pieces: self.pieces.iter().map(|(s, e)| (s.reset_user(), e.clone())).collect(),
        }
    }
}

impl fmt::Display for PwAff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", MultiPwAff::from_pw_aff(self.clone()))
    }
}

/// A tuple of piecewise affine functions on a common domain.
#[derive(Debug, Clone)]
pub struct MultiPwAff {
    space: Space,
    pw: Vec<PwAff>,
}

impl MultiPwAff {
    /// Create from a map space and one piecewise function per output dimension.
    pub fn new(space: Space, pw: Vec<PwAff>) -> Self {
        let params = pw.iter().fold(space.params.clone(), |ps, pa| merge_params(&ps, &pa.space.params));
        let pw = pw.iter().map(|pa| pa.align_params(&params)).collect();
        let mut space = space;
        space.params = params;
        Self { space, pw }
    }

    /// The function mapping everything to zero in the range of `space`.
    pub fn zero(space: Space) -> Self {
        let domain = space.domain_space();
        let pw = (0..space.n_out())
            .map(|_| PwAff::from_aff(&Aff::zero_on_domain(&domain)))
            .collect();
        Self { space, pw }
    }

    /// The identity function on the set space `domain`.
    pub fn identity(domain: &Space) -> Self {
        Self::from_multi_aff(&MultiAff::identity(domain))
    }

    pub fn from_pw_aff(pa: PwAff) -> Self {
        Self { space: pa.space.clone(), pw: vec![pa] }
    }

    pub fn from_aff(aff: &Aff) -> Self {
        Self::from_pw_aff(PwAff::from_aff(aff))
    }

    pub fn from_multi_aff(ma: &MultiAff) -> Self {
        let domain = ma.space().domain_space();
        let pw = ma.outputs().iter()
            .map(|e| PwAff::from_aff(&Aff::new(&domain, e.clone())))
            .collect();
        Self { space: ma.space().clone(), pw }
    }

    /// Extract a function from a single-valued relation whose outputs are
    /// all defined by unit equalities.
    pub fn from_map(map: &IntegerMap) -> AlgebraResult<Self> {
        let (n_in, n_out) = (map.n_in(), map.n_out());
        let np = map.n_param();
        let domain = map.domain_space();
        let mut pw: Vec<Vec<(IntegerSet, AffineExpr)>> = vec![Vec::new(); n_out];
        for d in map.disjuncts() {
            let mut defs: Vec<Option<AffineExpr>> = vec![None; n_out];
            for _ in 0..n_out {
                for c in d.equalities() {
                    for j in 0..n_out {
                        let a = c.expr.coeff(n_in + j);
                        if defs[j].is_some() || a.abs() != 1 {
                            continue;
                        }
                        let others_known = (0..n_out).all(|k| k == j || c.expr.coeff(n_in + k) == 0 || defs[k].is_some());
                        if !others_known {
                            continue;
                        }
                        // a * o_j + rest = 0
                        let mut rest = c.expr.clone();
                        rest.set_coeff(n_in + j, 0);
                        let mut values: Vec<AffineExpr> = (0..n_in).map(|i| AffineExpr::var(i, n_in, np)).collect();
                        for k in 0..n_out {
                            values.push(defs[k].clone().unwrap_or_else(|| AffineExpr::zero(n_in, np)));
                        }
                        let rest = rest.substitute_dims(&values, n_in)?;
                        defs[j] = Some(rest.scale(-a));
                    }
                }
            }
            let piece = IntegerMap::from_parts(map.space.clone(), vec![d.clone()]).domain()?;
            for (j, def) in defs.into_iter().enumerate() {
                let def = def.ok_or_else(|| {
                    AlgebraError::Unsupported(format!("output {} of {} is not affine", j, map))
                })?;
                pw[j].push((piece.clone(), def));
            }
        }
        let pw = pw.into_iter()
            .map(|pieces| PwAff {
                space: Space::map(map.space.params.clone(), domain.range.clone(), Tuple::anonymous(1)),
                pieces,
            })
            .collect();
        Ok(Self { space: map.space.clone(), pw })
    }

    pub fn space(&self) -> &Space { &self.space }
    pub fn n_in(&self) -> usize { self.space.n_in() }
    pub fn n_out(&self) -> usize { self.space.n_out() }
    pub fn n_param(&self) -> usize { self.space.n_param() }
    pub fn domain_space(&self) -> Space { self.space.domain_space() }
    pub fn domain_tuple(&self) -> &Tuple { self.space.domain_tuple() }
    pub fn range_tuple(&self) -> &Tuple { &self.space.range }
    pub fn out_id(&self) -> Option<&Id> { self.space.range.id.as_ref() }
    pub fn has_out_id(&self) -> bool { self.space.range.id.is_some() }
    pub fn range_is_wrapping(&self) -> bool { self.space.range.is_wrapping() }
    pub fn pw_affs(&self) -> &[PwAff] { &self.pw }

    pub fn pw_aff(&self, pos: usize) -> AlgebraResult<&PwAff> {
        self.pw.get(pos).ok_or_else(|| {
            AlgebraError::SpaceMismatch(format!("no output {} in {}", pos, self.space))
        })
    }

    pub fn find_param(&self, id: &Id) -> Option<usize> {
        self.space.find_param(id)
    }

    pub fn set_out_id(&self, id: Option<Id>) -> MultiPwAff {
        let mut mpa = self.clone();
        mpa.space.range = mpa.space.range.with_id(id);
        mpa
    }

    pub fn align_params(&self, params: &[Id]) -> MultiPwAff {
        let all = merge_params(params, &self.space.params);
        let pw = self.pw.iter().map(|pa| pa.align_params(&all)).collect();
        let mut space = self.space.clone();
        space.params = all;
        MultiPwAff { space, pw }
    }

    /// `self ∘ ma`.
    pub fn pullback(&self, ma: &MultiAff) -> AlgebraResult<MultiPwAff> {
        if ma.n_out() != self.n_in() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "pullback of {} by {}",
                self.space, ma.space()
            )));
        }
        let params = merge_params(&self.space.params, &ma.space().params);
        let pw = self.pw.iter()
            .map(|pa| pa.pullback(ma))
            .collect::<AlgebraResult<Vec<_>>>()?;
        let space = Space::map(params, ma.space().domain_tuple().clone(), self.space.range.clone());
        Ok(MultiPwAff::new(space, pw))
    }

    /// The function `x -> [self(x), other(x)]` with an anonymous flat range.
    pub fn flat_range_product(&self, other: &MultiPwAff) -> AlgebraResult<MultiPwAff> {
        if self.n_in() != other.n_in() {
            return Err(AlgebraError::SpaceMismatch(format!(
                "range product of {} and {}",
                self.space, other.space
            )));
        }
        let mut pw = self.pw.clone();
        pw.extend(other.pw.iter().cloned());
        let space = Space::map(
            merge_params(&self.space.params, &other.space.params),
            self.space.domain_tuple().clone(),
            Tuple::anonymous(pw.len()),
        );
        Ok(MultiPwAff::new(space, pw))
    }

    /// The graph of the function.
    pub fn to_map(&self) -> AlgebraResult<IntegerMap> {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let np = self.n_param();
        let mut disjuncts = vec![ConstraintSystem::new(n_in + n_out, np)];
        for (j, pa) in self.pw.iter().enumerate() {
            let graph = pa.align_params(&self.space.params).to_map();
            let map: Vec<usize> = (0..n_in).chain(std::iter::once(n_in + j)).collect();
            let lifted: Vec<ConstraintSystem> = graph.disjuncts.iter()
                .map(|d| d.remap_dims(&map, n_in + n_out))
                .collect();
            disjuncts = intersect_disjuncts(&disjuncts, &lifted)?;
        }
        Ok(IntegerMap::from_parts(self.space.clone(), disjuncts))
    }

    /// Simplify the pieces assuming the domain lies in `context`.
    pub fn gist_domain(&self, context: &IntegerSet) -> AlgebraResult<MultiPwAff> {
        let pw = self.pw.iter()
            .map(|pa| pa.gist_domain(context))
            .collect::<AlgebraResult<Vec<_>>>()?;
        Ok(MultiPwAff::new(self.space.clone(), pw))
    }

    /// Replace parameter `pos` by `value` (over the domain columns) and drop it.
    pub fn substitute_param(&self, pos: usize, value: &AffineExpr) -> AlgebraResult<MultiPwAff> {
        let pw = self.pw.iter()
            .map(|pa| pa.substitute_param(pos, value))
            .collect::<AlgebraResult<Vec<_>>>()?;
        let mut space = self.space.clone();
        space.params.remove(pos);
        Ok(MultiPwAff { space, pw })
    }

    pub fn is_equal(&self, other: &MultiPwAff) -> AlgebraResult<bool> {
        if self.space.range != other.space.range || self.space.domain != other.space.domain {
            return Ok(false);
        }
        self.to_map()?.is_equal(&other.to_map()?)
    }

    pub fn reset_user(&self) -> MultiPwAff {
        MultiPwAff {
            space: self.space.reset_user(),
            pw: self.pw.iter().map(PwAff::reset_user).collect(),
        }
    }
}

impl fmt::Display for MultiPwAff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.space.domain_space().column_names();
        let params = self.space.param_names();
        if !params.is_empty() {
            write!(f, "[{}] -> ", params.join(", "))?;
        }
        let outs: Vec<String> = self.pw.iter()
            .map(|pa| {
                let parts: Vec<String> = pa.pieces.iter()
                    .map(|(set, e)| {
                        let value = e.to_string_with_names(&names, &params);
                        if set.plain_is_universe() {
                            value
                        } else {
                            let conds: Vec<String> = set.disjuncts.iter()
                                .map(|d| {
                                    d.constraints.iter()
                                        .map(|c| c.to_string_with_names(&names, &params))
                                        .collect::<Vec<_>>()
                                        .join(" and ")
                                })
                                .collect();
                            format!("{} : {}", value, conds.join(" or "))
                        }
                    })
                    .collect();
                if parts.len() == 1 && pa.pieces[0].0.plain_is_universe() {
                    parts[0].clone()
                } else {
                    format!("({})", parts.join("; "))
                }
            })
            .collect();
        let domain = self.space.domain_tuple().fmt_with(&names, &mut 0);
        write!(f, "{{ {} -> {} }}", domain, self.space.range.fmt_with(&outs, &mut 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::intern::Ctx;

    #[test]
    fn test_identity_apply() {
        let ctx = Ctx::new();
        let space = Space::set(vec![], Tuple::named(ctx.id("S"), 2));
        let id = MultiAff::identity(&space);
        assert!(id.is_identity());
        assert_eq!(id.apply(&[3, 7], &[]), vec![3, 7]);
    }

    #[test]
    fn test_pullback() {
        let ctx = Ctx::new();
        let space = Space::set(vec![], Tuple::named(ctx.id("S"), 2));
        // swap then take the first
        let swap = MultiAff::new(
            space.map_from_set(),
            vec![AffineExpr::var(1, 2, 0), AffineExpr::var(0, 2, 0)],
        );
        let first = Aff::var_on_domain(&space, 0);
        let composed = first.pullback(&swap).unwrap();
        assert_eq!(composed.eval(&[3, 7], &[]), 7);
    }

    #[test]
    fn test_prefix_projection() {
        let ctx = Ctx::new();
        let space = Space::set(vec![], Tuple::named(ctx.id("S"), 3));
        let proj = MultiAff::prefix_projection(&space, Tuple::anonymous(2)).unwrap();
        assert_eq!(proj.apply(&[1, 2, 3], &[]), vec![1, 2]);
        assert!(MultiAff::prefix_projection(&space, Tuple::anonymous(4)).is_err());
    }

    #[test]
    fn test_indicator() {
        let ctx = Ctx::new();
        let b = ctx.id("b");
        let dom = IntegerSet::params_universe(vec![]);
        // [b] -> { : b = 1 }
        let mut cond = IntegerSet::params_universe(vec![b]);
        cond.add_constraint(Constraint::eq_zero(AffineExpr::param(0, 0, 1) - AffineExpr::constant(1, 0, 1)));
        let pa = PwAff::indicator(&cond, &dom).unwrap();
        assert_eq!(pa.eval(&[], &[1]), Some(1));
        assert_eq!(pa.eval(&[], &[2]), Some(0));
        let nz = pa.non_zero_set().unwrap();
        assert!(nz.contains(&[], &[1]));
        assert!(!nz.contains(&[], &[0]));
        let z = pa.zero_set().unwrap();
        assert!(z.contains(&[], &[0]));
        assert!(!z.contains(&[], &[1]));
    }

    #[test]
    fn test_mpa_to_map() {
        let ctx = Ctx::new();
        let space = Space::set(vec![], Tuple::named(ctx.id("S"), 1));
        let mut plus_one = AffineExpr::var(0, 1, 0);
        plus_one.constant = 1;
        let ma = MultiAff::new(
            Space::map(vec![], space.range.clone(), Tuple::named(ctx.id("A"), 2)),
            vec![AffineExpr::var(0, 1, 0), plus_one],
        );
        let map = MultiPwAff::from_multi_aff(&ma).to_map().unwrap();
        assert!(map.contains(&[4], &[4, 5], &[]));
        assert!(!map.contains(&[4], &[4, 4], &[]));
        let back = MultiPwAff::from_map(&map).unwrap();
        assert!(back.is_equal(&MultiPwAff::from_multi_aff(&ma)).unwrap());
    }

    #[test]
    fn test_zero_dimensional_range() {
        let ctx = Ctx::new();
        let space = Space::map(vec![], Tuple::named(ctx.id("S"), 1), Tuple::named(ctx.id("T"), 0));
        let mpa = MultiPwAff::zero(space);
        assert_eq!(mpa.n_out(), 0);
        assert!(!mpa.to_map().unwrap().plain_is_empty());
        assert_eq!(mpa.out_id().map(Id::name), Some("T"));
    }

    #[test]
    fn test_lift_wrapped() {
        let ctx = Ctx::new();
        let space = Space::set(vec![], Tuple::named(ctx.id("S"), 1));
        let ma = MultiAff::identity(&space);
        let lifted = ma.lift_wrapped(&Tuple::anonymous(2));
        assert_eq!(lifted.n_in(), 3);
        assert_eq!(lifted.apply(&[1, 2, 3], &[]), vec![1, 2, 3]);
        assert!(lifted.space().domain_tuple().is_wrapping());
    }
}
