//! Linear constraints for polyhedral representation.
//!
//! A constraint is a linear inequality, equality or congruence:
//! - Inequality: expr >= 0
//! - Equality: expr = 0
//! - Congruence: expr = 0 modulo m
//!
//! Congruences arise when a variable with a non-unit coefficient is
//! projected out, as in `{ [N] : exists t : N = 2t }`.
//!
//! A [`ConstraintSystem`] is a conjunction of constraints over a fixed
//! number of dimension and parameter columns.

use crate::polyhedral::expr::{AffineExpr, Col};
use num_integer::Integer;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
    /// Divisible: expr = 0 modulo the (positive) value
    Congruence(i64),
}

/// Outcome of normalizing a single constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Holds for every point
    Trivial,
    /// Holds for no point
    Infeasible,
    /// Normalized constraint
    Keep(Constraint),
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a congruence constraint: expr = 0 modulo `modulus`
    pub fn congruent_zero(expr: AffineExpr, modulus: i64) -> Self {
        Self::new(expr, ConstraintKind::Congruence(modulus.abs()))
    }

    /// Create a constraint: lhs >= rhs
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// Create a constraint: lhs <= rhs
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// Create a constraint: lhs = rhs
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// Create a lower bound constraint: var >= lower
    pub fn lower_bound(dim: usize, lower: i64, n_dim: usize, n_param: usize) -> Self {
        // var - lower >= 0
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -lower;
        Self::ge_zero(expr)
    }

    /// Create an upper bound constraint: var <= upper
    pub fn upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        // upper - var >= 0
        let mut expr = -AffineExpr::var(dim, n_dim, n_param);
        expr.constant = upper;
        Self::ge_zero(expr)
    }

    /// Create a strict upper bound constraint: var < upper
    /// In integers, this is equivalent to: var <= upper - 1
    pub fn strict_upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        Self::upper_bound(dim, upper - 1, n_dim, n_param)
    }

    /// Create the constraint var = value.
    pub fn fix(dim: usize, value: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -value;
        Self::eq_zero(expr)
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this is an inequality constraint.
    pub fn is_inequality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Inequality)
    }

    pub fn is_congruence(&self) -> bool {
        matches!(self.kind, ConstraintKind::Congruence(_))
    }

    /// The modulus of a congruence.
    pub fn modulus(&self) -> Option<i64> {
        match self.kind {
            ConstraintKind::Congruence(m) => Some(m),
            _ => None,
        }
    }

    /// Check if this constraint is satisfied by the given point.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        let value = self.expr.evaluate(dim_values, param_values);
        match self.kind {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
            ConstraintKind::Congruence(m) => m != 0 && value.rem_euclid(m) == 0,
        }
    }

    /// Negate the constraint.
    ///
    /// The result is a disjunction: an inequality negates to a single
    /// inequality, an equality to `expr >= 1` or `expr <= -1` and a
    /// congruence modulo `m` to the `m - 1` other residues.
    pub fn negate(&self) -> Vec<Constraint> {
        // expr >= 0 becomes -expr - 1 >= 0
        let mut below = -self.expr.clone();
        below.constant -= 1;
        match self.kind {
            ConstraintKind::Inequality => vec![Self::ge_zero(below)],
            ConstraintKind::Equality => {
                let mut above = self.expr.clone();
                above.constant -= 1;
                vec![Self::ge_zero(above), Self::ge_zero(below)]
            }
            ConstraintKind::Congruence(m) => (1..m)
                .map(|r| {
                    let mut shifted = self.expr.clone();
                    shifted.constant += r;
                    Self::congruent_zero(shifted, m)
                })
                .collect(),
        }
    }

    /// Divide by the coefficient gcd, tightening the constant of inequalities.
    ///
    /// Congruences are reduced to coefficients in `0..m` and a modulus
    /// coprime with their gcd.
    pub fn normalize(self) -> Normalized {
        if let ConstraintKind::Congruence(m) = self.kind {
            return normalize_congruence(self.expr, m);
        }
        let g = self.expr.coeff_gcd();
        if g == 0 {
            let v = self.expr.constant;
            let holds = match self.kind {
                ConstraintKind::Inequality => v >= 0,
                _ => v == 0,
            };
            return if holds { Normalized::Trivial } else { Normalized::Infeasible };
        }
        let mut expr = self.expr;
        match self.kind {
            ConstraintKind::Equality => {
                if expr.constant % g != 0 {
                    return Normalized::Infeasible;
                }
                let sign = if first_nonzero(&expr) < 0 { -1 } else { 1 };
                let g = g * sign;
                expr.constant /= g;
                expr.coeffs.iter_mut().for_each(|c| *c /= g);
                expr.param_coeffs.iter_mut().for_each(|c| *c /= g);
            }
            _ => {
                if g > 1 {
                    expr.constant = expr.constant.div_floor(&g);
                    expr.coeffs.iter_mut().for_each(|c| *c /= g);
                    expr.param_coeffs.iter_mut().for_each(|c| *c /= g);
                }
            }
        }
        Normalized::Keep(Self::new(expr, self.kind))
    }

    /// Does the constraint involve `col`?
    pub fn involves(&self, col: Col) -> bool {
        self.expr.get(col) != 0
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.expr.n_dim()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.expr.n_param()
    }

    /// Convert to string with given names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        if let ConstraintKind::Congruence(m) = self.kind {
            // `e mod m = r` with the constant moved to the right
            let mut lhs = self.expr.clone();
            let rhs = (-lhs.constant).rem_euclid(m);
            lhs.constant = 0;
            let n_terms = lhs.coeffs.iter().chain(&lhs.param_coeffs).filter(|&&c| c != 0).count();
            let text = lhs.to_string_with_names(dim_names, param_names);
            let text = if n_terms > 1 || text.starts_with('-') { format!("({})", text) } else { text };
            return format!("{} mod {} = {}", text, m, rhs);
        }
        // print `lhs >= rhs` with positive terms on the left
        let mut lhs = self.expr.clone();
        let mut rhs = AffineExpr::zero(self.n_dim(), self.n_param());
        if lhs.constant < 0 {
            rhs.constant = -lhs.constant;
            lhs.constant = 0;
        }
        for (l, r) in lhs.coeffs.iter_mut().zip(rhs.coeffs.iter_mut())
            .chain(lhs.param_coeffs.iter_mut().zip(rhs.param_coeffs.iter_mut()))
        {
            if *l < 0 {
                *r = -*l;
                *l = 0;
            }
        }
        let op = if self.is_equality() { "=" } else { ">=" };
        format!(
            "{} {} {}",
            lhs.to_string_with_names(dim_names, param_names),
            op,
            rhs.to_string_with_names(dim_names, param_names)
        )
    }
}

fn normalize_congruence(mut expr: AffineExpr, m: i64) -> Normalized {
    let m = m.abs();
    if m == 0 {
        return Constraint::eq_zero(expr).normalize();
    }
    expr.constant = expr.constant.rem_euclid(m);
    expr.coeffs.iter_mut().chain(expr.param_coeffs.iter_mut()).for_each(|c| *c = c.rem_euclid(m));
    let g = expr.coeff_gcd().gcd(&m);
    if expr.constant % g != 0 {
        return Normalized::Infeasible;
    }
    if g == m {
        return Normalized::Trivial;
    }
    expr.constant /= g;
    expr.coeffs.iter_mut().chain(expr.param_coeffs.iter_mut()).for_each(|c| *c /= g);
    Normalized::Keep(Constraint::congruent_zero(expr, m / g))
}

fn first_nonzero(expr: &AffineExpr) -> i64 {
    expr.coeffs.iter()
        .chain(&expr.param_coeffs)
        .copied()
        .find(|&c| c != 0)
        .unwrap_or(0)
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

/// A system of constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// All constraints in the system
    pub constraints: Vec<Constraint>,
    /// Number of dimensions
    pub n_dim: usize,
    /// Number of parameters
    pub n_param: usize,
}

impl ConstraintSystem {
    /// Create an unconstrained system.
    pub fn new(n_dim: usize, n_param: usize) -> Self {
        Self {
            constraints: Vec::new(),
            n_dim,
            n_param,
        }
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.n_dim(), self.n_dim);
        assert_eq!(constraint.n_param(), self.n_param);
        self.constraints.push(constraint);
    }

    /// Add multiple constraints.
    pub fn add_all(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        for c in constraints {
            self.add(c);
        }
    }

    /// Get all equality constraints.
    pub fn equalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_equality())
    }

    /// Get all congruence constraints.
    pub fn congruences(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_congruence())
    }

    /// Get all inequality constraints.
    pub fn inequalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_inequality())
    }

    /// Check if a point satisfies all constraints.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(dim_values, param_values))
    }

    /// Check if the system has no constraints (describes the universe).
    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Get the number of constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Does any constraint involve `col`?
    pub fn involves(&self, col: Col) -> bool {
        self.constraints.iter().any(|c| c.involves(col))
    }

    /// Conjunction of two systems over the same columns.
    pub fn conjoin(&self, other: &ConstraintSystem) -> ConstraintSystem {
        let mut result = self.clone();
        result.constraints.extend(other.constraints.iter().cloned());
        result
    }

    /// Insert `n` unconstrained dimensions at `pos`.
    pub fn insert_dims(&mut self, pos: usize, n: usize) {
        for c in &mut self.constraints {
            c.expr.insert_dims(pos, n);
        }
        self.n_dim += n;
    }

    /// Remove the dimensions `pos..pos + n`, which must no longer be involved.
    pub fn remove_dims(&mut self, pos: usize, n: usize) {
        for c in &mut self.constraints {
            c.expr.remove_dims(pos, n);
        }
        self.n_dim -= n;
    }

    /// Insert `n` unconstrained parameters at `pos`.
    pub fn insert_params(&mut self, pos: usize, n: usize) {
        for c in &mut self.constraints {
            c.expr.insert_params(pos, n);
        }
        self.n_param += n;
    }

    /// Remove parameter `pos`, which must no longer be involved.
    pub fn remove_param(&mut self, pos: usize) {
        for c in &mut self.constraints {
            c.expr.remove_param(pos);
        }
        self.n_param -= 1;
    }

    /// Move dimension `i` to column `map[i]` of a system with `n_dim` dimensions.
    pub fn remap_dims(&self, map: &[usize], n_dim: usize) -> ConstraintSystem {
        ConstraintSystem {
            constraints: self.constraints.iter()
                .map(|c| Constraint::new(c.expr.remap_dims(map, n_dim), c.kind))
                .collect(),
            n_dim,
            n_param: self.n_param,
        }
    }

    /// Move parameter `i` to column `map[i]` of a system with `n_param` parameters.
    pub fn remap_params(&self, map: &[usize], n_param: usize) -> ConstraintSystem {
        ConstraintSystem {
            constraints: self.constraints.iter()
                .map(|c| Constraint::new(c.expr.remap_params(map, n_param), c.kind))
                .collect(),
            n_dim: self.n_dim,
            n_param,
        }
    }
}

impl fmt::Display for ConstraintSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.constraints.iter().enumerate() {
            if i > 0 { write!(f, " and ")?; }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_bound() {
        // i >= 0
        let c = Constraint::lower_bound(0, 0, 2, 0);
        assert!(c.is_satisfied(&[0, 0], &[]));
        assert!(c.is_satisfied(&[5, 0], &[]));
        assert!(!c.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_upper_bound() {
        // i <= 10
        let c = Constraint::upper_bound(0, 10, 2, 0);
        assert!(c.is_satisfied(&[10, 0], &[]));
        assert!(c.is_satisfied(&[5, 0], &[]));
        assert!(!c.is_satisfied(&[11, 0], &[]));
    }

    #[test]
    fn test_equality() {
        // i = 5
        let c = Constraint::fix(0, 5, 1, 0);
        assert!(c.is_satisfied(&[5], &[]));
        assert!(!c.is_satisfied(&[4], &[]));
    }

    #[test]
    fn test_negate_equality() {
        let c = Constraint::fix(0, 5, 1, 0);
        let negated = c.negate();
        assert_eq!(negated.len(), 2);
        assert!(negated.iter().any(|n| n.is_satisfied(&[4], &[])));
        assert!(negated.iter().any(|n| n.is_satisfied(&[6], &[])));
        assert!(!negated.iter().any(|n| n.is_satisfied(&[5], &[])));
    }

    #[test]
    fn test_normalize_tightens() {
        // 2i - 3 >= 0 becomes i - 2 >= 0
        let mut expr = AffineExpr::var(0, 1, 0).scale(2);
        expr.constant = -3;
        match Constraint::ge_zero(expr).normalize() {
            Normalized::Keep(c) => {
                assert_eq!(c.expr.coeffs, vec![1]);
                assert_eq!(c.expr.constant, -2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_normalize_infeasible_equality() {
        // 2i = 1 has no integer solution
        let mut expr = AffineExpr::var(0, 1, 0).scale(2);
        expr.constant = -1;
        assert_eq!(Constraint::eq_zero(expr).normalize(), Normalized::Infeasible);
        assert_eq!(Constraint::ge_zero(AffineExpr::constant(0, 1, 0)).normalize(), Normalized::Trivial);
    }

    #[test]
    fn test_congruence() {
        // i + 3 = 0 mod 2, i.e. i is odd
        let mut expr = AffineExpr::var(0, 1, 0);
        expr.constant = 3;
        let c = Constraint::congruent_zero(expr, 2);
        assert!(c.is_satisfied(&[1], &[]));
        assert!(c.is_satisfied(&[-3], &[]));
        assert!(!c.is_satisfied(&[4], &[]));
        let negated = c.negate();
        assert_eq!(negated.len(), 1);
        assert!(negated[0].is_satisfied(&[4], &[]));
        assert_eq!(c.to_string_with_names(&["i".to_string()], &[]), "i mod 2 = 1");
    }

    #[test]
    fn test_normalize_congruence() {
        // 4i + 2 = 0 mod 6 is 2i + 1 = 0 mod 3
        let mut expr = AffineExpr::var(0, 1, 0).scale(4);
        expr.constant = 2;
        match Constraint::congruent_zero(expr, 6).normalize() {
            Normalized::Keep(c) => {
                assert_eq!(c.kind, ConstraintKind::Congruence(3));
                assert_eq!(c.expr.coeffs, vec![2]);
                assert_eq!(c.expr.constant, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        // 2i + 1 = 0 mod 4 has no solution, 2i = 0 mod 2 always holds
        let mut odd = AffineExpr::var(0, 1, 0).scale(2);
        odd.constant = 1;
        assert_eq!(Constraint::congruent_zero(odd, 4).normalize(), Normalized::Infeasible);
        let even = AffineExpr::var(0, 1, 0).scale(2);
        assert_eq!(Constraint::congruent_zero(even, 2).normalize(), Normalized::Trivial);
    }

    #[test]
    fn test_constraint_system() {
        let mut sys = ConstraintSystem::new(2, 0);
        // 0 <= i < 10
        sys.add(Constraint::lower_bound(0, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(0, 10, 2, 0));
        // 0 <= j < 10
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(1, 10, 2, 0));

        assert!(sys.is_satisfied(&[0, 0], &[]));
        assert!(sys.is_satisfied(&[5, 5], &[]));
        assert!(sys.is_satisfied(&[9, 9], &[]));
        assert!(!sys.is_satisfied(&[10, 0], &[]));
        assert!(!sys.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_remap_dims() {
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::lower_bound(0, 3, 2, 0));
        let moved = sys.remap_dims(&[1, 0], 2);
        assert!(moved.is_satisfied(&[0, 3], &[]));
        assert!(!moved.is_satisfied(&[3, 0], &[]));
    }
}
