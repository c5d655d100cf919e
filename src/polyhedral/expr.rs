//! Affine expressions for polyhedral representation.
//!
//! An affine expression is a linear combination of columns plus a constant:
//! `aff(x, p) = c0 + c1*x1 + ... + cn*xn + d1*p1 + ... + dm*pm`
//! where `x` are the (flat) dimension columns and `p` the parameters.

use num_integer::Integer;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};

use crate::utils::errors::{AlgebraError, AlgebraResult};

/// A column of a constraint matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Col {
    Dim(usize),
    Param(usize),
}

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(param_coeff[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single dimension variable.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        expr.set_coeff(dim, 1);
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(param_idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        expr.set_param_coeff(param_idx, 1);
        expr
    }

    /// Check if this is a constant expression.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) &&
        self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Check if this expression is zero.
    pub fn is_zero(&self) -> bool {
        self.constant == 0 && self.is_constant()
    }

    /// Get the constant value if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a dimension.
    pub fn coeff(&self, dim: usize) -> i64 {
        self.coeffs.get(dim).copied().unwrap_or(0)
    }

    /// Get coefficient for a parameter.
    pub fn param_coeff(&self, idx: usize) -> i64 {
        self.param_coeffs.get(idx).copied().unwrap_or(0)
    }

    /// Set coefficient for a dimension.
    pub fn set_coeff(&mut self, dim: usize, value: i64) {
        if dim < self.coeffs.len() {
            self.coeffs[dim] = value;
        }
    }

    /// Set coefficient for a parameter.
    pub fn set_param_coeff(&mut self, idx: usize, value: i64) {
        if idx < self.param_coeffs.len() {
            self.param_coeffs[idx] = value;
        }
    }

    pub fn get(&self, col: Col) -> i64 {
        match col {
            Col::Dim(d) => self.coeff(d),
            Col::Param(p) => self.param_coeff(p),
        }
    }

    pub fn set(&mut self, col: Col, value: i64) {
        match col {
            Col::Dim(d) => self.set_coeff(d, value),
            Col::Param(p) => self.set_param_coeff(p, value),
        }
    }

    /// Does the expression involve any of the dimensions `pos..pos + n`?
    pub fn involves_dims(&self, pos: usize, n: usize) -> bool {
        self.coeffs.iter().skip(pos).take(n).any(|&c| c != 0)
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if let Some(&v) = dim_values.get(i) {
                result += c * v;
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if let Some(&v) = param_values.get(i) {
                result += c * v;
            }
        }
        result
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// Compute `a * self + b * other` with overflow checking.
    pub fn combine(&self, a: i64, other: &AffineExpr, b: i64) -> AlgebraResult<Self> {
        fn lin(x: i64, a: i64, y: i64, b: i64) -> AlgebraResult<i64> {
            x.checked_mul(a)
                .and_then(|l| y.checked_mul(b).and_then(|r| l.checked_add(r)))
                .ok_or(AlgebraError::Overflow("affine combination"))
        }
        debug_assert_eq!(self.n_dim(), other.n_dim());
        debug_assert_eq!(self.n_param(), other.n_param());
        Ok(Self {
            constant: lin(self.constant, a, other.constant, b)?,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&x, &y)| lin(x, a, y, b))
                .collect::<AlgebraResult<_>>()?,
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&x, &y)| lin(x, a, y, b))
                .collect::<AlgebraResult<_>>()?,
        })
    }

    /// Get GCD of the non-constant coefficients (0 if all are zero).
    pub fn coeff_gcd(&self) -> i64 {
        self.coeffs.iter()
            .chain(&self.param_coeffs)
            .fold(0i64, |g, &c| g.gcd(&c))
    }

    /// Do both expressions have the same non-constant part?
    pub fn same_linear(&self, other: &AffineExpr) -> bool {
        self.coeffs == other.coeffs && self.param_coeffs == other.param_coeffs
    }

    /// Is the non-constant part of `other` the negation of ours?
    pub fn opposite_linear(&self, other: &AffineExpr) -> bool {
        self.coeffs.len() == other.coeffs.len()
            && self.param_coeffs.len() == other.param_coeffs.len()
            && self.coeffs.iter().zip(&other.coeffs).all(|(&a, &b)| a == -b)
            && self.param_coeffs.iter().zip(&other.param_coeffs).all(|(&a, &b)| a == -b)
    }

    /// Insert `n` zero dimension columns at `pos`.
    pub fn insert_dims(&mut self, pos: usize, n: usize) {
        self.coeffs.splice(pos..pos, std::iter::repeat(0).take(n));
    }

    /// Remove the dimension columns `pos..pos + n`.
    pub fn remove_dims(&mut self, pos: usize, n: usize) {
        self.coeffs.drain(pos..pos + n);
    }

    /// Insert `n` zero parameter columns at `pos`.
    pub fn insert_params(&mut self, pos: usize, n: usize) {
        self.param_coeffs.splice(pos..pos, std::iter::repeat(0).take(n));
    }

    /// Remove the parameter column `pos`.
    pub fn remove_param(&mut self, pos: usize) {
        self.param_coeffs.remove(pos);
    }

    /// Move every dimension `i` to column `map[i]` of a space with `n_dim` dimensions.
    pub fn remap_dims(&self, map: &[usize], n_dim: usize) -> Self {
        let mut coeffs = vec![0; n_dim];
        for (i, &c) in self.coeffs.iter().enumerate() {
            coeffs[map[i]] += c;
        }
        Self { constant: self.constant, coeffs, param_coeffs: self.param_coeffs.clone() }
    }

    /// Move every parameter `i` to column `map[i]` of a space with `n_param` parameters.
    pub fn remap_params(&self, map: &[usize], n_param: usize) -> Self {
        let mut param_coeffs = vec![0; n_param];
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            param_coeffs[map[i]] += c;
        }
        Self { constant: self.constant, coeffs: self.coeffs.clone(), param_coeffs }
    }

    /// Replace `col` by `value` (an expression of the same shape).
    ///
    /// The coefficient of `col` in the result is zero, unless `value` involves it.
    pub fn substitute(&self, col: Col, value: &AffineExpr) -> AlgebraResult<Self> {
        let c = self.get(col);
        if c == 0 {
            return Ok(self.clone());
        }
        let mut base = self.clone();
        base.set(col, 0);
        base.combine(1, value, c)
    }

    /// Replace every dimension `i` by `values[i]`, each an expression over
    /// `n_dim` dimensions and the same parameters.
    pub fn substitute_dims(&self, values: &[AffineExpr], n_dim: usize) -> AlgebraResult<Self> {
        let mut result = Self {
            constant: self.constant,
            coeffs: vec![0; n_dim],
            param_coeffs: self.param_coeffs.clone(),
        };
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                result = result.combine(1, &values[i], c)?;
            }
        }
        Ok(result)
    }

    /// Convert to string with given dimension and parameter names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut parts = Vec::new();

        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                let default_name = format!("d{}", i);
                let name = dim_names.get(i)
                    .map(|s| s.as_str())
                    .unwrap_or(&default_name);
                parts.push(term(c, name));
            }
        }

        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                let default_name = format!("p{}", i);
                let name = param_names.get(i)
                    .map(|s| s.as_str())
                    .unwrap_or(&default_name);
                parts.push(term(c, name));
            }
        }

        if self.constant != 0 || parts.is_empty() {
            parts.push(format!("{}", self.constant));
        }

        parts.join(" + ").replace("+ -", "- ")
    }
}

fn term(c: i64, name: &str) -> String {
    match c {
        1 => name.to_string(),
        -1 => format!("-{}", name),
        _ => format!("{}{}", c, name),
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a + b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b).collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant - other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a - b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a - b).collect(),
        }
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let expr = AffineExpr::constant(5, 2, 1);
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(&[1, 2], &[3]), 5);
    }

    #[test]
    fn test_var() {
        let expr = AffineExpr::var(0, 2, 0);
        assert!(!expr.is_constant());
        assert_eq!(expr.evaluate(&[7, 3], &[]), 7);
    }

    #[test]
    fn test_add() {
        let e1 = AffineExpr::var(0, 2, 0);
        let e2 = AffineExpr::var(1, 2, 0);
        let sum = e1 + e2;
        assert_eq!(sum.evaluate(&[3, 4], &[]), 7);
    }

    #[test]
    fn test_combine_overflow() {
        let e = AffineExpr::constant(i64::MAX, 1, 0);
        assert!(e.combine(2, &e, 0).is_err());
        let sum = e.combine(1, &AffineExpr::constant(-1, 1, 0), 1).unwrap();
        assert_eq!(sum.constant, i64::MAX - 1);
    }

    #[test]
    fn test_substitute() {
        // 2*d0 + p0 with d0 := d1 + 3
        let mut e = AffineExpr::zero(2, 1);
        e.coeffs[0] = 2;
        e.param_coeffs[0] = 1;
        let mut v = AffineExpr::var(1, 2, 1);
        v.constant = 3;
        let r = e.substitute(Col::Dim(0), &v).unwrap();
        assert_eq!(r.coeffs, vec![0, 2]);
        assert_eq!(r.param_coeffs, vec![1]);
        assert_eq!(r.constant, 6);
    }

    #[test]
    fn test_insert_remove_dims() {
        let mut e = AffineExpr::var(1, 2, 0);
        e.insert_dims(0, 2);
        assert_eq!(e.coeffs, vec![0, 0, 0, 1]);
        e.remove_dims(0, 3);
        assert_eq!(e.coeffs, vec![1]);
    }

    #[test]
    fn test_coeff_gcd() {
        let mut e = AffineExpr::constant(7, 2, 1);
        e.coeffs = vec![4, -6];
        e.param_coeffs = vec![2];
        assert_eq!(e.coeff_gcd(), 2);
        assert_eq!(AffineExpr::constant(3, 1, 0).coeff_gcd(), 0);
    }

    #[test]
    fn test_display() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.constant = 5;
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.param_coeffs[0] = 1;

        let s = expr.to_string_with_names(
            &["i".to_string(), "j".to_string()],
            &["N".to_string()],
        );
        assert_eq!(s, "2i - j + N + 5");
    }
}
