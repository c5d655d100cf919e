//! Polyhedral spaces define the dimensions of sets and relations.
//!
//! A space describes:
//! - Named parameters (symbolic constants), shared by name across objects
//! - An optional domain tuple (for relations and functions)
//! - A range tuple (the set tuple for sets)
//!
//! Tuples carry an optional identifier and are either flat or wrap a
//! nested relation `[A[..] -> B[..]]`. Columns are always counted flat.

use std::fmt;

use crate::utils::errors::{AlgebraError, AlgebraResult};
use crate::utils::intern::Id;

/// The shape of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TupleShape {
    /// A flat tuple of the given number of dimensions
    Flat(usize),
    /// A wrapped relation `[domain -> range]`
    Wrapped(Box<Tuple>, Box<Tuple>),
}

/// A (possibly named, possibly wrapped) tuple of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    pub id: Option<Id>,
    pub shape: TupleShape,
}

impl Tuple {
    /// An anonymous flat tuple.
    pub fn anonymous(n: usize) -> Self {
        Self { id: None, shape: TupleShape::Flat(n) }
    }

    /// A named flat tuple.
    pub fn named(id: Id, n: usize) -> Self {
        Self { id: Some(id), shape: TupleShape::Flat(n) }
    }

    /// A flat tuple with an optional name.
    pub fn flat(id: Option<Id>, n: usize) -> Self {
        Self { id, shape: TupleShape::Flat(n) }
    }

    /// An anonymous tuple wrapping the relation `domain -> range`.
    pub fn wrapped(domain: Tuple, range: Tuple) -> Self {
        Self { id: None, shape: TupleShape::Wrapped(Box::new(domain), Box::new(range)) }
    }

    /// Total number of (flat) dimensions.
    pub fn dim(&self) -> usize {
        match &self.shape {
            TupleShape::Flat(n) => *n,
            TupleShape::Wrapped(d, r) => d.dim() + r.dim(),
        }
    }

    pub fn is_wrapping(&self) -> bool {
        matches!(self.shape, TupleShape::Wrapped(..))
    }

    /// The wrapped relation, if any.
    pub fn unwrap_pair(&self) -> Option<(&Tuple, &Tuple)> {
        match &self.shape {
            TupleShape::Wrapped(d, r) => Some((d, r)),
            TupleShape::Flat(_) => None,
        }
    }

    pub fn with_id(&self, id: Option<Id>) -> Self {
        Self { id, shape: self.shape.clone() }
    }

    /// Same number of dimensions, ignoring names and nesting.
    pub fn compatible(&self, other: &Tuple) -> bool {
        self.dim() == other.dim()
    }

    pub(crate) fn reset_user(&self) -> Self {
        let shape = match &self.shape {
            TupleShape::Flat(n) => TupleShape::Flat(*n),
            TupleShape::Wrapped(d, r) => {
                TupleShape::Wrapped(Box::new(d.reset_user()), Box::new(r.reset_user()))
            }
        };
        Self { id: self.id.as_ref().map(Id::anonymized), shape }
    }

    /// Format this tuple with the given column names.
    pub(crate) fn fmt_with(&self, names: &[String], offset: &mut usize) -> String {
        let name = self.id.as_ref().map(|id| id.name().to_string()).unwrap_or_default();
        match &self.shape {
            TupleShape::Flat(n) => {
                let cols: Vec<&str> = names[*offset..*offset + n].iter().map(|s| s.as_str()).collect();
                *offset += n;
                format!("{}[{}]", name, cols.join(", "))
            }
            TupleShape::Wrapped(d, r) => {
                let d = d.fmt_with(names, offset);
                let r = r.fmt_with(names, offset);
                format!("{}[{} -> {}]", name, d, r)
            }
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.dim()).map(|i| format!("i{}", i)).collect();
        write!(f, "{}", self.fmt_with(&names, &mut 0))
    }
}

/// A polyhedral space describes the dimensionality and structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    /// Parameters, in column order
    pub params: Vec<Id>,
    /// Domain tuple (relations only)
    pub domain: Option<Tuple>,
    /// Range tuple (the set tuple for sets)
    pub range: Tuple,
}

impl Space {
    /// Create a parameter space (a set space without dimensions).
    pub fn params(params: Vec<Id>) -> Self {
        Self { params, domain: None, range: Tuple::anonymous(0) }
    }

    /// Create a set space.
    pub fn set(params: Vec<Id>, tuple: Tuple) -> Self {
        Self { params, domain: None, range: tuple }
    }

    /// Create a map space.
    pub fn map(params: Vec<Id>, domain: Tuple, range: Tuple) -> Self {
        Self { params, domain: Some(domain), range }
    }

    /// Check if this is a set space.
    pub fn is_set(&self) -> bool {
        self.domain.is_none()
    }

    /// Check if this is a map space.
    pub fn is_map(&self) -> bool {
        self.domain.is_some()
    }

    /// Check if this is a parameter space.
    pub fn is_params(&self) -> bool {
        self.is_set() && self.range == Tuple::anonymous(0)
    }

    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    /// Number of input dimensions (0 for sets).
    pub fn n_in(&self) -> usize {
        self.domain.as_ref().map_or(0, Tuple::dim)
    }

    /// Number of output/set dimensions.
    pub fn n_out(&self) -> usize {
        self.range.dim()
    }

    /// Total number of (non-parameter) columns.
    pub fn n_dim(&self) -> usize {
        self.n_in() + self.n_out()
    }

    pub fn find_param(&self, id: &Id) -> Option<usize> {
        self.params.iter().position(|p| p == id)
    }

    /// The domain tuple of a map space, or the set tuple of a set space.
    pub fn domain_tuple(&self) -> &Tuple {
        self.domain.as_ref().unwrap_or(&self.range)
    }

    /// The set space of the domain tuple (or the set itself for sets).
    pub fn domain_space(&self) -> Space {
        match &self.domain {
            Some(d) => Space::set(self.params.clone(), d.clone()),
            None => self.clone(),
        }
    }

    /// The set space of the range tuple.
    pub fn range_space(&self) -> Space {
        Space::set(self.params.clone(), self.range.clone())
    }

    /// Turn a map space into the set space of its wrapped relation.
    pub fn wrap(&self) -> AlgebraResult<Space> {
        match &self.domain {
            Some(d) => Ok(Space::set(self.params.clone(), Tuple::wrapped(d.clone(), self.range.clone()))),
            None => Err(AlgebraError::SpaceMismatch(format!("cannot wrap set space {}", self))),
        }
    }

    /// Turn a wrapping set space into the map space it wraps.
    pub fn unwrap(&self) -> AlgebraResult<Space> {
        match (&self.domain, self.range.unwrap_pair()) {
            (None, Some((d, r))) => Ok(Space::map(self.params.clone(), d.clone(), r.clone())),
            _ => Err(AlgebraError::SpaceMismatch(format!("{} is not a wrapping set space", self))),
        }
    }

    /// The map space from this set space to an anonymous 0-dimensional range.
    pub fn from_domain(&self) -> Space {
        Space::map(self.params.clone(), self.range.clone(), Tuple::anonymous(0))
    }

    /// The map space from this set space to itself.
    pub fn map_from_set(&self) -> Space {
        Space::map(self.params.clone(), self.range.clone(), self.range.clone())
    }

    /// Same tuples, ignoring parameters.
    pub fn same_tuples(&self, other: &Space) -> bool {
        self.domain == other.domain && self.range == other.range
    }

    /// Same dimension counts, ignoring names and parameters.
    pub fn compatible(&self, other: &Space) -> bool {
        self.n_in() == other.n_in() && self.n_out() == other.n_out() && self.is_map() == other.is_map()
    }

    /// Names for all columns: `i*` for domain/set columns, `o*` for range columns of maps.
    pub(crate) fn column_names(&self) -> Vec<String> {
        match &self.domain {
            Some(_) => (0..self.n_in())
                .map(|i| format!("i{}", i))
                .chain((0..self.n_out()).map(|i| format!("o{}", i)))
                .collect(),
            None => (0..self.n_out()).map(|i| format!("i{}", i)).collect(),
        }
    }

    pub(crate) fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    pub(crate) fn reset_user(&self) -> Space {
        Space {
            params: self.params.iter().map(Id::anonymized).collect(),
            domain: self.domain.as_ref().map(Tuple::reset_user),
            range: self.range.reset_user(),
        }
    }

    /// Format the tuples of this space with the given column names.
    pub(crate) fn fmt_tuples(&self, names: &[String]) -> String {
        let mut offset = 0;
        match &self.domain {
            Some(d) => {
                let d = d.fmt_with(names, &mut offset);
                let r = self.range.fmt_with(names, &mut offset);
                format!("{} -> {}", d, r)
            }
            None => self.range.fmt_with(names, &mut offset),
        }
    }
}

/// Merge two parameter lists: all of `a`, followed by those of `b` not in `a`.
pub(crate) fn merge_params(a: &[Id], b: &[Id]) -> Vec<Id> {
    let mut params = a.to_vec();
    for p in b {
        if !params.contains(p) {
            params.push(p.clone());
        }
    }
    params
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.param_names().join(", "))?;
        }
        write!(f, "{{ {} }}", self.fmt_tuples(&self.column_names()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::intern::Ctx;

    #[test]
    fn test_set_space() {
        let ctx = Ctx::new();
        let space = Space::set(vec![], Tuple::named(ctx.id("S"), 3));
        assert!(space.is_set());
        assert!(!space.is_map());
        assert!(!space.is_params());
        assert_eq!(space.n_out(), 3);
        assert_eq!(space.to_string(), "{ S[i0, i1, i2] }");
    }

    #[test]
    fn test_map_space() {
        let ctx = Ctx::new();
        let space = Space::map(vec![ctx.id("N")], Tuple::named(ctx.id("S"), 2), Tuple::named(ctx.id("A"), 1));
        assert!(space.is_map());
        assert_eq!(space.n_in(), 2);
        assert_eq!(space.n_out(), 1);
        assert_eq!(space.n_dim(), 3);
        assert_eq!(space.to_string(), "[N] -> { S[i0, i1] -> A[o0] }");
    }

    #[test]
    fn test_wrap_unwrap() {
        let ctx = Ctx::new();
        let space = Space::map(vec![], Tuple::named(ctx.id("S"), 1), Tuple::anonymous(2));
        let wrapped = space.wrap().unwrap();
        assert!(wrapped.is_set());
        assert!(wrapped.range.is_wrapping());
        assert_eq!(wrapped.n_out(), 3);
        assert_eq!(wrapped.unwrap().unwrap(), space);
        assert!(Space::params(vec![]).unwrap().is_err());
    }

    #[test]
    fn test_merge_params() {
        let ctx = Ctx::new();
        let (n, m, k) = (ctx.id("N"), ctx.id("M"), ctx.id("K"));
        let merged = merge_params(&[n.clone(), m.clone()], &[k.clone(), n.clone()]);
        assert_eq!(merged, vec![n, m, k]);
    }
}
