//! Unions of sets and relations living in different spaces.
//!
//! Each member lives in its own pair of tuples; members with the same
//! tuples are merged on insertion. All members share one parameter list.

use std::fmt;

use crate::polyhedral::map::IntegerMap;
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::merge_params;
use crate::utils::errors::AlgebraResult;
use crate::utils::intern::Id;

/// A union of integer sets in different spaces.
#[derive(Debug, Clone, Default)]
pub struct UnionSet {
    params: Vec<Id>,
    sets: Vec<IntegerSet>,
}

impl UnionSet {
    pub fn empty(params: Vec<Id>) -> Self {
        Self { params, sets: Vec::new() }
    }

    pub fn from_set(set: IntegerSet) -> AlgebraResult<Self> {
        Self::empty(set.params_list().to_vec()).add_set(set)
    }

    pub fn params_list(&self) -> &[Id] { &self.params }
    pub fn sets(&self) -> &[IntegerSet] { &self.sets }
    pub fn n_set(&self) -> usize { self.sets.len() }

    /// The member with the given tuple, if any.
    pub fn extract(&self, like: &IntegerSet) -> Option<&IntegerSet> {
        self.sets.iter().find(|s| s.tuple() == like.tuple())
    }

    fn align_params(self, params: &[Id]) -> Self {
        if params == self.params.as_slice() {
            return self;
        }
        let params = merge_params(&self.params, params);
        let sets = self.sets.iter().map(|s| s.align_params(&params)).collect();
        Self { params, sets }
    }

    pub fn add_set(self, set: IntegerSet) -> AlgebraResult<Self> {
        if set.plain_is_empty() {
            return Ok(self);
        }
        let mut u = self.align_params(set.params_list());
        let set = set.align_params(&u.params);
        match u.sets.iter().position(|s| s.tuple() == set.tuple()) {
            Some(i) => u.sets[i] = u.sets[i].union(&set)?.coalesce()?,
            None => u.sets.push(set),
        }
        Ok(u)
    }

    pub fn union(self, other: UnionSet) -> AlgebraResult<Self> {
        other.sets.into_iter().try_fold(self, UnionSet::add_set)
    }

    pub fn is_empty(&self) -> AlgebraResult<bool> {
        for s in &self.sets {
            if !s.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_equal(&self, other: &UnionSet) -> AlgebraResult<bool> {
        for s in &self.sets {
            let equal = match other.extract(s) {
                Some(t) => s.is_equal(t)?,
                None => s.is_empty()?,
            };
            if !equal {
                return Ok(false);
            }
        }
        for t in &other.sets {
            if self.extract(t).is_none() && !t.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for UnionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.sets.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// A union of relations between different spaces.
#[derive(Debug, Clone, Default)]
pub struct UnionMap {
    params: Vec<Id>,
    maps: Vec<IntegerMap>,
}

impl UnionMap {
    pub fn empty(params: Vec<Id>) -> Self {
        Self { params, maps: Vec::new() }
    }

    pub fn from_map(map: IntegerMap) -> AlgebraResult<Self> {
        Self::empty(map.params_list().to_vec()).add_map(map)
    }

    pub fn params_list(&self) -> &[Id] { &self.params }
    pub fn maps(&self) -> &[IntegerMap] { &self.maps }
    pub fn n_map(&self) -> usize { self.maps.len() }

    /// The member with the same tuples as `like`, if any.
    pub fn extract(&self, like: &IntegerMap) -> Option<&IntegerMap> {
        self.maps.iter().find(|m| m.space().same_tuples(like.space()))
    }

    fn align_params(self, params: &[Id]) -> Self {
        if params == self.params.as_slice() {
            return self;
        }
        let params = merge_params(&self.params, params);
        let maps = self.maps.iter().map(|m| m.align_params(&params)).collect();
        Self { params, maps }
    }

    pub fn add_map(self, map: IntegerMap) -> AlgebraResult<Self> {
        if map.plain_is_empty() {
            return Ok(self);
        }
        let mut u = self.align_params(map.params_list());
        let map = map.align_params(&u.params);
        match u.maps.iter().position(|m| m.space().same_tuples(map.space())) {
            Some(i) => u.maps[i] = u.maps[i].union(&map)?.coalesce()?,
            None => u.maps.push(map),
        }
        Ok(u)
    }

    pub fn union(self, other: UnionMap) -> AlgebraResult<Self> {
        other.maps.into_iter().try_fold(self, UnionMap::add_map)
    }

    /// Restrict every member to the matching member of `domain`.
    pub fn intersect_domain(&self, domain: &UnionSet) -> AlgebraResult<Self> {
        let mut result = UnionMap::empty(self.params.clone());
        for m in &self.maps {
            if let Some(d) = domain.sets().iter().find(|d| d.tuple() == m.domain_tuple()) {
                result = result.add_map(m.intersect_domain(d)?)?;
            }
        }
        Ok(result)
    }

    /// Restrict every member to the matching member of `range`.
    pub fn intersect_range(&self, range: &UnionSet) -> AlgebraResult<Self> {
        let mut result = UnionMap::empty(self.params.clone());
        for m in &self.maps {
            if let Some(r) = range.sets().iter().find(|r| r.tuple() == m.range_tuple()) {
                result = result.add_map(m.intersect_range(r)?)?;
            }
        }
        Ok(result)
    }

    /// Compose every pair of members whose middle tuples agree.
    pub fn apply_range(&self, other: &UnionMap) -> AlgebraResult<Self> {
        let mut result = UnionMap::empty(merge_params(&self.params, &other.params));
        for a in &self.maps {
            for b in other.maps.iter().filter(|b| b.domain_tuple() == a.range_tuple()) {
                result = result.add_map(a.apply_range(b)?)?;
            }
        }
        Ok(result)
    }

    pub fn domain(&self) -> AlgebraResult<UnionSet> {
        let mut result = UnionSet::empty(self.params.clone());
        for m in &self.maps {
            result = result.add_set(m.domain()?)?;
        }
        Ok(result)
    }

    pub fn is_empty(&self) -> AlgebraResult<bool> {
        for m in &self.maps {
            if !m.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_equal(&self, other: &UnionMap) -> AlgebraResult<bool> {
        for m in &self.maps {
            let equal = match other.extract(m) {
                Some(n) => m.is_equal(n)?,
                None => m.is_empty()?,
            };
            if !equal {
                return Ok(false);
            }
        }
        for n in &other.maps {
            if self.extract(n).is_none() && !n.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for UnionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.maps.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::aff::MultiAff;
    use crate::polyhedral::space::{Space, Tuple};
    use crate::utils::intern::Ctx;

    fn access(ctx: &Ctx, stmt: &str, array: &str) -> IntegerMap {
        let space = Space::map(vec![], Tuple::named(ctx.id(stmt), 1), Tuple::named(ctx.id(array), 1));
        IntegerMap::from_multi_aff(&MultiAff::identity(&space.domain_space()).set_out_id(Some(ctx.id(array))))
    }

    #[test]
    fn test_add_merges_same_space() {
        let ctx = Ctx::new();
        let u = UnionMap::empty(vec![])
            .add_map(access(&ctx, "S", "A")).unwrap()
            .add_map(access(&ctx, "S", "A")).unwrap()
            .add_map(access(&ctx, "S", "B")).unwrap();
        assert_eq!(u.n_map(), 2);
        assert!(!u.is_empty().unwrap());
    }

    #[test]
    fn test_intersect_range() {
        let ctx = Ctx::new();
        let u = UnionMap::from_map(access(&ctx, "S", "A")).unwrap();
        let extent = IntegerSet::rectangular(&[10]).set_tuple_id(Some(ctx.id("A")));
        let restricted = u.intersect_range(&UnionSet::from_set(extent).unwrap()).unwrap();
        let m = &restricted.maps()[0];
        assert!(m.contains(&[3], &[3], &[]));
        assert!(!m.contains(&[12], &[12], &[]));
        let other = IntegerSet::rectangular(&[10]).set_tuple_id(Some(ctx.id("B")));
        let none = u.intersect_range(&UnionSet::from_set(other).unwrap()).unwrap();
        assert!(none.is_empty().unwrap());
    }

    #[test]
    fn test_is_equal_ignores_empty_members() {
        let ctx = Ctx::new();
        let a = UnionMap::from_map(access(&ctx, "S", "A")).unwrap();
        let b = a.clone().add_map(IntegerMap::empty(access(&ctx, "S", "B").space().clone())).unwrap();
        assert!(a.is_equal(&b).unwrap());
    }
}
