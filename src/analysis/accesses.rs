//! Collection of access relations, domains and schedules.

use crate::analysis::scop::Scop;
use crate::ir::{Expr, Stmt};
use crate::polyhedral::{IntegerMap, IntegerSet, UnionMap, UnionSet};
use crate::utils::errors::AlgebraResult;

/// Which accesses to collect.
#[derive(Debug, Clone, Copy, Default)]
struct AccessFilter {
    read: bool,
    write: bool,
    kill: bool,
    /// Only accesses that are known to be performed
    must: bool,
    /// Tag the domain with the reference identifier
    tag: bool,
}

fn expr_collect_accesses(
    expr: &Expr,
    filter: AccessFilter,
    domain: &IntegerSet,
    mut accesses: UnionMap,
) -> AlgebraResult<UnionMap> {
    for arg in expr.args() {
        accesses = expr_collect_accesses(arg, filter, domain, accesses)?;
    }
    let acc = match expr.as_access() {
        Some(acc) if !acc.is_affine() => acc,
        _ => return Ok(accesses),
    };
    let selected = (filter.read && acc.read) || (filter.write && acc.write);
    if !selected || (filter.must && acc.n_arg() > 0) {
        return Ok(accesses);
    }
    let mut access = acc.may_access()?.intersect_domain(domain)?;
    if filter.tag {
        access = acc.tag(access);
    }
    accesses.add_map(access)
}

fn stmt_collect_accesses(stmt: &Stmt, filter: AccessFilter, accesses: UnionMap) -> AlgebraResult<UnionMap> {
    if filter.must && stmt.n_arg() > 0 {
        return Ok(accesses);
    }
    let domain = stmt.iteration_domain()?;
    if filter.kill {
        let acc = match stmt.body.arg(0).and_then(Expr::as_access) {
            Some(acc) => acc,
            None => return Ok(accesses),
        };
        let mut access = acc.may_access()?.intersect_domain(&domain)?;
        if filter.tag {
            access = acc.tag(access);
        }
        return accesses.add_map(access);
    }
    expr_collect_accesses(&stmt.body, filter, &domain, accesses)
}

/// Map each array element to the innermost field elements it contains.
///
/// An array of structures `s[i]` with a field `a` has a wrapped member
/// array `s_a[s[i] -> a[]]`; an access to `s[i]` is an access to all its
/// members. Every level of nesting maps to the innermost fields, so a
/// direct access to a member array is kept as is.
fn compute_to_inner(scop: &Scop) -> AlgebraResult<UnionMap> {
    let mut to_inner = UnionMap::empty(scop.context.params_list().to_vec());
    for array in scop.arrays.iter().filter(|a| !a.element_is_record) {
        let mut set = array.extent.clone();
        let mut map = set.identity();
        to_inner = to_inner.add_map(map.gist_domain(&set)?)?;
        while set.is_wrapping() {
            let id = set.tuple_id().cloned();
            let wrapped = set.unwrap()?.domain_map().set_in_id(id);
            map = map.apply_domain(&wrapped)?;
            set = map.domain()?;
            to_inner = to_inner.add_map(map.gist_domain(&set)?)?;
        }
    }
    Ok(to_inner)
}

impl Scop {
    fn collect_accesses(&self, filter: AccessFilter) -> AlgebraResult<UnionMap> {
        let mut accesses = UnionMap::empty(self.context.params_list().to_vec());
        for stmt in &self.stmts {
            if filter.kill && !stmt.is_kill() {
                continue;
            }
            accesses = stmt_collect_accesses(stmt, filter, accesses)?;
        }

        let mut arrays = UnionSet::empty(self.context.params_list().to_vec());
        for array in &self.arrays {
            arrays = arrays.add_set(array.extent.clone())?;
        }
        let accesses = accesses.intersect_range(&arrays)?;
        accesses.apply_range(&compute_to_inner(self)?)
    }

    pub fn collect_may_reads(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { read: true, ..Default::default() })
    }

    pub fn collect_may_writes(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { write: true, ..Default::default() })
    }

    pub fn collect_must_writes(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { write: true, must: true, ..Default::default() })
    }

    pub fn collect_must_kills(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { kill: true, must: true, ..Default::default() })
    }

    pub fn collect_tagged_may_reads(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { read: true, tag: true, ..Default::default() })
    }

    pub fn collect_tagged_may_writes(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { write: true, tag: true, ..Default::default() })
    }

    pub fn collect_tagged_must_writes(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { write: true, must: true, tag: true, ..Default::default() })
    }

    pub fn collect_tagged_must_kills(&self) -> AlgebraResult<UnionMap> {
        self.collect_accesses(AccessFilter { kill: true, must: true, tag: true, ..Default::default() })
    }

    /// The union of the statement domains.
    ///
    /// The domain of a statement with arguments is kept wrapped, with the
    /// argument values in the range.
    pub fn collect_domains(&self) -> AlgebraResult<UnionSet> {
        let mut domains = UnionSet::empty(self.context.params_list().to_vec());
        for stmt in &self.stmts {
            domains = domains.add_set(stmt.domain.clone())?;
        }
        Ok(domains)
    }

    /// The union of the schedules, padded with zeros to a common depth.
    pub fn collect_schedule(&self) -> AlgebraResult<UnionMap> {
        let depth = self.stmts.iter().map(|s| s.schedule.n_out()).max().unwrap_or(0);
        let mut schedule = UnionMap::empty(self.context.params_list().to_vec());
        for stmt in &self.stmts {
            let n = stmt.schedule.n_out();
            let mut map: IntegerMap = stmt.schedule.add_out_dims(depth - n)?;
            for pos in n..depth {
                map = map.fix_out(pos, 0);
            }
            schedule = schedule.add_map(map)?;
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::scop::Scop;
    use crate::frontend::{parse_map, parse_multi_pw_aff, parse_set};
    use crate::ir::{Array, Expr, Stmt};
    use crate::utils::intern::Ctx;
    use crate::utils::location::Loc;

    fn copy_stmt(ctx: &Ctx, name: &str, domain: &str, write: &str, read: &str) -> Stmt {
        let lhs = Expr::write_access(parse_multi_pw_aff(ctx, write).unwrap()).unwrap();
        let rhs = Expr::from_index(parse_multi_pw_aff(ctx, read).unwrap()).unwrap();
        Stmt {
            loc: Loc::dummy(),
            domain: parse_set(ctx, domain).unwrap(),
            schedule: parse_map(ctx, &format!("{{ {}[i] -> [i] }}", name)).unwrap(),
            body: Expr::assign(lhs, rhs),
            args: Vec::new(),
        }
    }

    fn scop(ctx: &Ctx) -> Scop {
        let mut scop = Scop::empty();
        scop.stmts.push(copy_stmt(ctx, "S", "{ S[i] : 0 <= i < 10 }", "{ S[i] -> A[i] }", "{ S[i] -> B[i + 1] }"));
        scop.arrays.push(Array::new(parse_set(ctx, "{ A[i] : 0 <= i < 10 }").unwrap(), "int", 4));
        scop.arrays.push(Array::new(parse_set(ctx, "{ B[i] : 0 <= i < 10 }").unwrap(), "int", 4));
        scop
    }

    #[test]
    fn test_may_reads_restricted_to_extent() {
        let ctx = Ctx::new();
        let reads = scop(&ctx).collect_may_reads().unwrap();
        assert_eq!(reads.n_map(), 1);
        let read = &reads.maps()[0];
        assert!(read.contains(&[3], &[4], &[]));
        // B[10] lies outside the extent
        assert!(!read.contains(&[9], &[10], &[]));
    }

    #[test]
    fn test_writes_and_tags() {
        let ctx = Ctx::new();
        let mut scop = scop(&ctx);
        let writes = scop.collect_must_writes().unwrap();
        assert_eq!(writes.n_map(), 1);
        assert_eq!(writes.maps()[0].out_id().map(|id| id.name()), Some("A"));

        scop = scop.add_ref_ids(&ctx);
        let tagged = scop.collect_tagged_may_writes().unwrap();
        assert!(tagged.maps()[0].domain_is_wrapping());
        assert!(scop.collect_must_kills().unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_struct_members_are_expanded() {
        let ctx = Ctx::new();
        let mut scop = Scop::empty();
        scop.stmts.push(copy_stmt(&ctx, "S", "{ S[i] : 0 <= i < 4 }", "{ S[i] -> s[i] }", "{ S[i] -> [i] }"));
        let mut outer = Array::new(parse_set(&ctx, "{ s[i] : 0 <= i < 4 }").unwrap(), "struct pair", 8);
        outer.element_is_record = true;
        scop.arrays.push(outer);
        scop.arrays.push(Array::new(parse_set(&ctx, "{ s_a[s[i] -> a[]] : 0 <= i < 4 }").unwrap(), "int", 4));
        let writes = scop.collect_may_writes().unwrap();
        assert_eq!(writes.n_map(), 1);
        assert!(writes.maps()[0].range_is_wrapping());
        assert!(writes.maps()[0].contains(&[2], &[2], &[]));
    }

    #[test]
    fn test_direct_member_access_is_kept() {
        let ctx = Ctx::new();
        let mut scop = Scop::empty();
        scop.stmts.push(copy_stmt(&ctx, "S", "{ S[i] : 0 <= i < 4 }", "{ S[i] -> s_a[s[i] -> a[]] }", "{ S[i] -> [i] }"));
        let mut outer = Array::new(parse_set(&ctx, "{ s[i] : 0 <= i < 4 }").unwrap(), "struct pair", 8);
        outer.element_is_record = true;
        scop.arrays.push(outer);
        scop.arrays.push(Array::new(parse_set(&ctx, "{ s_a[s[i] -> a[]] : 0 <= i < 4 }").unwrap(), "int", 4));

        let writes = scop.collect_may_writes().unwrap();
        assert_eq!(writes.n_map(), 1);
        let write = &writes.maps()[0];
        assert_eq!(write.out_id().map(|id| id.name()), Some("s_a"));
        assert!(write.contains(&[1], &[1], &[]));
        assert!(!write.contains(&[1], &[2], &[]));
        assert_eq!(scop.collect_must_writes().unwrap().n_map(), 1);
    }

    #[test]
    fn test_domains_keep_arguments() {
        let ctx = Ctx::new();
        let mut scop = scop(&ctx);
        let mut guarded = copy_stmt(&ctx, "T", "{ [T[i] -> [t]] : 0 <= i < 2 and t = 1 }", "{ T[i] -> A[i] }", "{ T[i] -> B[i] }");
        guarded.args.push(Expr::from_index(parse_multi_pw_aff(&ctx, "{ T[i] -> B[i] }").unwrap()).unwrap());
        scop.stmts.push(guarded);

        let domains = scop.collect_domains().unwrap();
        assert_eq!(domains.n_set(), 2);
        let wrapped = domains.sets().iter().find(|s| s.is_wrapping()).unwrap();
        assert!(wrapped.contains(&[1, 1], &[]));
        assert!(!wrapped.contains(&[1, 0], &[]));
        assert!(domains.sets().iter().any(|s| !s.is_wrapping() && s.contains(&[9], &[])));
    }

    #[test]
    fn test_schedule_padding() {
        let ctx = Ctx::new();
        let mut scop = scop(&ctx);
        let mut flat = copy_stmt(&ctx, "T", "{ T[i] : 0 <= i < 2 }", "{ T[i] -> A[i] }", "{ T[i] -> B[i] }");
        flat.schedule = parse_map(&ctx, "{ T[i] -> [1, i, 5] }").unwrap();
        scop.stmts.push(flat);
        let schedule = scop.collect_schedule().unwrap();
        assert_eq!(schedule.n_map(), 2);
        assert!(schedule.maps().iter().all(|m| m.n_out() == 3));
        let s = schedule.maps().iter().find(|m| m.in_id().map(|id| id.name()) == Some("S")).unwrap();
        assert!(s.contains(&[4], &[4, 0, 0], &[]));
        assert_eq!(scop.collect_domains().unwrap().n_set(), 2);
    }
}
