//! Filtering statements on the value of a virtual variable.
//!
//! A filter makes the execution of each statement depend on the value of
//! `test`, typically an access to a virtual array holding the outcome of
//! a data-dependent condition. The access becomes an extra argument of
//! the statement and the domain only contains the instances where that
//! argument has the required value.

use crate::analysis::{Scop, SkipKind};
use crate::ir::{AccessExpr, Expr, Implication, Stmt};
use crate::polyhedral::{IntegerMap, MultiAff, MultiPwAff};
use crate::transform::Transform;
use crate::utils::errors::{AlgebraResult, ErrorKind, ScopResult};
use crate::utils::intern::Ctx;

/// Only execute a scop where `test` equals `satisfied`.
#[derive(Debug, Clone)]
pub struct Filter {
    pub test: MultiPwAff,
    pub satisfied: bool,
}

impl Filter {
    pub fn new(test: MultiPwAff, satisfied: bool) -> Self {
        Self { test, satisfied }
    }
}

impl Transform for Filter {
    fn apply(&self, ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        scop.filter(ctx, &self.test, self.satisfied)
    }

    fn name(&self) -> &str {
        "filter"
    }
}

/// Extend `map` with the first implication on its range that applies
/// for `satisfied`.
fn apply_implications(implications: &[Implication], map: IntegerMap, satisfied: bool) -> AlgebraResult<IntegerMap> {
    let id = map.out_id().cloned();
    let found = implications.iter().find(|imp| {
        imp.satisfied == satisfied && imp.extension.in_id().cloned() == id
    });
    match found {
        Some(imp) => map.apply_range(&imp.extension),
        None => Ok(map),
    }
}

/// Does argument `pos` of a statement with domain `domain` already
/// guarantee that `test` equals `satisfied`?
fn implies_filter(
    implications: &[Implication],
    domain: &IntegerMap,
    pos: usize,
    arg: &AccessExpr,
    test: &IntegerMap,
    satisfied: bool,
) -> AlgebraResult<bool> {
    if arg.id() != test.out_id() {
        return Ok(false);
    }
    if domain.plain_get_fixed_out(pos) != Some(satisfied as i64) {
        return Ok(false);
    }
    let implied = apply_implications(implications, arg.access.clone(), satisfied)?;
    test.is_subset(&implied)
}

fn filter_implied(implications: &[Implication], stmt: &Stmt, test: &MultiPwAff, satisfied: bool) -> AlgebraResult<bool> {
    if stmt.args.is_empty() {
        return Ok(false);
    }
    let domain = stmt.domain.unwrap()?;
    let test = test.to_map()?;
    for (pos, arg) in stmt.args.iter().enumerate() {
        if let Some(acc) = arg.as_access() {
            if implies_filter(implications, &domain, pos, acc, &test, satisfied)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn stmt_filter(implications: &[Implication], mut stmt: Stmt, test: &MultiPwAff, satisfied: bool) -> AlgebraResult<Stmt> {
    let add_dom = MultiAff::prefix_projection(&stmt.space(), test.domain_tuple().clone())?;
    let test = test.pullback(&add_dom)?;

    if filter_implied(implications, &stmt, &test, satisfied)? {
        log::trace!("filter on {:?} already implied", test.out_id());
        return Ok(stmt);
    }

    let map = if stmt.domain.is_wrapping() {
        stmt.domain.unwrap()?
    } else {
        IntegerMap::from_domain(&stmt.domain)
    };
    stmt.domain = map.insert_out_dims(0, 1)?.fix_out(0, satisfied as i64).wrap();
    stmt.args.insert(0, Expr::from_index(test)?);
    Ok(stmt)
}

impl Scop {
    /// Only execute the statements for the instances where `test` has
    /// value `satisfied`.
    ///
    /// The domain of `test` is a prefix of the iteration spaces. Filters
    /// that are already implied by an existing argument are not added
    /// again. A skip condition can only be filtered if it holds
    /// unconditionally, in which case it becomes `test`.
    pub fn filter(mut self, ctx: &Ctx, test: &MultiPwAff, satisfied: bool) -> ScopResult<Scop> {
        log::debug!("filtering {} statements on {:?} = {}", self.n_stmt(), test.out_id(), satisfied);
        for kind in SkipKind::ALL {
            if !self.has_skip(kind) {
                continue;
            }
            if !satisfied || !self.has_universal_skip(kind)? {
                return Err(ctx.die(ErrorKind::Internal, "skip expression cannot be filtered"));
            }
            self.put_skip(kind, Some(test.clone()));
        }

        let stmts = std::mem::take(&mut self.stmts);
        let mut filtered = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            filtered.push(stmt_filter(&self.implications, stmt, test, satisfied)?);
        }
        self.stmts = filtered;
        Ok(self)
    }
}
