//! Polyhedral operations: simplification, elimination, emptiness and the
//! disjunct-level set operations (intersection, complement, coalescing,
//! gist) shared by sets and relations.
//!
//! Existential columns are removed by substitution through equalities where
//! possible and by Fourier-Motzkin elimination otherwise. Projections are
//! exact over the integers: substituting through an equality with a
//! non-unit coefficient leaves a congruence on the remaining terms, and
//! eliminating between non-unit bounds splits into the dark shadow and a
//! finite number of splinters, as in the Omega test.

use num_integer::Integer;

use crate::polyhedral::constraint::{Constraint, ConstraintKind, ConstraintSystem, Normalized};
use crate::polyhedral::expr::Col;
use crate::utils::errors::{AlgebraError, AlgebraResult};

/// Maximal number of constraints generated by a single elimination step.
const MAX_CONSTRAINTS: usize = 4096;

/// Maximal number of disjuncts in the result of a set operation.
pub(crate) const MAX_DISJUNCTS: usize = 1024;

impl ConstraintSystem {
    /// Normalize every constraint and drop duplicates.
    ///
    /// Returns `None` if the system is found to be infeasible.
    pub fn simplify(self) -> Option<ConstraintSystem> {
        let ConstraintSystem { constraints, n_dim, n_param } = self;
        let mut result: Vec<Constraint> = Vec::with_capacity(constraints.len());
        for c in constraints {
            let c = match c.normalize() {
                Normalized::Trivial => continue,
                Normalized::Infeasible => return None,
                Normalized::Keep(c) => c,
            };
            if result.contains(&c) {
                continue;
            }
            if c.is_inequality() {
                if let Some(pos) = result.iter().position(|o| o.is_inequality() && o.expr.same_linear(&c.expr)) {
                    if c.expr.constant < result[pos].expr.constant {
                        result[pos] = c;
                    }
                    continue;
                }
                let clash = result.iter().any(|o| {
                    o.is_inequality()
                        && o.expr.opposite_linear(&c.expr)
                        && o.expr.constant + c.expr.constant < 0
                });
                if clash {
                    return None;
                }
            }
            result.push(c);
        }

        // l >= 0 and -l >= 0 form an equality
        let mut i = 0;
        while i < result.len() {
            if result[i].is_inequality() {
                let opposite = (i + 1..result.len()).find(|&j| {
                    result[j].is_inequality()
                        && result[j].expr.opposite_linear(&result[i].expr)
                        && result[j].expr.constant + result[i].expr.constant == 0
                });
                if let Some(j) = opposite {
                    result.remove(j);
                    let eq = Constraint::eq_zero(result[i].expr.clone());
                    match eq.normalize() {
                        Normalized::Keep(eq) => result[i] = eq,
                        Normalized::Infeasible => return None,
                        Normalized::Trivial => {
                            result.remove(i);
                            continue;
                        }
                    }
                }
            }
            i += 1;
        }

        Some(ConstraintSystem { constraints: result, n_dim, n_param })
    }

    /// Eliminate `col` from the system, leaving its coefficient zero everywhere.
    ///
    /// The integer projection of a system is a union in general, so the
    /// result is a list of systems over the same columns whose integer
    /// points are exactly the projections of those of `self`. The column
    /// itself is kept; callers remove it afterwards.
    pub fn eliminate(self, col: Col) -> AlgebraResult<Vec<ConstraintSystem>> {
        let eq_pos = self.constraints.iter()
            .enumerate()
            .filter(|(_, c)| c.is_equality() && c.expr.get(col) != 0)
            .min_by_key(|(_, c)| c.expr.get(col).abs())
            .map(|(i, _)| i);
        if let Some(pos) = eq_pos {
            return Ok(vec![self.substitute_equality(pos, col)?]);
        }

        let involved: Vec<usize> = (0..self.constraints.len())
            .filter(|&i| self.constraints[i].involves(col))
            .collect();
        let mut step = 1i64;
        for &i in &involved {
            if let Some(m) = self.constraints[i].modulus() {
                step = step.lcm(&m);
            }
        }
        match involved.as_slice() {
            [pos] if self.constraints[*pos].is_congruence() => Ok(vec![self.drop_congruence(*pos, col)]),
            _ if step > 1 => self.split_residues(col, step),
            _ => self.eliminate_inequalities(col),
        }
    }

    /// Substitute the solution of the equality at `pos` for `col`.
    ///
    /// For a coefficient `a` other than one, the remaining terms of the
    /// equality must be divisible by `a`.
    fn substitute_equality(mut self, pos: usize, col: Col) -> AlgebraResult<ConstraintSystem> {
        let eq = self.constraints.remove(pos);
        let a = eq.expr.get(col);
        let mut out = Vec::with_capacity(self.constraints.len() + 1);
        for c in self.constraints.drain(..) {
            let b = c.expr.get(col);
            if b == 0 {
                out.push(c);
                continue;
            }
            // |a| * c - sign(a) * b * eq
            let expr = c.expr.combine(a.abs(), &eq.expr, -a.signum() * b)?;
            let kind = match c.kind {
                ConstraintKind::Congruence(m) => ConstraintKind::Congruence(
                    m.checked_mul(a.abs()).ok_or(AlgebraError::Overflow("congruence modulus"))?,
                ),
                kind => kind,
            };
            out.push(Constraint::new(expr, kind));
        }
        if a.abs() > 1 {
            let mut rest = eq.expr;
            rest.set(col, 0);
            out.push(Constraint::congruent_zero(rest, a));
        }
        self.constraints = out;
        Ok(self)
    }

    /// Eliminate `col` from the only constraint involving it, a congruence.
    ///
    /// `a * col + e = 0 mod m` has a solution iff `e = 0 mod gcd(a, m)`.
    fn drop_congruence(mut self, pos: usize, col: Col) -> ConstraintSystem {
        let c = self.constraints.remove(pos);
        let g = c.expr.get(col).gcd(&c.modulus().unwrap_or(1));
        if g > 1 {
            let mut rest = c.expr;
            rest.set(col, 0);
            self.constraints.push(Constraint::congruent_zero(rest, g));
        }
        self
    }

    /// Eliminate `col` after writing it as `step * col' + r` for every
    /// residue `r`, with `step` a multiple of the moduli of the
    /// congruences involving `col`.
    fn split_residues(self, col: Col, step: i64) -> AlgebraResult<Vec<ConstraintSystem>> {
        check_disjuncts(step as usize)?;
        let overflow = || AlgebraError::Overflow("residue split");
        let mut out = Vec::new();
        for r in 0..step {
            let mut piece = self.clone();
            for c in &mut piece.constraints {
                let a = c.expr.get(col);
                if a == 0 {
                    continue;
                }
                c.expr.constant = a.checked_mul(r)
                    .and_then(|v| v.checked_add(c.expr.constant))
                    .ok_or_else(overflow)?;
                c.expr.set(col, a.checked_mul(step).ok_or_else(overflow)?);
            }
            // the congruences no longer involve the column once normalized
            if let Some(piece) = piece.simplify() {
                out.extend(piece.eliminate(col)?);
            }
            check_disjuncts(out.len())?;
        }
        Ok(out)
    }

    /// Eliminate `col`, which only occurs in inequalities.
    ///
    /// Fourier-Motzkin is exact when all lower or all upper bounds have
    /// a unit coefficient. Otherwise the result is the dark shadow,
    /// together with the splinters where the column is pinned close to
    /// one of its lower bounds.
    fn eliminate_inequalities(self, col: Col) -> AlgebraResult<Vec<ConstraintSystem>> {
        let original = self.clone();
        let ConstraintSystem { constraints, n_dim, n_param } = self;
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        let mut rest = Vec::new();
        for c in constraints {
            let v = c.expr.get(col);
            if v > 0 {
                lower.push(c);
            } else if v < 0 {
                upper.push(c);
            } else {
                rest.push(c);
            }
        }
        if lower.len() * upper.len() + rest.len() > MAX_CONSTRAINTS {
            return Err(AlgebraError::TooComplex(format!(
                "eliminating a column yields {} constraints",
                lower.len() * upper.len() + rest.len()
            )));
        }
        let exact = lower.iter().all(|l| l.expr.get(col) == 1) || upper.iter().all(|u| u.expr.get(col) == -1);
        for l in &lower {
            for u in &upper {
                let a = l.expr.get(col);
                let b = -u.expr.get(col);
                let mut expr = l.expr.combine(b, &u.expr, a)?;
                expr.constant -= (a - 1) * (b - 1);
                rest.push(Constraint::ge_zero(expr));
            }
        }
        let shadow = ConstraintSystem { constraints: rest, n_dim, n_param };
        if exact {
            return Ok(vec![shadow]);
        }

        let widest = upper.iter().map(|u| -u.expr.get(col)).max().unwrap_or(1);
        let mut out = vec![shadow];
        for l in &lower {
            let a = l.expr.get(col);
            let n = (widest * a - a - widest).div_floor(&widest);
            for k in 0..=n {
                let mut pinned = l.expr.clone();
                pinned.constant -= k;
                let mut piece = original.clone();
                piece.constraints.push(Constraint::eq_zero(pinned));
                if let Some(piece) = piece.simplify() {
                    out.extend(piece.eliminate(col)?);
                }
                check_disjuncts(out.len())?;
            }
        }
        Ok(out)
    }

    /// Pick the next column to eliminate when deciding feasibility.
    fn elimination_candidate(&self) -> Option<Col> {
        let cols = (0..self.n_dim).map(Col::Dim).chain((0..self.n_param).map(Col::Param));
        let mut best: Option<(usize, Col)> = None;
        for col in cols {
            if !self.involves(col) {
                continue;
            }
            if self.constraints.iter().any(|c| c.is_equality() && c.expr.get(col).abs() == 1) {
                return Some(col);
            }
            let (mut lo, mut up, mut eq, mut step) = (0usize, 0usize, 0usize, 1usize);
            let (mut unit_lo, mut unit_up) = (true, true);
            for c in &self.constraints {
                let v = c.expr.get(col);
                if v == 0 {
                    continue;
                }
                match c.kind {
                    ConstraintKind::Equality => eq += 1,
                    ConstraintKind::Congruence(m) => step = step.saturating_mul(m as usize),
                    ConstraintKind::Inequality if v > 0 => {
                        lo += 1;
                        unit_lo &= v == 1;
                    }
                    ConstraintKind::Inequality => {
                        up += 1;
                        unit_up &= v == -1;
                    }
                }
            }
            let pairs = lo * up;
            let cost = if eq > 0 {
                0
            } else if step > 1 {
                step.saturating_mul(pairs + 1)
            } else if unit_lo || unit_up {
                pairs
            } else {
                2 * pairs + lo
            };
            if best.map_or(true, |(b, _)| cost < b) {
                best = Some((cost, col));
            }
        }
        best.map(|(_, col)| col)
    }

    /// Does the system have an integer solution?
    pub fn is_feasible(&self) -> AlgebraResult<bool> {
        let mut pending = vec![self.clone()];
        while let Some(sys) = pending.pop() {
            let sys = match sys.simplify() {
                Some(sys) => sys,
                None => continue,
            };
            match sys.elimination_candidate() {
                // only constant constraints were left, and they all hold
                None => return Ok(true),
                Some(col) => pending.extend(sys.eliminate(col)?),
            }
        }
        Ok(false)
    }

    /// Eliminate and remove the dimensions `pos..pos + n`.
    ///
    /// Returns the non-empty pieces of the projection.
    pub fn project_out_dims(self, pos: usize, n: usize) -> AlgebraResult<Vec<ConstraintSystem>> {
        let mut current = vec![self];
        for d in (pos..pos + n).rev() {
            let mut next = Vec::with_capacity(current.len());
            for sys in current {
                for mut piece in sys.eliminate(Col::Dim(d))? {
                    piece.remove_dims(d, 1);
                    next.extend(piece.simplify());
                }
            }
            check_disjuncts(next.len())?;
            current = next;
        }
        prune_empty(current)
    }

    /// Eliminate and remove parameter `pos`.
    pub fn project_out_param(self, pos: usize) -> AlgebraResult<Vec<ConstraintSystem>> {
        let mut out = Vec::new();
        for mut piece in self.eliminate(Col::Param(pos))? {
            piece.remove_param(pos);
            out.extend(piece.simplify());
        }
        prune_empty(out)
    }

    /// Is every point of `self` also in `other`?
    pub fn is_subset_of(&self, other: &ConstraintSystem) -> AlgebraResult<bool> {
        for c in &other.constraints {
            for n in c.negate() {
                let mut test = self.clone();
                test.constraints.push(n);
                if test.is_feasible()? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Is `c` implied by the system?
    fn implies(&self, c: &Constraint) -> AlgebraResult<bool> {
        for n in c.negate() {
            let mut test = self.clone();
            test.constraints.push(n);
            if test.is_feasible()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn check_disjuncts(n: usize) -> AlgebraResult<()> {
    if n > MAX_DISJUNCTS {
        return Err(AlgebraError::TooComplex(format!("{} disjuncts", n)));
    }
    Ok(())
}

/// Intersect two unions of systems over the same columns.
pub(crate) fn intersect_disjuncts(
    a: &[ConstraintSystem],
    b: &[ConstraintSystem],
) -> AlgebraResult<Vec<ConstraintSystem>> {
    check_disjuncts(a.len() * b.len())?;
    let mut out = Vec::with_capacity(a.len() * b.len());
    for x in a {
        for y in b {
            if let Some(s) = x.conjoin(y).simplify() {
                out.push(s);
            }
        }
    }
    Ok(out)
}

/// Drop the disjuncts without integer points.
pub(crate) fn prune_empty(list: Vec<ConstraintSystem>) -> AlgebraResult<Vec<ConstraintSystem>> {
    let mut out = Vec::with_capacity(list.len());
    for d in list {
        if d.is_feasible()? {
            out.push(d);
        }
    }
    Ok(out)
}

/// Complement of a single conjunction as a union of disjoint pieces.
fn complement_basic(d: &ConstraintSystem) -> Vec<ConstraintSystem> {
    // not(c1 and c2 and ..) = not c1 or (c1 and not c2) or ..
    let mut out = Vec::new();
    let mut prefix = ConstraintSystem::new(d.n_dim, d.n_param);
    for c in &d.constraints {
        for n in c.negate() {
            let mut piece = prefix.clone();
            piece.constraints.push(n);
            if let Some(piece) = piece.simplify() {
                out.push(piece);
            }
        }
        prefix.constraints.push(c.clone());
    }
    out
}

/// Complement of a union of systems.
pub(crate) fn complement_disjuncts(
    list: &[ConstraintSystem],
    n_dim: usize,
    n_param: usize,
) -> AlgebraResult<Vec<ConstraintSystem>> {
    let mut result = vec![ConstraintSystem::new(n_dim, n_param)];
    for d in list {
        let pieces = complement_basic(d);
        result = prune_empty(intersect_disjuncts(&result, &pieces)?)?;
        if result.is_empty() {
            break;
        }
    }
    Ok(result)
}

/// `a` minus `b`.
pub(crate) fn subtract_disjuncts(
    a: &[ConstraintSystem],
    b: &[ConstraintSystem],
) -> AlgebraResult<Vec<ConstraintSystem>> {
    let mut out = Vec::new();
    for x in a {
        let mut pieces = vec![x.clone()];
        for y in b {
            let rest = complement_basic(y);
            pieces = prune_empty(intersect_disjuncts(&pieces, &rest)?)?;
            if pieces.is_empty() {
                break;
            }
        }
        out.extend(pieces);
        check_disjuncts(out.len())?;
    }
    Ok(out)
}

/// Is the union empty?
pub(crate) fn disjuncts_are_empty(list: &[ConstraintSystem]) -> AlgebraResult<bool> {
    for d in list {
        if d.is_feasible()? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Remove the constraints of `d` implied by the others.
fn remove_redundant(d: ConstraintSystem) -> AlgebraResult<ConstraintSystem> {
    let mut d = d;
    let mut i = 0;
    while i < d.constraints.len() {
        let mut rest = d.clone();
        let c = rest.constraints.remove(i);
        if rest.implies(&c)? {
            d = rest;
        } else {
            i += 1;
        }
    }
    Ok(d)
}

/// Try to replace `x` and `y` by a single conjunction.
fn merge_pair(x: &ConstraintSystem, y: &ConstraintSystem) -> AlgebraResult<Option<ConstraintSystem>> {
    let mut candidate = ConstraintSystem::new(x.n_dim, x.n_param);
    for c in &x.constraints {
        if y.implies(c)? {
            candidate.constraints.push(c.clone());
        }
    }
    for c in &y.constraints {
        if !candidate.constraints.contains(c) && x.implies(c)? {
            candidate.constraints.push(c.clone());
        }
    }
    let left = subtract_disjuncts(
        std::slice::from_ref(&candidate),
        &[x.clone(), y.clone()],
    )?;
    if disjuncts_are_empty(&left)? {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

/// Simplify the representation of a union without changing its meaning.
pub(crate) fn coalesce_disjuncts(list: Vec<ConstraintSystem>) -> AlgebraResult<Vec<ConstraintSystem>> {
    let mut list: Vec<ConstraintSystem> = prune_empty(list)?
        .into_iter()
        .map(remove_redundant)
        .collect::<AlgebraResult<_>>()?;
    if let Some(u) = list.iter().find(|d| d.is_unconstrained()) {
        return Ok(vec![u.clone()]);
    }

    // drop subsumed disjuncts
    let mut i = 0;
    while i < list.len() {
        let subsumed = (0..list.len()).any(|j| j != i && list[i].is_subset_of(&list[j]).unwrap_or(false));
        if subsumed {
            list.remove(i);
        } else {
            i += 1;
        }
    }

    // merge pairs whose combined hull adds no points
    let mut changed = true;
    while changed && list.len() > 1 {
        changed = false;
        'outer: for i in 0..list.len() {
            for j in i + 1..list.len() {
                if let Some(merged) = merge_pair(&list[i], &list[j])? {
                    list.remove(j);
                    list[i] = remove_redundant(merged)?;
                    changed = true;
                    break 'outer;
                }
            }
        }
    }
    if let Some(u) = list.iter().find(|d| d.is_unconstrained()) {
        return Ok(vec![u.clone()]);
    }
    Ok(list)
}

/// Simplify `list` assuming the context `context` holds.
///
/// Disjuncts disjoint from the context are dropped, and constraints implied
/// by the context together with the remaining constraints are removed.
pub(crate) fn gist_disjuncts(
    list: &[ConstraintSystem],
    context: &[ConstraintSystem],
) -> AlgebraResult<Vec<ConstraintSystem>> {
    let mut out = Vec::with_capacity(list.len());
    for x in list {
        let mut meets = false;
        for k in context {
            if x.conjoin(k).is_feasible()? {
                meets = true;
                break;
            }
        }
        if !meets {
            continue;
        }
        let mut kept = x.constraints.clone();
        let mut i = 0;
        while i < kept.len() {
            let c = kept[i].clone();
            let mut implied = true;
            for k in context {
                let mut test = k.clone();
                test.constraints.extend(kept.iter().enumerate().filter(|&(j, _)| j != i).map(|(_, c)| c.clone()));
                if !test.implies(&c)? {
                    implied = false;
                    break;
                }
            }
            if implied {
                kept.remove(i);
            } else {
                i += 1;
            }
        }
        let reduced = ConstraintSystem { constraints: kept, n_dim: x.n_dim, n_param: x.n_param };
        if reduced.is_unconstrained() {
            return Ok(vec![reduced]);
        }
        out.push(reduced);
    }
    Ok(out)
}
