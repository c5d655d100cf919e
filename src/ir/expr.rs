//! Expression trees attached to statements.
//!
//! An expression is either an access to an array element, an operation
//! on sub-expressions, a call or an integer literal. Accesses carry both
//! an index function and an access relation. An access whose index
//! depends on the values of other accesses lists those as arguments; its
//! index and relation are then defined on the wrapped space
//! `[S[i] -> [a_0, ..., a_n]]`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::polyhedral::{
    Aff, AffineExpr, IntegerMap, IntegerSet, MultiAff, MultiPwAff, Space, Tuple, UnionMap,
};
use crate::polyhedral::space::merge_params;
use crate::utils::errors::AlgebraResult;
use crate::utils::intern::{Ctx, Id};
use crate::utils::poly_print::PolyPrinter;

/// Operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    /// Marks the accessed elements as dead
    Kill,
    /// Ternary conditional `c ? a : b`
    Cond,
    /// The argument is known to be non-zero
    Assume,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Minus,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AddressOf,
}

impl OpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            OpKind::Assign => "=",
            OpKind::AddAssign => "+=",
            OpKind::SubAssign => "-=",
            OpKind::MulAssign => "*=",
            OpKind::DivAssign => "/=",
            OpKind::Kill => "kill",
            OpKind::Cond => "?:",
            OpKind::Assume => "assume",
            OpKind::Add => "+",
            OpKind::Sub | OpKind::Minus => "-",
            OpKind::Mul => "*",
            OpKind::Div => "/",
            OpKind::Mod => "%",
            OpKind::Not => "!",
            OpKind::And => "&&",
            OpKind::Or => "||",
            OpKind::Eq => "==",
            OpKind::Ne => "!=",
            OpKind::Lt => "<",
            OpKind::Le => "<=",
            OpKind::Gt => ">",
            OpKind::Ge => ">=",
            OpKind::AddressOf => "&",
        }
    }

    /// Check if this is a (compound) assignment.
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            OpKind::Assign | OpKind::AddAssign | OpKind::SubAssign | OpKind::MulAssign | OpKind::DivAssign
        )
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// An access to an array element.
#[derive(Debug, Clone)]
pub struct AccessExpr {
    /// Index function: iteration point to accessed element
    pub index: MultiPwAff,
    /// Access relation, possibly an over-approximation of the index
    pub access: IntegerMap,
    pub read: bool,
    pub write: bool,
    pub kill: bool,
    /// Reference identifier, assigned by `add_ref_ids`
    pub ref_id: Option<Id>,
    /// Accesses whose values the index depends on
    pub args: Vec<Expr>,
}

impl AccessExpr {
    /// A read access through `index`.
    pub fn from_index(index: MultiPwAff) -> AlgebraResult<Self> {
        let access = index.to_map()?;
        Ok(Self {
            index,
            access,
            read: true,
            write: false,
            kill: false,
            ref_id: None,
            args: Vec::new(),
        })
    }

    /// The accessed array, if the index has a named range.
    pub fn id(&self) -> Option<&Id> {
        self.index.out_id()
    }

    /// An access with an anonymous range is an affine expression rather
    /// than an array access.
    pub fn is_affine(&self) -> bool {
        !self.index.has_out_id()
    }

    pub fn n_arg(&self) -> usize {
        self.args.len()
    }

    /// Precompose index and relation with `ma`, lifting it over the
    /// argument values of a data-dependent access.
    pub fn update_domain(mut self, ma: &MultiAff) -> AlgebraResult<Self> {
        let lifted;
        let ma = match self.access.domain_tuple().unwrap_pair() {
            Some((_, args)) => {
                lifted = ma.lift_wrapped(args);
                &lifted
            }
            None => ma,
        };
        self.index = self.index.pullback(ma)?;
        self.access = self.access.preimage_domain_multi_aff(ma)?;
        Ok(self)
    }

    /// The access relation with the argument values projected out.
    pub fn may_access(&self) -> AlgebraResult<IntegerMap> {
        if self.args.is_empty() {
            return Ok(self.access.clone());
        }
        self.access.domain_factor_domain()
    }

    /// Tag the domain of `map` with the reference identifier.
    pub fn tag(&self, map: IntegerMap) -> IntegerMap {
        match &self.ref_id {
            Some(id) => map.tag_domain(Tuple::named(id.clone(), 0)),
            None => map,
        }
    }

    /// Replace the index of a read of a 0-D array named after parameter
    /// `id` by the value of that parameter.
    fn as_parameter(mut self, id: &Id) -> AlgebraResult<Self> {
        let domain = self.index.domain_space();
        let params = merge_params(&domain.params, std::slice::from_ref(id));
        let pos = params.iter().position(|p| p == id).unwrap_or(0);
        let space = Space::set(params.clone(), domain.range.clone());
        let value = AffineExpr::param(pos, space.n_out(), params.len());
        self.index = MultiPwAff::from_aff(&Aff::new(&space, value));
        self.access = self.index.to_map()?;
        Ok(self)
    }

    fn is_equal(&self, other: &AccessExpr) -> AlgebraResult<bool> {
        if self.read != other.read
            || self.write != other.write
            || self.kill != other.kill
            || self.ref_id != other.ref_id
            || self.args.len() != other.args.len()
        {
            return Ok(false);
        }
        if !self.index.is_equal(&other.index)? || !self.access.is_equal(&other.access)? {
            return Ok(false);
        }
        for (a, b) in self.args.iter().zip(&other.args) {
            if !a.is_equal(b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// An expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Access(AccessExpr),
    Op { kind: OpKind, args: Vec<Expr> },
    Call { name: String, args: Vec<Expr> },
    Int(i64),
}

impl Expr {
    /// A read access through `index`.
    pub fn from_index(index: MultiPwAff) -> AlgebraResult<Expr> {
        Ok(Expr::Access(AccessExpr::from_index(index)?))
    }

    /// A write access through `index`.
    pub fn write_access(index: MultiPwAff) -> AlgebraResult<Expr> {
        let mut access = AccessExpr::from_index(index)?;
        access.read = false;
        access.write = true;
        Ok(Expr::Access(access))
    }

    pub fn op(kind: OpKind, args: Vec<Expr>) -> Expr {
        Expr::Op { kind, args }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call { name: name.into(), args }
    }

    /// `lhs = rhs`.
    pub fn assign(lhs: Expr, rhs: Expr) -> Expr {
        Expr::op(OpKind::Assign, vec![lhs, rhs])
    }

    /// A kill of the elements accessed through `index`.
    pub fn kill(index: MultiPwAff) -> AlgebraResult<Expr> {
        let mut access = AccessExpr::from_index(index)?;
        access.read = false;
        access.kill = true;
        Ok(Expr::op(OpKind::Kill, vec![Expr::Access(access)]))
    }

    pub fn args(&self) -> &[Expr] {
        match self {
            Expr::Access(acc) => &acc.args,
            Expr::Op { args, .. } | Expr::Call { args, .. } => args,
            Expr::Int(_) => &[],
        }
    }

    pub fn n_arg(&self) -> usize {
        self.args().len()
    }

    pub fn arg(&self, pos: usize) -> Option<&Expr> {
        self.args().get(pos)
    }

    pub fn as_access(&self) -> Option<&AccessExpr> {
        match self {
            Expr::Access(acc) => Some(acc),
            _ => None,
        }
    }

    pub fn op_kind(&self) -> Option<OpKind> {
        match self {
            Expr::Op { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if this is an access with an anonymous (affine) index.
    pub fn is_affine(&self) -> bool {
        self.as_access().map_or(false, AccessExpr::is_affine)
    }

    /// Apply `f` to every access in the tree, inner accesses first.
    pub fn map_access<E, F>(self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(AccessExpr) -> Result<AccessExpr, E>,
    {
        match self {
            Expr::Access(mut acc) => {
                acc.args = map_args(acc.args, f)?;
                Ok(Expr::Access(f(acc)?))
            }
            Expr::Op { kind, args } => Ok(Expr::Op { kind, args: map_args(args, f)? }),
            Expr::Call { name, args } => Ok(Expr::Call { name, args: map_args(args, f)? }),
            Expr::Int(v) => Ok(Expr::Int(v)),
        }
    }

    /// All accesses in the tree, outer accesses first.
    pub fn accesses(&self) -> Vec<&AccessExpr> {
        let mut result = Vec::new();
        self.collect_accesses_into(&mut result);
        result
    }

    fn collect_accesses_into<'a>(&'a self, result: &mut Vec<&'a AccessExpr>) {
        if let Expr::Access(acc) = self {
            result.push(acc);
        }
        for arg in self.args() {
            arg.collect_accesses_into(result);
        }
    }

    /// Precompose every access with `ma`.
    pub fn update_domain(self, ma: &MultiAff) -> AlgebraResult<Expr> {
        self.map_access(&mut |acc| acc.update_domain(ma))
    }

    /// Merge the parameters of every access into `params`.
    pub fn collect_params(&self, params: Vec<Id>) -> Vec<Id> {
        self.accesses().iter().fold(params, |ps, acc| {
            let ps = merge_params(&ps, &acc.index.space().params);
            merge_params(&ps, acc.access.params_list())
        })
    }

    pub fn align_params(self, params: &[Id]) -> AlgebraResult<Expr> {
        self.map_access(&mut |mut acc| {
            acc.index = acc.index.align_params(params);
            acc.access = acc.access.align_params(params);
            Ok(acc)
        })
    }

    /// Turn reads of 0-D arrays named after one of `params` into
    /// references to that parameter.
    pub fn detect_parameter_accesses(self, params: &[Id]) -> AlgebraResult<Expr> {
        self.map_access(&mut |acc| {
            if acc.is_affine() || acc.write || acc.n_arg() != 0 || acc.index.n_out() != 0 {
                return Ok(acc);
            }
            match acc.id().filter(|id| params.contains(id)).cloned() {
                Some(id) => acc.as_parameter(&id),
                None => Ok(acc),
            }
        })
    }

    /// Apply the infallible `f` to every access in the tree, inner
    /// accesses first.
    pub fn for_each_access<F>(self, f: &mut F) -> Expr
    where
        F: FnMut(AccessExpr) -> AccessExpr,
    {
        let walk = |args: Vec<Expr>, f: &mut F| args.into_iter().map(|arg| arg.for_each_access(f)).collect();
        match self {
            Expr::Access(mut acc) => {
                acc.args = walk(acc.args, f);
                Expr::Access(f(acc))
            }
            Expr::Op { kind, args } => Expr::Op { kind, args: walk(args, f) },
            Expr::Call { name, args } => Expr::Call { name, args: walk(args, f) },
            Expr::Int(v) => Expr::Int(v),
        }
    }

    /// Assign fresh reference identifiers, numbering from `*n_ref`.
    pub fn add_ref_ids(self, ctx: &Ctx, n_ref: &mut usize) -> Expr {
        let prefix = ctx.config().ref_prefix.clone();
        self.for_each_access(&mut |mut acc| {
            acc.ref_id = Some(ctx.virtual_id(&format!("{}_{}", prefix, *n_ref)));
            *n_ref += 1;
            acc
        })
    }

    /// Drop the source identity of every identifier in the tree.
    pub fn anonymize(self) -> Expr {
        self.for_each_access(&mut |mut acc| {
            acc.index = acc.index.reset_user();
            acc.access = acc.access.reset_user();
            acc.ref_id = acc.ref_id.map(|id| id.anonymized());
            acc
        })
    }

    /// Simplify every access assuming the statement instance lies in
    /// `domain` and arguments satisfy `value_bounds`.
    pub fn gist(self, domain: &IntegerSet, value_bounds: &UnionMap) -> AlgebraResult<Expr> {
        self.map_access(&mut |mut acc| {
            let context = if acc.args.is_empty() {
                domain.clone()
            } else {
                apply_value_bounds(domain, &acc.args, value_bounds)?
            };
            if context.tuple() != acc.access.domain_tuple() && !context.is_params() {
                log::debug!("not simplifying access to {:?}: context lives in {}", acc.id(), context.space());
                return Ok(acc);
            }
            acc.access = acc.access.gist_domain(&context)?;
            acc.index = acc.index.gist_domain(&context)?;
            Ok(acc)
        })
    }

    pub fn is_equal(&self, other: &Expr) -> AlgebraResult<bool> {
        match (self, other) {
            (Expr::Access(a), Expr::Access(b)) => a.is_equal(b),
            (Expr::Op { kind: ka, args: a }, Expr::Op { kind: kb, args: b }) => {
                if ka != kb {
                    return Ok(false);
                }
                args_equal(a, b)
            }
            (Expr::Call { name: na, args: a }, Expr::Call { name: nb, args: b }) => {
                if na != nb {
                    return Ok(false);
                }
                args_equal(a, b)
            }
            (Expr::Int(a), Expr::Int(b)) => Ok(a == b),
            _ => Ok(false),
        }
    }

    pub fn dump(&self, printer: &mut PolyPrinter) {
        match self {
            Expr::Access(acc) => {
                printer.field("index", &acc.index);
                if let Some(id) = &acc.ref_id {
                    printer.field("ref_id", id);
                }
                printer.field("access", &acc.access);
                printer.field("read", acc.read as u8);
                printer.field("write", acc.write as u8);
                if acc.kill {
                    printer.field("kill", 1);
                }
                dump_args(printer, &acc.args);
            }
            Expr::Op { kind, args } => {
                printer.field("op", kind);
                dump_args(printer, args);
            }
            Expr::Call { name, args } => {
                printer.field("call", name);
                dump_args(printer, args);
            }
            Expr::Int(v) => printer.field("int", v),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = PolyPrinter::new();
        self.dump(&mut printer);
        write!(f, "{}", printer.output())
    }
}

fn map_args<E, F>(args: Vec<Expr>, f: &mut F) -> Result<Vec<Expr>, E>
where
    F: FnMut(AccessExpr) -> Result<AccessExpr, E>,
{
    args.into_iter().map(|arg| arg.map_access(f)).collect()
}

fn args_equal(a: &[Expr], b: &[Expr]) -> AlgebraResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.is_equal(y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn dump_args(printer: &mut PolyPrinter, args: &[Expr]) {
    if args.is_empty() {
        return;
    }
    printer.nested("args", |p| {
        for arg in args {
            p.nested("arg", |p| arg.dump(p));
        }
    });
}

/// The wrapped set `[domain -> [a_0, ..., a_n]]` where each `a_i` read
/// from an array with recorded bounds is constrained by those bounds.
///
/// `value_bounds` maps array elements `A[...]` to their possible values `[v]`.
pub fn apply_value_bounds(
    domain: &IntegerSet,
    args: &[Expr],
    value_bounds: &UnionMap,
) -> AlgebraResult<IntegerSet> {
    let n = args.len();
    let values = IntegerSet::universe(Space::set(Vec::new(), Tuple::anonymous(n)));
    let mut map = IntegerMap::from_domain_and_range(domain, &values)?;
    for (i, arg) in args.iter().enumerate() {
        let acc = match arg.as_access() {
            Some(acc) => acc,
            None => continue,
        };
        let bounds = match acc.id().and_then(|id| value_bounds.maps().iter().find(|m| m.in_id() == Some(id))) {
            Some(bounds) => bounds,
            None => continue,
        };
        let access = acc.may_access()?;
        if bounds.n_in() != access.n_out() || bounds.n_out() != 1 || access.domain_tuple() != map.domain_tuple() {
            continue;
        }
        let bound = access
            .apply_range(bounds)?
            .set_out_id(None)
            .insert_out_dims(0, i)?
            .add_out_dims(n - i - 1)?;
        map = map.intersect(&bound)?;
    }
    Ok(map.wrap())
}
