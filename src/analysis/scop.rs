//! Static Control Part (SCoP) representation.
//!
//! A scop collects statements, the arrays they access and the parameter
//! constraints under which the representation is valid. While a scop is
//! being built it also tracks two skip conditions, which encode `break`
//! and `continue` in the loop body the scop represents:
//!
//! - [`SkipKind::Now`]: skip the rest of the current iteration
//! - [`SkipKind::Later`]: skip all subsequent iterations
//!
//! A skip condition is a function on a zero-dimensional domain. It is
//! either affine (its value only depends on the parameters) or an access
//! to a virtual 0/1-valued array.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::analysis::context::stmt_extract_context;
use crate::ir::{Array, Expr, Implication, Stmt, TypeDef};
use crate::polyhedral::{IntegerSet, MultiPwAff};
use crate::utils::errors::{AlgebraResult, ErrorKind, ScopResult};
use crate::utils::intern::{Ctx, Id};
use crate::utils::location::Loc;
use crate::utils::poly_print::PolyPrinter;

/// The two kinds of skip conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipKind {
    /// Skip the remainder of the current iteration
    Now,
    /// Skip all later iterations of the enclosing loop
    Later,
}

impl SkipKind {
    pub const ALL: [SkipKind; 2] = [SkipKind::Now, SkipKind::Later];

    fn index(self) -> usize {
        match self {
            SkipKind::Now => 0,
            SkipKind::Later => 1,
        }
    }
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipKind::Now => write!(f, "now"),
            SkipKind::Later => write!(f, "later"),
        }
    }
}

/// A static control part.
#[derive(Debug, Clone)]
pub struct Scop {
    /// Aggregate source range
    pub loc: Loc,
    /// Parameter values for which the scop is valid
    pub context: IntegerSet,
    /// Known parameter values
    pub context_value: IntegerSet,
    pub types: Vec<TypeDef>,
    pub arrays: Vec<Array>,
    /// Statements, in no particular order
    pub stmts: Vec<Stmt>,
    pub implications: Vec<Implication>,
    skip: [Option<MultiPwAff>; 2],
    /// Source file for reprinting statements verbatim
    input: Option<PathBuf>,
}

impl Default for Scop {
    fn default() -> Self {
        Self::empty()
    }
}

impl Scop {
    /// A scop without statements, valid for all parameter values.
    pub fn empty() -> Self {
        Self {
            loc: Loc::dummy(),
            context: IntegerSet::params_universe(Vec::new()),
            context_value: IntegerSet::params_universe(Vec::new()),
            types: Vec::new(),
            arrays: Vec::new(),
            stmts: Vec::new(),
            implications: Vec::new(),
            skip: [None, None],
            input: None,
        }
    }

    /// The scop containing only `stmt`.
    pub fn from_stmt(stmt: Stmt) -> ScopResult<Scop> {
        let mut scop = Scop::empty();
        scop.context = stmt_extract_context(&stmt, scop.context)?;
        scop.loc = stmt.loc;
        log::debug!("scop from statement {:?}", stmt.id().map(Id::name));
        scop.stmts.push(stmt);
        Ok(scop)
    }

    /// The scop containing the single statement executing `expr`.
    pub fn from_expr(ctx: &Ctx, loc: Loc, label: Option<Id>, id: usize, expr: Expr) -> ScopResult<Scop> {
        let stmt = Stmt::from_expr(ctx, loc, label, id, expr)?;
        Scop::from_stmt(stmt)
    }

    pub fn n_stmt(&self) -> usize {
        self.stmts.len()
    }

    pub fn n_array(&self) -> usize {
        self.arrays.len()
    }

    pub fn add_array(mut self, array: Array) -> Scop {
        self.arrays.push(array);
        self
    }

    // Source locations

    pub fn set_loc(mut self, loc: Loc) -> Scop {
        self.loc = loc;
        self
    }

    /// Extend the source range to include `start..end`.
    pub fn update_start_end(mut self, start: usize, end: usize) -> Scop {
        self.loc = self.loc.update_start_end(start, end);
        self
    }

    /// Extend the source range to include `loc`, unless it is a dummy.
    pub fn update_start_end_from_loc(self, loc: &Loc) -> Scop {
        if loc.is_dummy() {
            return self;
        }
        self.update_start_end(loc.start, loc.end)
    }

    // Skip conditions

    pub fn has_skip(&self, kind: SkipKind) -> bool {
        self.skip[kind.index()].is_some()
    }

    /// The skip condition depends only on the parameters.
    pub fn has_affine_skip(&self, kind: SkipKind) -> bool {
        self.skip(kind).map_or(false, |s| !s.has_out_id())
    }

    /// The skip condition is an access to a virtual variable.
    pub fn has_var_skip(&self, kind: SkipKind) -> bool {
        self.skip(kind).map_or(false, MultiPwAff::has_out_id)
    }

    /// The skip condition holds unconditionally.
    pub fn has_universal_skip(&self, kind: SkipKind) -> AlgebraResult<bool> {
        if !self.has_affine_skip(kind) {
            return Ok(false);
        }
        match self.skip(kind) {
            Some(skip) => Ok(skip.pw_aff(0)?.non_zero_set()?.plain_is_universe()),
            None => Ok(false),
        }
    }

    pub fn skip(&self, kind: SkipKind) -> Option<&MultiPwAff> {
        self.skip[kind.index()].as_ref()
    }

    pub fn set_skip(mut self, kind: SkipKind, skip: MultiPwAff) -> Scop {
        self.skip[kind.index()] = Some(skip);
        self
    }

    pub fn reset_skip(mut self, kind: SkipKind) -> Scop {
        self.skip[kind.index()] = None;
        self
    }

    pub(crate) fn take_skip(&mut self, kind: SkipKind) -> Option<MultiPwAff> {
        self.skip[kind.index()].take()
    }

    pub(crate) fn put_skip(&mut self, kind: SkipKind, skip: Option<MultiPwAff>) {
        self.skip[kind.index()] = skip;
    }

    /// The parameter values for which an affine skip condition holds.
    pub fn affine_skip_domain(&self, ctx: &Ctx, kind: SkipKind) -> ScopResult<IntegerSet> {
        match self.skip(kind) {
            Some(skip) if !skip.has_out_id() => Ok(skip.pw_aff(0)?.non_zero_set()?.params()?),
            _ => Err(ctx.die(ErrorKind::Invalid, format!("no affine skip {} condition", kind))),
        }
    }

    /// The virtual variable of a variable skip condition.
    pub fn skip_id(&self, kind: SkipKind) -> Option<&Id> {
        self.skip(kind).and_then(MultiPwAff::out_id)
    }

    /// A read of the skip condition.
    pub fn skip_expr(&self, ctx: &Ctx, kind: SkipKind) -> ScopResult<Expr> {
        match self.skip(kind) {
            Some(skip) => Ok(Expr::from_index(skip.clone())?),
            None => Err(ctx.die(ErrorKind::Invalid, format!("no skip {} condition", kind))),
        }
    }

    // Data-dependent control

    /// Some access depends on the value of other accesses.
    pub fn has_data_dependent_accesses(&self) -> bool {
        self.stmts.iter().any(|stmt| {
            stmt.args.iter().chain(std::iter::once(&stmt.body))
                .any(|e| e.accesses().iter().any(|acc| acc.n_arg() > 0))
        })
    }

    /// Some statement domain depends on the value of accesses.
    pub fn has_data_dependent_conditions(&self) -> bool {
        self.stmts.iter().any(|stmt| stmt.n_arg() > 0)
    }

    // Reprinting

    /// Remember the file the scop was extracted from.
    pub fn set_input_file(mut self, path: impl AsRef<Path>) -> Scop {
        self.input = Some(path.as_ref().to_path_buf());
        self
    }

    /// Take over the input file of `other` if none is set.
    pub(crate) fn inherit_input(&mut self, other: &Scop) -> &mut Scop {
        if self.input.is_none() {
            self.input = other.input.clone();
        }
        self
    }

    /// Copy the source text of `loc` from the input file to `out`.
    pub fn print_original(&self, ctx: &Ctx, loc: &Loc, out: &mut impl Write) -> ScopResult<()> {
        let path = match &self.input {
            Some(path) => path,
            None => return Err(ctx.die(ErrorKind::Invalid, "no input file stored in scop")),
        };
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(loc.start as u64))?;
        let mut text = Vec::with_capacity(loc.len());
        file.take(loc.len() as u64).read_to_end(&mut text)?;
        out.write_all(&text)?;
        Ok(())
    }

    // Equality and dumps

    /// Structural equality, ignoring element sizes and type definitions.
    pub fn is_equal(&self, other: &Scop) -> AlgebraResult<bool> {
        if !self.context.is_equal(&other.context)?
            || !self.context_value.is_equal(&other.context_value)?
            || self.types.len() != other.types.len()
            || self.arrays.len() != other.arrays.len()
            || self.stmts.len() != other.stmts.len()
            || self.implications.len() != other.implications.len()
        {
            return Ok(false);
        }
        if !self.types.iter().zip(&other.types).all(|(a, b)| a.is_equal(b)) {
            return Ok(false);
        }
        for (a, b) in self.arrays.iter().zip(&other.arrays) {
            if !a.is_equal(b)? {
                return Ok(false);
            }
        }
        for (a, b) in self.stmts.iter().zip(&other.stmts) {
            if !a.is_equal(b)? {
                return Ok(false);
            }
        }
        for (a, b) in self.implications.iter().zip(&other.implications) {
            if !a.is_equal(b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn dump(&self, printer: &mut PolyPrinter) {
        printer.field("context", &self.context);
        printer.field("context_value", &self.context_value);
        for ty in &self.types {
            ty.dump(printer);
        }
        for array in &self.arrays {
            printer.nested("array", |p| array.dump(p));
        }
        for stmt in &self.stmts {
            printer.nested("stmt", |p| stmt.dump(p));
        }
        for implication in &self.implications {
            printer.nested("implication", |p| implication.dump(p));
        }
        for kind in SkipKind::ALL {
            if let Some(skip) = self.skip(kind) {
                printer.field(&format!("skip {}", kind), skip);
            }
        }
    }
}

impl fmt::Display for Scop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = PolyPrinter::new();
        self.dump(&mut printer);
        write!(f, "{}", printer.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_multi_pw_aff, parse_set};
    use crate::ir::OpKind;

    fn assign(ctx: &Ctx, index: &str) -> Expr {
        let lhs = Expr::write_access(parse_multi_pw_aff(ctx, index).unwrap()).unwrap();
        Expr::assign(lhs, Expr::Int(1))
    }

    #[test]
    fn test_from_expr() {
        let ctx = Ctx::new();
        let loc = Loc::new(10, 20, Some(2));
        let scop = Scop::from_expr(&ctx, loc, None, 0, assign(&ctx, "[N] -> { [] -> A[N] : N >= 0 }")).unwrap();
        assert_eq!(scop.n_stmt(), 1);
        assert_eq!(scop.loc, loc);
        let expected = parse_set(&ctx, "[N] -> { : N >= 0 }").unwrap();
        assert!(scop.context.is_equal(&expected).unwrap());
        assert!(!scop.has_skip(SkipKind::Now));
    }

    #[test]
    fn test_assume_restricts_context() {
        let ctx = Ctx::new();
        let cond = Expr::from_index(parse_multi_pw_aff(&ctx, "[N] -> { [] -> [N - 3] }").unwrap()).unwrap();
        let body = Expr::op(OpKind::Assume, vec![cond]);
        let scop = Scop::from_expr(&ctx, Loc::dummy(), None, 0, body).unwrap();
        assert!(scop.stmts[0].is_assume());
        assert!(scop.context.contains(&[], &[4]));
        assert!(!scop.context.contains(&[], &[3]));
    }

    #[test]
    fn test_skip_accessors() {
        let ctx = Ctx::new();
        let affine = parse_multi_pw_aff(&ctx, "[b] -> { [] -> [b] }").unwrap();
        let scop = Scop::empty().set_skip(SkipKind::Now, affine);
        assert!(scop.has_affine_skip(SkipKind::Now));
        assert!(!scop.has_var_skip(SkipKind::Now));
        assert!(!scop.has_universal_skip(SkipKind::Now).unwrap());
        let domain = scop.affine_skip_domain(&ctx, SkipKind::Now).unwrap();
        assert!(domain.contains(&[], &[2]));
        assert!(!domain.contains(&[], &[0]));

        ctx.virtual_id("__pet_test_0");
        let var = parse_multi_pw_aff(&ctx, "{ [] -> __pet_test_0[] }").unwrap();
        let scop = scop.set_skip(SkipKind::Later, var);
        assert!(scop.has_var_skip(SkipKind::Later));
        assert_eq!(scop.skip_id(SkipKind::Later).map(Id::name), Some("__pet_test_0"));
        assert!(scop.skip_expr(&ctx, SkipKind::Later).unwrap().as_access().unwrap().read);

        let scop = scop.reset_skip(SkipKind::Later);
        assert!(!scop.has_skip(SkipKind::Later));
        assert!(scop.skip_expr(&ctx, SkipKind::Later).is_err());
        assert_eq!(ctx.last_error(), Some(ErrorKind::Invalid));
    }

    #[test]
    fn test_universal_skip() {
        let ctx = Ctx::new();
        let always = parse_multi_pw_aff(&ctx, "{ [] -> [1] }").unwrap();
        let scop = Scop::empty().set_skip(SkipKind::Now, always);
        assert!(scop.has_universal_skip(SkipKind::Now).unwrap());
    }

    #[test]
    fn test_update_start_end() {
        let ctx = Ctx::new();
        let scop = Scop::from_expr(&ctx, Loc::new(10, 20, Some(1)), None, 0, assign(&ctx, "{ [] -> A[] }")).unwrap();
        let scop = scop.update_start_end(5, 12).update_start_end_from_loc(&Loc::dummy());
        assert_eq!((scop.loc.start, scop.loc.end), (5, 20));
    }

    #[test]
    fn test_print_original() {
        let ctx = Ctx::new();
        let scop = Scop::empty();
        let mut out = Vec::new();
        assert!(scop.print_original(&ctx, &Loc::new(0, 3, None), &mut out).is_err());

        let path = std::env::temp_dir().join(format!("polyscop_print_original_{}.c", std::process::id()));
        std::fs::write(&path, "int x;\nA[i] = B[i];\n").unwrap();
        let scop = scop.set_input_file(&path);
        scop.print_original(&ctx, &Loc::new(7, 19, Some(2)), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A[i] = B[i];");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_data_dependence_predicates() {
        let ctx = Ctx::new();
        let mut scop = Scop::from_expr(&ctx, Loc::dummy(), None, 0, assign(&ctx, "{ [] -> A[] }")).unwrap();
        assert!(!scop.has_data_dependent_accesses());
        assert!(!scop.has_data_dependent_conditions());
        scop.stmts[0].args.push(Expr::from_index(parse_multi_pw_aff(&ctx, "{ S_0[] -> c[] }").unwrap()).unwrap());
        assert!(scop.has_data_dependent_conditions());
    }

    #[test]
    fn test_equality_and_dump() {
        let ctx = Ctx::new();
        let a = Scop::from_expr(&ctx, Loc::dummy(), None, 0, assign(&ctx, "{ [] -> A[] }")).unwrap();
        let b = Scop::from_expr(&ctx, Loc::dummy(), None, 0, assign(&ctx, "{ [] -> A[] }")).unwrap();
        assert!(a.is_equal(&b).unwrap());
        assert!(b.is_equal(&a).unwrap());
        let mut c = b.clone();
        c.types.push(TypeDef::new("t", "int"));
        assert!(!a.is_equal(&c).unwrap());
        let text = a.to_string();
        assert!(text.contains("stmt:\n"));
        assert!(text.contains("op: ="));
    }
}
