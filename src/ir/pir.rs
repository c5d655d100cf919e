//! Polyhedral Intermediate Representation (PIR) entities.
//!
//! The PIR describes a static control part in polyhedral form:
//! - Statements with iteration domains, schedules and expression trees
//! - Arrays with their extents and value bounds
//! - Implications between filters on virtual arrays
//! - Type definitions referenced by the arrays

use crate::ir::expr::{Expr, OpKind};
use crate::polyhedral::{IntegerMap, IntegerSet, MultiAff, Space, Tuple};
use crate::utils::errors::{AlgebraResult, ScopResult};
use crate::utils::intern::{Ctx, Id};
use crate::utils::location::Loc;
use crate::utils::poly_print::PolyPrinter;

/// An array accessed by the statements.
#[derive(Debug, Clone)]
pub struct Array {
    /// Parameter constraints under which the array is valid
    pub context: IntegerSet,
    /// Set of valid index tuples
    pub extent: IntegerSet,
    /// Constraints on the values stored in the array, if known
    pub value_bounds: Option<IntegerSet>,
    /// Name of the element type
    pub element_type: String,
    /// Size of an element in bytes
    pub element_size: usize,
    pub element_is_record: bool,
    pub live_out: bool,
    /// Every element is written at most once
    pub uniquely_defined: bool,
    /// Declared inside the scop
    pub declared: bool,
    /// Declared inside the scop but visible outside
    pub exposed: bool,
}

impl Array {
    /// An array of `element_type` valid everywhere in `extent`.
    pub fn new(extent: IntegerSet, element_type: impl Into<String>, element_size: usize) -> Self {
        let context = IntegerSet::params_universe(Vec::new());
        Self {
            context,
            extent,
            value_bounds: None,
            element_type: element_type.into(),
            element_size,
            element_is_record: false,
            live_out: false,
            uniquely_defined: false,
            declared: false,
            exposed: false,
        }
    }

    pub fn id(&self) -> Option<&Id> {
        self.extent.tuple_id()
    }

    /// A compiler-synthesized array, grown along with enclosing loops.
    pub fn is_virtual(&self) -> bool {
        !self.extent.is_wrapping() && self.id().map_or(false, Id::is_virtual)
    }

    /// Compare everything except the element size.
    pub fn is_equal(&self, other: &Array) -> AlgebraResult<bool> {
        if !self.context.is_equal(&other.context)? || !self.extent.is_equal(&other.extent)? {
            return Ok(false);
        }
        match (&self.value_bounds, &other.value_bounds) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                if !a.is_equal(b)? {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
        Ok(self.element_type == other.element_type
            && self.element_is_record == other.element_is_record
            && self.live_out == other.live_out
            && self.uniquely_defined == other.uniquely_defined
            && self.declared == other.declared
            && self.exposed == other.exposed)
    }

    pub fn dump(&self, printer: &mut PolyPrinter) {
        printer.field("context", &self.context);
        printer.field("extent", &self.extent);
        if let Some(bounds) = &self.value_bounds {
            printer.field("value_bounds", bounds);
        }
        let mut flags = self.element_type.clone();
        if self.element_is_record {
            flags.push_str(" element-is-record");
        }
        if self.live_out {
            flags.push_str(" live-out");
        }
        printer.field("element_type", flags);
    }
}

/// A type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    /// Textual definition
    pub definition: String,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self { name: name.into(), definition: definition.into() }
    }

    /// Types are identified by name; the definition text is not compared.
    pub fn is_equal(&self, other: &TypeDef) -> bool {
        self.name == other.name
    }

    pub fn dump(&self, printer: &mut PolyPrinter) {
        printer.line(format_args!("{} -> {}", self.name, self.definition));
    }
}

/// A recorded containment between filter accesses.
///
/// Whenever the virtual array element `i` has value `satisfied`, so do
/// all elements `j` with `i -> j` in `extension`.
#[derive(Debug, Clone)]
pub struct Implication {
    pub extension: IntegerMap,
    pub satisfied: bool,
}

impl Implication {
    pub fn new(extension: IntegerMap, satisfied: bool) -> Self {
        Self { extension, satisfied }
    }

    pub fn is_equal(&self, other: &Implication) -> AlgebraResult<bool> {
        if self.satisfied != other.satisfied {
            return Ok(false);
        }
        self.extension.is_equal(&other.extension)
    }

    pub fn dump(&self, printer: &mut PolyPrinter) {
        printer.field("satisfied", self.satisfied as u8);
        printer.field("extension", &self.extension);
    }
}

/// A statement of the scop.
#[derive(Debug, Clone)]
pub struct Stmt {
    /// Source location
    pub loc: Loc,
    /// Iteration domain, wrapped as `[S[i] -> [args]]` if there are arguments
    pub domain: IntegerSet,
    /// Iteration domain to relative execution order
    pub schedule: IntegerMap,
    /// Root of the expression tree
    pub body: Expr,
    /// Accesses whose values the domain depends on
    pub args: Vec<Expr>,
}

impl Stmt {
    /// Build the statement executing `expr` once.
    ///
    /// The statement is named `label`, or `S_<id>` if there is no label.
    pub fn from_expr(ctx: &Ctx, loc: Loc, label: Option<Id>, id: usize, expr: Expr) -> ScopResult<Stmt> {
        let name = label.unwrap_or_else(|| ctx.virtual_id(&format!("{}_{}", ctx.config().stmt_prefix, id)));
        let tuple = Tuple::named(name, 0);
        let domain = IntegerSet::universe(Space::set(Vec::new(), tuple.clone()));
        let schedule = IntegerMap::from_domain(&domain);
        let add_name = MultiAff::zero(Space::map(Vec::new(), tuple, Tuple::anonymous(0)));
        let body = expr.update_domain(&add_name)?;
        log::trace!("new statement {}", domain);
        Ok(Stmt { loc, domain, schedule, body, args: Vec::new() })
    }

    pub fn id(&self) -> Option<&Id> {
        self.iteration_tuple().id.as_ref()
    }

    fn iteration_tuple(&self) -> &Tuple {
        match self.domain.tuple().unwrap_pair() {
            Some((iter, _)) => iter,
            None => self.domain.tuple(),
        }
    }

    /// The iteration space, without the argument values.
    pub fn space(&self) -> Space {
        Space::set(self.domain.params_list().to_vec(), self.iteration_tuple().clone())
    }

    pub fn n_arg(&self) -> usize {
        self.args.len()
    }

    /// The iteration domain, with the argument values projected out.
    pub fn iteration_domain(&self) -> AlgebraResult<IntegerSet> {
        if self.domain.is_wrapping() {
            self.domain.unwrap()?.domain()?.with_tuple(self.iteration_tuple().clone())
        } else {
            Ok(self.domain.clone())
        }
    }

    pub fn is_assign(&self) -> bool {
        self.body.op_kind() == Some(OpKind::Assign)
    }

    pub fn is_kill(&self) -> bool {
        self.body.op_kind() == Some(OpKind::Kill)
    }

    /// Is the body an assume expression?
    pub fn is_assume(&self) -> bool {
        self.body.op_kind() == Some(OpKind::Assume)
    }

    /// Compare line, domain, schedule, body and arguments.
    pub fn is_equal(&self, other: &Stmt) -> AlgebraResult<bool> {
        if self.loc.line != other.loc.line
            || self.args.len() != other.args.len()
            || !self.domain.is_equal(&other.domain)?
            || !self.schedule.is_equal(&other.schedule)?
            || !self.body.is_equal(&other.body)?
        {
            return Ok(false);
        }
        for (a, b) in self.args.iter().zip(&other.args) {
            if !a.is_equal(b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn dump(&self, printer: &mut PolyPrinter) {
        printer.field("line", self.loc.line.map_or(-1, |l| l as i64));
        printer.field("domain", &self.domain);
        printer.field("schedule", &self.schedule);
        printer.nested("body", |p| self.body.dump(p));
        if !self.args.is_empty() {
            printer.nested("args", |p| {
                for arg in &self.args {
                    p.nested("arg", |p| arg.dump(p));
                }
            });
        }
    }
}
