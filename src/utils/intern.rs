//! Identifier interning and the shared allocation context.
//!
//! Every identifier (tuple names, parameters, reference ids) is created
//! through a [`Ctx`], which interns its name and remembers the kind it was
//! registered with. The context also serves as the diagnostic channel for
//! invariant violations. It must outlive every value built through it.

use string_interner::{backend::StringBackend, DefaultSymbol, StringInterner};
use serde::{Serialize, Deserialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ScopConfig;
use crate::utils::errors::{Diagnostic, ErrorKind, ScopError};

type Backend = StringBackend<DefaultSymbol>;

/// What an identifier stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdKind {
    /// Has a source-level identity (a declared variable or array)
    Named,
    /// Compiler-synthesized (test arrays, statement labels, reference ids)
    Virtual,
    /// Auxiliary parameter standing for the value of a nested access
    Nested,
}

/// An interned identifier.
///
/// Two identifiers are the same if they have the same name and kind.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Id {
    name: Rc<str>,
    kind: IdKind,
}

impl Id {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == IdKind::Virtual
    }

    pub fn is_nested(&self) -> bool {
        self.kind == IdKind::Nested
    }

    /// Drop the source identity of this identifier.
    pub fn anonymized(&self) -> Id {
        match self.kind {
            IdKind::Named => Id { name: self.name.clone(), kind: IdKind::Virtual },
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IdKind::Named => write!(f, "{}", self.name),
            IdKind::Virtual => write!(f, "{}@virtual", self.name),
            IdKind::Nested => write!(f, "{}@nested", self.name),
        }
    }
}

/// Allocation and identifier-interning context.
pub struct Ctx {
    interner: RefCell<StringInterner<Backend>>,
    kinds: RefCell<HashMap<DefaultSymbol, IdKind>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    last_error: Cell<Option<ErrorKind>>,
    config: ScopConfig,
}

impl Default for Ctx {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("n_ids", &self.n_ids())
            .field("last_error", &self.last_error.get())
            .field("config", &self.config)
            .finish()
    }
}

impl Ctx {
    pub fn new() -> Self {
        Self::with_config(ScopConfig::default())
    }

    pub fn with_config(config: ScopConfig) -> Self {
        Self {
            interner: RefCell::new(StringInterner::new()),
            kinds: RefCell::new(HashMap::new()),
            diagnostics: RefCell::new(Vec::new()),
            last_error: Cell::new(None),
            config,
        }
    }

    pub fn config(&self) -> &ScopConfig {
        &self.config
    }

    fn intern(&self, name: &str) -> (DefaultSymbol, Rc<str>) {
        let mut interner = self.interner.borrow_mut();
        let sym = interner.get_or_intern(name);
        let resolved = interner.resolve(sym).unwrap_or(name);
        (sym, Rc::from(resolved))
    }

    /// The name interned as `sym`.
    pub fn resolve(&self, sym: DefaultSymbol) -> Option<Rc<str>> {
        self.interner.borrow().resolve(sym).map(Rc::from)
    }

    /// The symbol `name` is interned as, if it was seen.
    pub fn symbol(&self, name: &str) -> Option<DefaultSymbol> {
        self.interner.borrow().get(name)
    }

    /// Get the identifier for `name`, using the kind it was registered with.
    /// Unregistered names are treated as named source entities.
    pub fn id(&self, name: &str) -> Id {
        let (sym, name) = self.intern(name);
        let kind = self.kinds.borrow().get(&sym).copied().unwrap_or(IdKind::Named);
        Id { name, kind }
    }

    /// Get the identifier for `name` and register it with `kind`.
    pub fn id_with_kind(&self, name: &str, kind: IdKind) -> Id {
        let (sym, name) = self.intern(name);
        self.kinds.borrow_mut().insert(sym, kind);
        Id { name, kind }
    }

    pub fn named_id(&self, name: &str) -> Id {
        self.id_with_kind(name, IdKind::Named)
    }

    pub fn virtual_id(&self, name: &str) -> Id {
        self.id_with_kind(name, IdKind::Virtual)
    }

    pub fn nested_id(&self, name: &str) -> Id {
        self.id_with_kind(name, IdKind::Nested)
    }

    /// The kind `name` was registered with, if any.
    pub fn kind_of(&self, name: &str) -> Option<IdKind> {
        let sym = self.symbol(name)?;
        self.kinds.borrow().get(&sym).copied()
    }

    /// Number of distinct interned names.
    pub fn n_ids(&self) -> usize {
        self.interner.borrow().len()
    }

    /// Report a fatal condition and return the corresponding error.
    pub fn die(&self, kind: ErrorKind, message: impl Into<String>) -> ScopError {
        let message = message.into();
        log::error!("{}", message);
        self.last_error.set(Some(kind));
        self.diagnostics.borrow_mut().push(Diagnostic::error(kind, message.clone()));
        match kind {
            ErrorKind::Invalid => ScopError::Invalid(message),
            ErrorKind::Io => ScopError::Io(std::io::Error::new(std::io::ErrorKind::Other, message)),
            ErrorKind::Resource | ErrorKind::Internal => ScopError::Internal(message),
        }
    }

    /// Record an error raised elsewhere on the diagnostic channel.
    pub fn record(&self, err: &ScopError) {
        self.last_error.set(Some(err.kind()));
        self.diagnostics.borrow_mut().push(Diagnostic::error(err.kind(), err.to_string()));
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error.get()
    }

    pub fn reset_error(&self) {
        self.last_error.set(None);
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner() {
        let ctx = Ctx::new();
        let a1 = ctx.id("A");
        let b = ctx.id("B");
        let a2 = ctx.id("A");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.name(), "A");
        assert_eq!(ctx.n_ids(), 2);
    }

    #[test]
    fn test_names_resolve_through_interner() {
        let ctx = Ctx::new();
        let a = ctx.virtual_id("__pet_ref_3");
        let sym = ctx.symbol("__pet_ref_3").unwrap();
        assert_eq!(ctx.resolve(sym).as_deref(), Some(a.name()));
        assert_eq!(ctx.symbol("missing"), None);
        ctx.id("__pet_ref_3");
        assert_eq!(ctx.n_ids(), 1);
    }

    #[test]
    fn test_kind_registry() {
        let ctx = Ctx::new();
        let t = ctx.virtual_id("__pet_test_0");
        assert!(t.is_virtual());
        assert_eq!(ctx.id("__pet_test_0"), t);
        assert_eq!(ctx.kind_of("__pet_test_0"), Some(IdKind::Virtual));
        assert_eq!(ctx.kind_of("never_seen"), None);
    }

    #[test]
    fn test_same_name_different_kind() {
        let ctx = Ctx::new();
        let named = ctx.named_id("n");
        let nested = ctx.nested_id("n");
        assert_ne!(named, nested);
        assert_eq!(named.anonymized().kind(), IdKind::Virtual);
        assert_eq!(nested.anonymized(), nested);
    }

    #[test]
    fn test_die_records() {
        let ctx = Ctx::new();
        assert_eq!(ctx.last_error(), None);
        let err = ctx.die(ErrorKind::Internal, "can only combine affine skips");
        assert!(err.is_fatal());
        assert_eq!(ctx.last_error(), Some(ErrorKind::Internal));
        assert_eq!(ctx.diagnostics().len(), 1);
        ctx.reset_error();
        assert_eq!(ctx.last_error(), None);
    }
}
