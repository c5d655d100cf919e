//! Error types for SCoP construction.
//!
//! Failures fall into two families. Algebra failures (space mismatches,
//! arithmetic overflow, combinatorial blow-up) are the resource kind: the
//! failing call releases what it owned and the caller propagates. Invariant
//! violations are raised by the combinators themselves through
//! [`Ctx::die`](crate::utils::intern::Ctx::die) and are not recoverable.

use thiserror::Error;
use std::fmt;

use crate::utils::location::Loc;

/// Error raised by the integer set layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgebraError {
    /// Operands live in incompatible spaces
    #[error("space mismatch: {0}")]
    SpaceMismatch(String),

    /// Too many disjuncts or constraints were generated
    #[error("operation too complex: {0}")]
    TooComplex(String),

    /// Coefficient arithmetic overflowed
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// The operation is not defined for the given operands
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Top-level error type for SCoP construction and transformation.
#[derive(Error, Debug)]
pub enum ScopError {
    /// An algebra operation failed
    #[error("algebra error: {0}")]
    Algebra(#[from] AlgebraError),

    /// An internal invariant was violated
    #[error("internal error: {0}")]
    Internal(String),

    /// The operation was invoked in a state that does not support it
    #[error("invalid operation: {0}")]
    Invalid(String),

    /// I/O error while reprinting original source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of an error, as recorded on the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Resource exhaustion or failed algebra operation
    Resource,
    /// Internal invariant violation
    Internal,
    /// Invalid use of an operation
    Invalid,
    /// Failed I/O
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Resource => "resource",
            ErrorKind::Internal => "internal",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Io => "io",
        };
        write!(f, "{}", s)
    }
}

impl ScopError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScopError::Algebra(_) => ErrorKind::Resource,
            ScopError::Internal(_) => ErrorKind::Internal,
            ScopError::Invalid(_) => ErrorKind::Invalid,
            ScopError::Io(_) => ErrorKind::Io,
        }
    }

    /// Is this an unrecoverable invariant violation?
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScopError::Internal(_) | ScopError::Invalid(_))
    }
}

/// A diagnostic message recorded on the context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Error classification
    pub kind: ErrorKind,
    /// Message
    pub message: String,
    /// Additional notes
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// Execution of the failing operation was aborted
    Error,
    /// Informational
    Warning,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            kind,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            kind,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Add a note to the diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        write!(f, "{} ({}): {}", severity, self.kind, self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        Ok(())
    }
}

/// Lexer error for the set notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at {loc}")]
pub struct LexError {
    /// Error message
    pub message: String,
    /// Offending source range
    pub loc: Loc,
    /// Error classification
    pub kind: LexErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    /// Character outside the notation
    UnexpectedChar,
    /// Integer literal out of range
    InvalidNumber,
}

/// Result type of the integer set layer.
pub type AlgebraResult<T> = Result<T, AlgebraError>;

/// Result type using ScopError.
pub type ScopResult<T> = Result<T, ScopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScopError::from(AlgebraError::SpaceMismatch("S[i] vs T[i]".to_string()));
        let s = format!("{}", err);
        assert!(s.contains("space mismatch"));
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_internal_is_fatal() {
        let err = ScopError::Internal("can only combine affine skips".to_string());
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error(ErrorKind::Internal, "boom").with_note("while filtering");
        let s = d.to_string();
        assert!(s.starts_with("error (internal): boom"));
        assert!(s.contains("note: while filtering"));
    }
}
