//! Token types for the set notation.

use crate::utils::location::Loc;
use std::fmt;

/// A token in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source range
    pub loc: Loc,
    /// The lexeme (raw text)
    pub lexeme: String,
}

impl Token {
    /// Create a new token.
    pub fn new(kind: TokenKind, loc: Loc, lexeme: String) -> Self {
        Self { kind, loc, lexeme }
    }

    /// Check if this is an EOF token.
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.lexeme)
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Integer,

    /// Identifier (parameter, dimension or tuple name)
    Identifier,

    // Keywords
    /// `and`
    And,
    /// `or`
    Or,
    /// `true`
    True,
    /// `false`
    False,
    /// `mod`
    Mod,

    // Delimiters
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semicolon,
    /// `->`
    Arrow,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `=`
    Equal,
    /// `!=`
    BangEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if this is a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TokenKind::Equal | TokenKind::BangEqual
                | TokenKind::Less | TokenKind::LessEqual
                | TokenKind::Greater | TokenKind::GreaterEqual
        )
    }

    /// Check if this is an arithmetic operator.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, TokenKind::Plus | TokenKind::Minus | TokenKind::Star)
    }

    /// Look up a keyword.
    pub fn keyword(s: &str) -> Option<TokenKind> {
        match s {
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "mod" => Some(TokenKind::Mod),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
