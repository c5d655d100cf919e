//! Lexer for the set notation.
//!
//! The lexer converts source text into a stream of tokens.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::errors::{LexError, LexErrorKind};
use crate::utils::location::Loc;
use unicode_xid::UnicodeXID;
use std::iter::Peekable;
use std::str::Chars;

/// A lexer for tokenizing set notation.
pub struct Lexer<'a> {
    /// The source text
    source: &'a str,
    /// Character iterator
    chars: Peekable<Chars<'a>>,
    /// Current byte offset
    offset: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Start offset of current token
    token_start: usize,
    /// Line of the start of the current token
    token_line: usize,
    /// Whether we've hit EOF
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            token_start: 0,
            token_line: 1,
            at_eof: false,
        }
    }

    /// Mark the start of a new token.
    fn mark_token_start(&mut self) {
        self.token_start = self.offset;
        self.token_line = self.line;
    }

    fn make_loc(&self) -> Loc {
        Loc::new(self.token_start, self.offset, Some(self.token_line))
    }

    /// Peek at the current character without consuming it.
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume and return the current character.
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Consume the current character if it matches.
    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.advance();
        }
    }

    /// Create a token with the given kind.
    fn make_token(&self, kind: TokenKind) -> Token {
        let lexeme = self.source[self.token_start..self.offset].to_string();
        Token::new(kind, self.make_loc(), lexeme)
    }

    fn make_error(&self, message: &str, kind: LexErrorKind) -> LexError {
        LexError {
            message: message.to_string(),
            loc: self.make_loc(),
            kind,
        }
    }

    fn scan_number(&mut self) -> Result<Token, LexError> {
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }
        let token = self.make_token(TokenKind::Integer);
        if token.lexeme.parse::<i64>().is_err() {
            return Err(self.make_error("integer literal out of range", LexErrorKind::InvalidNumber));
        }
        Ok(token)
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self.peek().map(|c| c.is_xid_continue() || c == '_' || c == '\'').unwrap_or(false) {
            self.advance();
        }
        let lexeme = &self.source[self.token_start..self.offset];
        let kind = TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, self.make_loc(), lexeme.to_string())
    }

    /// Scan the next token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        self.mark_token_start();

        let c = match self.advance() {
            Some(c) => c,
            None => {
                self.at_eof = true;
                return Ok(self.make_token(TokenKind::Eof));
            }
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            ':' => Ok(self.make_token(TokenKind::Colon)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            '+' => Ok(self.make_token(TokenKind::Plus)),
            '*' => Ok(self.make_token(TokenKind::Star)),
            '-' => {
                if self.match_char('>') {
                    Ok(self.make_token(TokenKind::Arrow))
                } else {
                    Ok(self.make_token(TokenKind::Minus))
                }
            }
            '=' => {
                // `==` is accepted as a synonym
                self.match_char('=');
                Ok(self.make_token(TokenKind::Equal))
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Err(self.make_error("expected '!='", LexErrorKind::UnexpectedChar))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual))
                } else {
                    Ok(self.make_token(TokenKind::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenKind::Greater))
                }
            }
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_xid_start() || c == '_' => Ok(self.scan_identifier()),
            _ => Err(self.make_error(
                &format!("unexpected character: '{}'", c),
                LexErrorKind::UnexpectedChar,
            )),
        }
    }

    /// Check if we've reached EOF.
    pub fn is_at_end(&self) -> bool {
        self.at_eof
    }

    /// Collect all tokens into a vector.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_map_tokens() {
        assert_eq!(
            kinds("[N] -> { S[i] -> A[2i + 1] : i >= 0 }"),
            vec![
                TokenKind::LeftBracket, TokenKind::Identifier, TokenKind::RightBracket,
                TokenKind::Arrow, TokenKind::LeftBrace,
                TokenKind::Identifier, TokenKind::LeftBracket, TokenKind::Identifier, TokenKind::RightBracket,
                TokenKind::Arrow,
                TokenKind::Identifier, TokenKind::LeftBracket,
                TokenKind::Integer, TokenKind::Identifier, TokenKind::Plus, TokenKind::Integer,
                TokenKind::RightBracket,
                TokenKind::Colon, TokenKind::Identifier, TokenKind::GreaterEqual, TokenKind::Integer,
                TokenKind::RightBrace, TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_comparisons() {
        assert_eq!(
            kinds("a != b or c = d and true"),
            vec![
                TokenKind::Identifier, TokenKind::BangEqual, TokenKind::Identifier, TokenKind::Or,
                TokenKind::Identifier, TokenKind::Equal, TokenKind::Identifier, TokenKind::And,
                TokenKind::True, TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_pet_style_names() {
        let tokens = Lexer::new("__pet_test_0").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "__pet_test_0");
        assert_eq!(tokens[0].loc.end, 12);
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("{ S[i] : i & 1 }").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedChar);
        let err = Lexer::new("99999999999999999999999").tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidNumber);
    }
}
