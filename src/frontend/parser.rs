//! Parser for the set notation.
//!
//! This module implements a recursive descent parser for the textual
//! notation of sets, relations and functions:
//!
//! ```text
//! [N] -> { S[i, j] -> A[i + 1] : 0 <= i < N and j >= 0 }
//! ```
//!
//! Names in a tuple that are not yet known introduce dimensions, any
//! other tuple element introduces an anonymous dimension equal to it.
//! Unknown names in constraints become parameters. `e mod m = r` states
//! that `e` and `r` are congruent modulo `m`.

use std::collections::BTreeMap;

use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::polyhedral::constraint::{Constraint, ConstraintKind, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::space::{Space, Tuple, TupleShape};
use crate::utils::intern::{Ctx, Id};
use anyhow::{Result, bail, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Var {
    Dim(usize),
    Param(usize),
}

/// A linear expression under construction, before the final column
/// counts are known.
#[derive(Debug, Clone, Default)]
struct Lin {
    constant: i64,
    terms: BTreeMap<Var, i64>,
}

impl Lin {
    fn constant(value: i64) -> Self {
        Self { constant: value, terms: BTreeMap::new() }
    }

    fn var(var: Var) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(var, 1);
        Self { constant: 0, terms }
    }

    fn as_constant(&self) -> Option<i64> {
        if self.terms.values().all(|&c| c == 0) { Some(self.constant) } else { None }
    }

    fn combine(&self, a: i64, other: &Lin, b: i64) -> Result<Lin> {
        let overflow = || anyhow!("integer overflow in expression");
        let term = |x: i64, c: i64| x.checked_mul(c).ok_or_else(overflow);
        let mut result = Lin {
            constant: term(self.constant, a)?
                .checked_add(term(other.constant, b)?)
                .ok_or_else(overflow)?,
            terms: BTreeMap::new(),
        };
        for (&v, &c) in &self.terms {
            result.terms.insert(v, term(c, a)?);
        }
        for (&v, &c) in &other.terms {
            let entry = result.terms.entry(v).or_insert(0);
            *entry = entry.checked_add(term(c, b)?).ok_or_else(overflow)?;
        }
        Ok(result)
    }

    fn to_affine(&self, n_dim: usize, n_param: usize) -> AffineExpr {
        let mut expr = AffineExpr::constant(self.constant, n_dim, n_param);
        for (&v, &c) in &self.terms {
            match v {
                Var::Dim(d) => expr.set_coeff(d, c),
                Var::Param(p) => expr.set_param_coeff(p, c),
            }
        }
        expr
    }
}

/// `lin >= 0`, `lin = 0` or `lin = 0 mod m`, depending on `kind`.
#[derive(Debug, Clone)]
struct LinConstraint {
    lin: Lin,
    kind: ConstraintKind,
}

/// A formula in disjunctive normal form.
type Dnf = Vec<Vec<LinConstraint>>;

/// One `;`-separated part of a `{ ... }` block.
#[derive(Debug)]
struct Body {
    domain: Option<Tuple>,
    range: Tuple,
    n_dim: usize,
    disjuncts: Dnf,
}

/// A parser for the set notation.
pub struct Parser<'c> {
    ctx: &'c Ctx,
    tokens: Vec<Token>,
    pos: usize,
    params: Vec<Id>,
    /// Names of the dimensions of the body being parsed
    dims: Vec<Option<String>>,
    /// Constraints implied by tuple elements of the body being parsed
    tuple_constraints: Vec<LinConstraint>,
}

impl<'c> Parser<'c> {
    /// Create a new parser for `source`.
    pub fn new(ctx: &'c Ctx, source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()
            .map_err(|e| anyhow!("Lexer error: {}", e))?;
        Ok(Self {
            ctx,
            tokens,
            pos: 0,
            params: Vec::new(),
            dims: Vec::new(),
            tuple_constraints: Vec::new(),
        })
    }

    /// Parse a complete object into its parts, one per body.
    fn parse_object(&mut self) -> Result<Vec<(Space, Vec<ConstraintSystem>)>> {
        if self.check(TokenKind::LeftBracket) {
            self.advance();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    let name = self.consume_identifier("Expected parameter name")?;
                    let id = self.ctx.id(&name);
                    if !self.params.contains(&id) {
                        self.params.push(id);
                    }
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightBracket, "Expected ']' after parameters")?;
            self.consume(TokenKind::Arrow, "Expected '->' after parameters")?;
        }
        self.consume(TokenKind::LeftBrace, "Expected '{'")?;
        let mut bodies = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                bodies.push(self.parse_body()?);
                if !self.match_token(TokenKind::Semicolon) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}'")?;
        if !self.is_at_end() {
            bail!("Unexpected {} after '}}'", self.current().kind);
        }

        let n_param = self.params.len();
        Ok(bodies.into_iter()
            .map(|body| {
                let space = match body.domain {
                    Some(domain) => Space::map(self.params.clone(), domain, body.range),
                    None => Space::set(self.params.clone(), body.range),
                };
                let disjuncts = body.disjuncts.iter()
                    .map(|conj| {
                        let mut cs = ConstraintSystem::new(body.n_dim, n_param);
                        for c in conj {
                            let expr = c.lin.to_affine(body.n_dim, n_param);
                            cs.add(Constraint::new(expr, c.kind));
                        }
                        cs
                    })
                    .collect();
                (space, disjuncts)
            })
            .collect())
    }

    fn parse_body(&mut self) -> Result<Body> {
        self.dims.clear();
        self.tuple_constraints.clear();
        let (domain, range) = if self.check(TokenKind::Colon) {
            (None, Tuple::anonymous(0))
        } else {
            let first = self.parse_tuple()?;
            if self.match_token(TokenKind::Arrow) {
                (Some(first), self.parse_tuple()?)
            } else {
                (None, first)
            }
        };
        let mut disjuncts = if self.match_token(TokenKind::Colon) {
            self.parse_formula()?
        } else {
            vec![Vec::new()]
        };
        for conj in &mut disjuncts {
            conj.extend(self.tuple_constraints.iter().cloned());
        }
        Ok(Body { domain, range, n_dim: self.dims.len(), disjuncts })
    }

    fn starts_tuple(&self) -> bool {
        self.check(TokenKind::LeftBracket)
            || (self.check(TokenKind::Identifier) && self.peek_kind(1) == TokenKind::LeftBracket)
    }

    fn parse_tuple(&mut self) -> Result<Tuple> {
        let id = if self.check(TokenKind::Identifier) {
            let name = self.consume_identifier("Expected tuple name")?;
            Some(self.ctx.id(&name))
        } else {
            None
        };
        self.consume(TokenKind::LeftBracket, "Expected '[' to start a tuple")?;
        if self.starts_tuple() {
            let domain = self.parse_tuple()?;
            self.consume(TokenKind::Arrow, "Expected '->' in nested tuple")?;
            let range = self.parse_tuple()?;
            self.consume(TokenKind::RightBracket, "Expected ']' after nested tuple")?;
            return Ok(Tuple { id, shape: TupleShape::Wrapped(Box::new(domain), Box::new(range)) });
        }
        let mut n = 0;
        if !self.check(TokenKind::RightBracket) {
            loop {
                self.parse_tuple_elem()?;
                n += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expected ']' after tuple")?;
        Ok(Tuple::flat(id, n))
    }

    fn parse_tuple_elem(&mut self) -> Result<()> {
        let pos = self.dims.len();
        let is_plain_name = self.check(TokenKind::Identifier)
            && matches!(self.peek_kind(1), TokenKind::Comma | TokenKind::RightBracket);
        if is_plain_name {
            let name = self.current().lexeme.clone();
            if self.lookup(&name).is_none() {
                self.advance();
                self.dims.push(Some(name));
                return Ok(());
            }
        }
        let value = self.parse_expr()?;
        self.dims.push(None);
        let lin = Lin::var(Var::Dim(pos)).combine(1, &value, -1)?;
        self.tuple_constraints.push(LinConstraint { lin, kind: ConstraintKind::Equality });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<Var> {
        if let Some(d) = self.dims.iter().rposition(|d| d.as_deref() == Some(name)) {
            return Some(Var::Dim(d));
        }
        self.params.iter().position(|p| p.name() == name).map(Var::Param)
    }

    fn resolve(&mut self, name: &str) -> Var {
        match self.lookup(name) {
            Some(var) => var,
            None => {
                self.params.push(self.ctx.id(name));
                Var::Param(self.params.len() - 1)
            }
        }
    }

    fn parse_formula(&mut self) -> Result<Dnf> {
        let mut result = self.parse_conjunction()?;
        while self.match_token(TokenKind::Or) {
            result.extend(self.parse_conjunction()?);
        }
        Ok(result)
    }

    fn parse_conjunction(&mut self) -> Result<Dnf> {
        let mut result = self.parse_atom()?;
        while self.match_token(TokenKind::And) {
            let right = self.parse_atom()?;
            result = conjoin(&result, &right);
        }
        Ok(result)
    }

    fn parse_atom(&mut self) -> Result<Dnf> {
        if self.match_token(TokenKind::True) {
            return Ok(vec![Vec::new()]);
        }
        if self.match_token(TokenKind::False) {
            return Ok(Vec::new());
        }
        if self.check(TokenKind::LeftParen) {
            let save = (self.pos, self.params.len());
            self.advance();
            if let Ok(inner) = self.parse_formula() {
                if self.match_token(TokenKind::RightParen)
                    && !self.current().kind.is_comparison()
                    && !self.current().kind.is_arithmetic()
                {
                    return Ok(inner);
                }
            }
            // a parenthesized expression
            self.pos = save.0;
            self.params.truncate(save.1);
        }
        self.parse_comparison_chain()
    }

    fn parse_comparison_chain(&mut self) -> Result<Dnf> {
        let mut lhs = self.parse_expr()?;
        if self.match_token(TokenKind::Mod) {
            return self.parse_congruence(lhs);
        }
        if !self.current().kind.is_comparison() {
            bail!("Expected comparison, found {}", self.current().kind);
        }
        let mut result: Dnf = vec![Vec::new()];
        while self.current().kind.is_comparison() {
            let op = self.current().kind;
            self.advance();
            let rhs = self.parse_expr()?;
            let diff = rhs.combine(1, &lhs, -1)?;
            let ge = |lin: Lin| LinConstraint { lin, kind: ConstraintKind::Inequality };
            let factor: Dnf = match op {
                TokenKind::Equal => vec![vec![LinConstraint { lin: diff, kind: ConstraintKind::Equality }]],
                TokenKind::LessEqual => vec![vec![ge(diff)]],
                TokenKind::Less => vec![vec![ge(diff.combine(1, &Lin::constant(1), -1)?)]],
                TokenKind::GreaterEqual => vec![vec![ge(diff.combine(-1, &Lin::default(), 0)?)]],
                TokenKind::Greater => vec![vec![ge(diff.combine(-1, &Lin::constant(1), -1)?)]],
                _ => vec![
                    vec![ge(diff.combine(1, &Lin::constant(1), -1)?)],
                    vec![ge(diff.combine(-1, &Lin::constant(1), -1)?)],
                ],
            };
            result = conjoin(&result, &factor);
            lhs = rhs;
        }
        Ok(result)
    }

    /// `lhs mod m = rhs`, after the `mod` keyword.
    fn parse_congruence(&mut self, lhs: Lin) -> Result<Dnf> {
        let token = self.current().clone();
        self.consume(TokenKind::Integer, "Expected modulus after 'mod'")?;
        let modulus = token.lexeme.parse::<i64>()
            .map_err(|e| anyhow!("Invalid modulus '{}': {}", token.lexeme, e))?;
        if modulus <= 0 {
            bail!("Modulus must be positive, found {}", modulus);
        }
        self.consume(TokenKind::Equal, "Expected '=' after modulus")?;
        let rhs = self.parse_expr()?;
        let lin = lhs.combine(1, &rhs, -1)?;
        Ok(vec![vec![LinConstraint { lin, kind: ConstraintKind::Congruence(modulus) }]])
    }

    fn parse_expr(&mut self) -> Result<Lin> {
        let mut left = self.parse_term()?;
        loop {
            let sign = match self.current().kind {
                TokenKind::Plus => 1,
                TokenKind::Minus => -1,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = left.combine(1, &right, sign)?;
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Lin> {
        if self.match_token(TokenKind::Minus) {
            let operand = self.parse_term()?;
            return operand.combine(-1, &Lin::default(), 0);
        }
        let mut left = self.parse_factor()?;
        loop {
            let juxtaposed = self.previous().kind == TokenKind::Integer
                && matches!(self.current().kind, TokenKind::Identifier | TokenKind::LeftParen);
            if !juxtaposed && !self.match_token(TokenKind::Star) {
                break;
            }
            let right = self.parse_factor()?;
            left = multiply(&left, &right)?;
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Lin> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                let value = token.lexeme.parse::<i64>()
                    .map_err(|e| anyhow!("Invalid integer '{}': {}", token.lexeme, e))?;
                Ok(Lin::constant(value))
            }
            TokenKind::Identifier => {
                self.advance();
                let var = self.resolve(&token.lexeme);
                Ok(Lin::var(var))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.consume(TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(inner)
            }
            TokenKind::Minus => self.parse_term(),
            _ => bail!("Expected expression, found {}", token.kind),
        }
    }

    // Helper methods
    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn peek_kind(&self, n: usize) -> TokenKind {
        self.tokens.get(self.pos + n).map_or(TokenKind::Eof, |t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool { self.current().kind == kind }
    fn is_at_end(&self) -> bool { self.current().kind == TokenKind::Eof }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<()> {
        if self.check(kind) { self.advance(); Ok(()) }
        else { bail!("{}: expected {:?}, found {:?}", message, kind, self.current().kind) }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String> {
        if self.check(TokenKind::Identifier) {
            let name = self.current().lexeme.clone();
            self.advance();
            Ok(name)
        } else {
            bail!("{}: expected identifier, found {:?}", message, self.current().kind)
        }
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) { self.advance(); true } else { false }
    }
}

fn conjoin(a: &Dnf, b: &Dnf) -> Dnf {
    let mut out = Vec::with_capacity(a.len() * b.len());
    for x in a {
        for y in b {
            let mut conj = x.clone();
            conj.extend(y.iter().cloned());
            out.push(conj);
        }
    }
    out
}

fn multiply(a: &Lin, b: &Lin) -> Result<Lin> {
    match (a.as_constant(), b.as_constant()) {
        (Some(c), _) => b.combine(c, &Lin::default(), 0),
        (_, Some(c)) => a.combine(c, &Lin::default(), 0),
        _ => bail!("Non-affine product in expression"),
    }
}

/// Parse every part of a `{ ... }` block.
pub(crate) fn parse_parts(ctx: &Ctx, source: &str) -> Result<Vec<(Space, Vec<ConstraintSystem>)>> {
    let mut parser = Parser::new(ctx, source)?;
    parser.parse_object()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(source: &str) -> Vec<(Space, Vec<ConstraintSystem>)> {
        let ctx = Ctx::new();
        parse_parts(&ctx, source).unwrap()
    }

    #[test]
    fn test_set_with_params() {
        let p = parts("[N] -> { S[i, j] : 0 <= i < N and j >= 0 }");
        assert_eq!(p.len(), 1);
        let (space, disjuncts) = &p[0];
        assert_eq!(space.n_param(), 1);
        assert_eq!(space.n_out(), 2);
        assert_eq!(disjuncts.len(), 1);
        assert_eq!(disjuncts[0].len(), 3);
        assert!(disjuncts[0].is_satisfied(&[0, 5], &[1]));
        assert!(!disjuncts[0].is_satisfied(&[1, 5], &[1]));
    }

    #[test]
    fn test_map_with_expression_outputs() {
        let p = parts("{ S[i] -> A[2i + 1, i] }");
        let (space, disjuncts) = &p[0];
        assert!(space.is_map());
        assert_eq!(space.n_in(), 1);
        assert_eq!(space.n_out(), 2);
        assert!(disjuncts[0].is_satisfied(&[3, 7, 3], &[]));
        assert!(!disjuncts[0].is_satisfied(&[3, 6, 3], &[]));
    }

    #[test]
    fn test_disjunction_and_not_equal() {
        let p = parts("{ [i] : i != 3 or (i = 3 and false) }");
        assert_eq!(p[0].1.len(), 2);
        let p = parts("{ [i] : (i + 1) >= 2 }");
        assert_eq!(p[0].1.len(), 1);
        assert!(p[0].1[0].is_satisfied(&[1], &[]));
    }

    #[test]
    fn test_auto_params_and_nested() {
        let p = parts("{ [S[i] -> [a]] : a = M }");
        let (space, _) = &p[0];
        assert_eq!(space.n_param(), 1);
        assert!(space.range.is_wrapping());
        assert_eq!(space.n_out(), 2);
    }

    #[test]
    fn test_params_only_and_multiple_bodies() {
        let p = parts("[b] -> { : b = 1 }");
        assert!(p[0].0.is_params());
        let p = parts("{ S[i] -> A[i]; S[i] -> B[i + 1] }");
        assert_eq!(p.len(), 2);
        assert!(parts("{ }").is_empty());
    }

    #[test]
    fn test_congruence() {
        let p = parts("[N] -> { [i] : i mod 3 = N + 1 and 0 <= i }");
        let d = &p[0].1[0];
        assert!(d.is_satisfied(&[4], &[0]));
        assert!(d.is_satisfied(&[1], &[3]));
        assert!(!d.is_satisfied(&[2], &[0]));
        assert_eq!(d.congruences().count(), 1);
        let p = parts("{ [i] : (i + 1) mod 2 = 0 }");
        assert!(p[0].1[0].is_satisfied(&[3], &[]));
    }

    #[test]
    fn test_errors() {
        let ctx = Ctx::new();
        assert!(parse_parts(&ctx, "{ [i] : i mod 0 = 0 }").is_err());
        assert!(parse_parts(&ctx, "{ [i] : i mod N = 0 }").is_err());
        assert!(parse_parts(&ctx, "{ S[i] : i * i >= 0 }").is_err());
        assert!(parse_parts(&ctx, "{ S[i] : i }").is_err());
        assert!(parse_parts(&ctx, "{ S[i] ").is_err());
    }
}
