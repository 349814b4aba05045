//! Parser implementation

use super::ast::*;
use crate::lexer::{position_at, Lexer, Span, Token, TokenKind};
use crate::pretty_printer::{pretty_print, pretty_print_expr};
use outline_core::{BinaryOp, NodeId};

// ============================================================================
// EXPRESSION PARSING
// ============================================================================

impl<'a> Parser<'a> {
    /// AddExpr := AddExpr ("+"|"-") MulExpr | MulExpr
    pub(crate) fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    /// MulExpr := MulExpr ("*"|"/") SimpleExpr | SimpleExpr
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_postfix()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_postfix()?;
            lhs = binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    /// FieldAccess := SimpleExpr "." PropertyName
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        while self.check(&TokenKind::Dot) {
            self.advance();
            let field_span = self.current().span;
            let field = self.expect_identifier()?;
            let span = expr.span.to(field_span);
            expr = Expr::new(
                ExprKind::FieldAccess {
                    object: Box::new(expr),
                    field: Box::new(Expr::new(ExprKind::StringLiteral(field), field_span)),
                },
                span,
            );
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();

        match token.kind {
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLiteral(value), token.span))
            }
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::NumberLiteral(value), token.span))
            }
            TokenKind::IdRef(id) => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::IdentifierRef(NodeId::new(id)),
                    token.span,
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_additive()?;
                let close = self.current().span;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::new(inner.kind, token.span.to(close)))
            }
            TokenKind::Identifier(_) => self.parse_name_or_call(),
            other => Err(self.error(&format!("Unexpected token: {}", other))),
        }
    }

    /// FunctionCall when the first identifier is directly followed by `(`,
    /// otherwise a (possibly multi-word) NameRef.
    fn parse_name_or_call(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        let first = self.expect_identifier()?;

        if self.check(&TokenKind::LParen) {
            self.advance();
            let args = self.parse_arguments()?;
            let close = self.current().span;
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::new(
                ExprKind::FunctionCall { name: first, args },
                start.to(close),
            ));
        }

        let mut words = vec![first];
        let mut span = start;
        while let TokenKind::Identifier(word) = &self.current().kind {
            words.push(word.clone());
            span = span.to(self.current().span);
            self.advance();
        }

        Ok(Expr::new(ExprKind::NameRef(words.join(" ")), span))
    }

    /// Argument (, Argument)* up to but not including `)`.
    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut args = Vec::new();

        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_argument()?);

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        Ok(args)
    }

    /// Argument := (Key ":")? Expr | Key ":"
    fn parse_argument(&mut self) -> Result<Argument, ParseError> {
        let start = self.current().span;

        let Some(key_len) = self.key_lookahead() else {
            let value = self.parse_additive()?;
            return Ok(Argument {
                name: None,
                span: value.span,
                value,
            });
        };

        let key_end = self.tokens[self.pos + key_len - 1].span.end;
        let name = normalize_key(&self.source[start.start..key_end]);
        self.pos += key_len;
        let colon = self.current().span;
        self.expect(TokenKind::Colon)?;

        if self.check(&TokenKind::Comma) || self.check(&TokenKind::RParen) {
            return Ok(Argument {
                name: Some(name),
                value: Expr::new(
                    ExprKind::Undefined,
                    Span::new(colon.end, colon.end, colon.line, colon.column + 1),
                ),
                span: start.to(colon),
            });
        }

        let value = self.parse_additive()?;
        Ok(Argument {
            name: Some(name),
            span: start.to(value.span),
            value,
        })
    }

    /// Number of Identifier/Number tokens forming a key, if they are
    /// directly followed by `:`.
    fn key_lookahead(&self) -> Option<usize> {
        let mut len = 0;
        while let Some(token) = self.tokens.get(self.pos + len) {
            match token.kind {
                TokenKind::Identifier(_) | TokenKind::Number(_) => len += 1,
                TokenKind::Colon if len > 0 => return Some(len),
                _ => return None,
            }
        }
        None
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "Expected '{}', found {}",
                kind,
                self.current().kind
            )))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    pub(crate) fn error(&self, msg: &str) -> ParseError {
        let span = self.current().span;
        ParseError {
            message: msg.to_string(),
            offset: span.start,
            line: span.line,
            column: span.column,
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn normalize_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// BULLET SCANNING
// ============================================================================

fn error_at(source: &str, offset: usize, message: impl Into<String>) -> ParseError {
    let (line, column) = position_at(source, offset);
    ParseError {
        message: message.into(),
        offset,
        line,
        column,
    }
}

fn span_of(source: &str, start: usize, end: usize) -> Span {
    let (line, column) = position_at(source, start);
    Span::new(start, end, line, column)
}

/// Recognise a leading `Key ":"`. Returns the key and the offset just past
/// the colon.
fn scan_key(source: &str) -> Option<(BulletKey, usize)> {
    for (i, c) in source.char_indices() {
        match c {
            ':' => {
                let raw = &source[..i];
                if raw.trim().is_empty() {
                    return None;
                }
                let leading = raw.len() - raw.trim_start().len();
                let trailing_end = leading + raw.trim().len();
                let key = BulletKey {
                    name: normalize_key(raw),
                    span: span_of(source, leading, trailing_end),
                };
                return Some((key, i + 1));
            }
            c if c.is_alphanumeric() || c == '_' || c == ' ' => {}
            _ => return None,
        }
    }
    None
}

/// Find the `}` closing an inline expression opened at `open`, skipping
/// braces inside string literals.
fn find_closing_brace(source: &str, open: usize) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in source[open + 1..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '}' => return Some(open + 1 + i),
            _ => {}
        }
    }
    None
}

fn parse_inline_at(source: &str, open: usize) -> Result<(Expr, usize), ParseError> {
    let close = find_closing_brace(source, open)
        .ok_or_else(|| error_at(source, open, "Unterminated inline expression"))?;

    let tokens = Lexer::with_range(source, open + 1, close).tokenize();
    let mut parser = Parser::new(source, tokens);
    let inner = parser.parse_expression()?;

    let span = span_of(source, open, close + 1);
    Ok((Expr::new(ExprKind::InlineExpr(Box::new(inner)), span), close + 1))
}

/// TextPart* starting at `offset`.
fn parse_parts(source: &str, offset: usize) -> Result<Vec<Expr>, ParseError> {
    let mut parts = Vec::new();
    let mut pos = offset;

    while pos < source.len() {
        if source[pos..].starts_with('{') {
            let (expr, next) = parse_inline_at(source, pos)?;
            parts.push(expr);
            pos = next;
            continue;
        }

        let end = source[pos..]
            .find('{')
            .map(|i| pos + i)
            .unwrap_or(source.len());
        parts.push(Expr::new(
            ExprKind::StringLiteral(source[pos..end].to_string()),
            span_of(source, pos, end),
        ));
        pos = end;
    }

    Ok(parts)
}

fn skip_inline_whitespace(source: &str, offset: usize) -> usize {
    let rest = &source[offset..];
    offset + (rest.len() - rest.trim_start_matches([' ', '\t']).len())
}

// ============================================================================
// CONVENIENCE FUNCTIONS
// ============================================================================

/// Parse `source` using the given start rule.
///
/// # Returns
/// `Ast::Bullet` for `Bullet` and `Property`, `Ast::Expr` holding an
/// `InlineExpr` for `InlineExpr`.
pub fn parse(source: &str, rule: StartRule) -> Result<Ast, ParseError> {
    match rule {
        StartRule::Bullet => parse_bullet(source).map(Ast::Bullet),
        StartRule::Property => parse_property(source).map(Ast::Bullet),
        StartRule::InlineExpr => parse_inline_expr(source).map(Ast::Expr),
    }
}

/// Parse a node's whole text. A leading `key:` makes it a named property
/// whose remainder is the value.
pub fn parse_bullet(source: &str) -> Result<Bullet, ParseError> {
    let (key, offset) = match scan_key(source) {
        Some((key, after_colon)) => (Some(key), skip_inline_whitespace(source, after_colon)),
        None => (None, 0),
    };

    let parts = parse_parts(source, offset)?;
    Ok(Bullet {
        key,
        parts,
        span: span_of(source, 0, source.len()),
    })
}

/// Parse `key: value`. The key is mandatory.
pub fn parse_property(source: &str) -> Result<Bullet, ParseError> {
    let bullet = parse_bullet(source)?;
    if bullet.key.is_none() {
        return Err(error_at(source, 0, "Expected property key"));
    }
    Ok(bullet)
}

/// Parse a single `{expr}` spanning the whole source (surrounding
/// whitespace allowed).
pub fn parse_inline_expr(source: &str) -> Result<Expr, ParseError> {
    let open = skip_inline_whitespace(source, 0);
    if !source[open..].starts_with('{') {
        return Err(error_at(source, open, "Expected '{'"));
    }

    let (expr, next) = parse_inline_at(source, open)?;
    if !source[next..].trim().is_empty() {
        return Err(error_at(source, next, "Unexpected text after inline expression"));
    }
    Ok(expr)
}

/// Parse a bullet, falling back to one literal part holding the whole
/// text when the source is malformed.
pub fn parse_bullet_or_literal(source: &str) -> Bullet {
    match parse_bullet(source) {
        Ok(bullet) => bullet,
        Err(e) => {
            tracing::debug!(error = %e, "Treating unparseable bullet as literal text");
            Bullet::literal(source)
        }
    }
}

/// Parse and pretty-print bullet text (for round-trip testing).
pub fn round_trip(source: &str) -> Result<String, ParseError> {
    let bullet = parse_bullet(source)?;
    Ok(pretty_print(&bullet))
}

/// Parse and pretty-print a bare expression (no braces).
pub fn round_trip_expr(source: &str) -> Result<String, ParseError> {
    let tokens = Lexer::new(source).tokenize();
    let expr = Parser::new(source, tokens).parse_expression()?;
    Ok(pretty_print_expr(&expr))
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY TESTS
// ============================================================================
