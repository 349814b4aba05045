//! Abstract Syntax Tree types

use crate::lexer::{Span, Token, TokenKind};
use outline_core::{BinaryOp, NodeId};
use serde::{Deserialize, Serialize};

// ============================================================================
// AST TYPES
// ============================================================================

/// An expression node with its source span.
///
/// AST values are immutable once built. Editing a node's text always
/// produces a fresh parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// The closed set of expression kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    StringLiteral(String),
    NumberLiteral(f64),
    /// Explicit "missing value" marker, produced by an argument written
    /// as `key:` with nothing after it.
    Undefined,
    /// `#[id]` transclusion of another node.
    IdentifierRef(NodeId),
    /// Bare name resolved through the scope chain.
    NameRef(String),
    FieldAccess {
        object: Box<Expr>,
        field: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Argument>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A `{...}` occurrence inside bullet text.
    InlineExpr(Box<Expr>),
}

/// A function call argument, optionally named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
    pub span: Span,
}

/// The leading `key:` of a named-property bullet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletKey {
    pub name: String,
    pub span: Span,
}

/// Parse result of one node's whole text: literal segments interleaved
/// with inline expressions, plus an optional key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub key: Option<BulletKey>,
    pub parts: Vec<Expr>,
    pub span: Span,
}

/// Entry productions of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartRule {
    Bullet,
    Property,
    InlineExpr,
}

/// Result of [`crate::parse`] for any start rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ast {
    Bullet(Bullet),
    Expr(Expr),
}

// ============================================================================
// EXPRESSION HELPERS
// ============================================================================

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::StringLiteral(value.into()), Span::default())
    }

    pub fn number(value: f64) -> Self {
        Self::new(ExprKind::NumberLiteral(value), Span::default())
    }

    pub fn undefined() -> Self {
        Self::new(ExprKind::Undefined, Span::default())
    }

    pub fn id_ref(id: impl Into<NodeId>) -> Self {
        Self::new(ExprKind::IdentifierRef(id.into()), Span::default())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(ExprKind::NameRef(name.into()), Span::default())
    }

    pub fn field(object: Expr, field: impl Into<String>) -> Self {
        Self::new(
            ExprKind::FieldAccess {
                object: Box::new(object),
                field: Box::new(Expr::string(field)),
            },
            Span::default(),
        )
    }

    pub fn call(name: impl Into<String>, args: Vec<Argument>) -> Self {
        Self::new(
            ExprKind::FunctionCall {
                name: name.into(),
                args,
            },
            Span::default(),
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Span::default(),
        )
    }

    pub fn inline(inner: Expr) -> Self {
        Self::new(ExprKind::InlineExpr(Box::new(inner)), Span::default())
    }

    /// True if evaluation cannot depend on any scope or document state.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::StringLiteral(_) | ExprKind::NumberLiteral(_) | ExprKind::Undefined => true,
            ExprKind::IdentifierRef(_) | ExprKind::NameRef(_) => false,
            ExprKind::FieldAccess { object, field } => object.is_constant() && field.is_constant(),
            ExprKind::FunctionCall { args, .. } => args.iter().all(|a| a.value.is_constant()),
            ExprKind::Binary { lhs, rhs, .. } => lhs.is_constant() && rhs.is_constant(),
            ExprKind::InlineExpr(inner) => inner.is_constant(),
        }
    }

    /// Distinct node ids referenced via `#[id]`, in first-occurrence order.
    pub fn referenced_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_referenced_ids(&mut ids);
        ids
    }

    pub(crate) fn collect_referenced_ids(&self, ids: &mut Vec<NodeId>) {
        match &self.kind {
            ExprKind::IdentifierRef(id) => {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
            ExprKind::FieldAccess { object, field } => {
                object.collect_referenced_ids(ids);
                field.collect_referenced_ids(ids);
            }
            ExprKind::FunctionCall { args, .. } => {
                for arg in args {
                    arg.value.collect_referenced_ids(ids);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.collect_referenced_ids(ids);
                rhs.collect_referenced_ids(ids);
            }
            ExprKind::InlineExpr(inner) => inner.collect_referenced_ids(ids),
            ExprKind::StringLiteral(_)
            | ExprKind::NumberLiteral(_)
            | ExprKind::Undefined
            | ExprKind::NameRef(_) => {}
        }
    }

    /// The call's name and arguments if this is a function call.
    pub fn as_function_call(&self) -> Option<(&str, &[Argument])> {
        match &self.kind {
            ExprKind::FunctionCall { name, args } => Some((name, args)),
            _ => None,
        }
    }

    /// Copy of the tree with every span zeroed, for structural comparison.
    pub fn without_spans(&self) -> Expr {
        let kind = match &self.kind {
            ExprKind::FieldAccess { object, field } => ExprKind::FieldAccess {
                object: Box::new(object.without_spans()),
                field: Box::new(field.without_spans()),
            },
            ExprKind::FunctionCall { name, args } => ExprKind::FunctionCall {
                name: name.clone(),
                args: args.iter().map(Argument::without_spans).collect(),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: Box::new(lhs.without_spans()),
                rhs: Box::new(rhs.without_spans()),
            },
            ExprKind::InlineExpr(inner) => ExprKind::InlineExpr(Box::new(inner.without_spans())),
            other => other.clone(),
        };
        Expr::new(kind, Span::default())
    }
}

impl Argument {
    pub fn positional(value: Expr) -> Self {
        Self {
            name: None,
            value,
            span: Span::default(),
        }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
            span: Span::default(),
        }
    }

    /// True for `key:` with the value omitted.
    pub fn is_missing_value(&self) -> bool {
        matches!(self.value.kind, ExprKind::Undefined)
    }

    pub fn without_spans(&self) -> Argument {
        Argument {
            name: self.name.clone(),
            value: self.value.without_spans(),
            span: Span::default(),
        }
    }
}

// ============================================================================
// BULLET HELPERS
// ============================================================================

impl Bullet {
    /// A bullet consisting of one literal part. Used when parsing fails.
    pub fn literal(text: &str) -> Self {
        let span = Span::new(0, text.len(), 1, 1);
        let parts = if text.is_empty() {
            Vec::new()
        } else {
            vec![Expr::new(ExprKind::StringLiteral(text.to_string()), span)]
        };
        Self {
            key: None,
            parts,
            span,
        }
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.name.as_str())
    }

    pub fn is_constant(&self) -> bool {
        self.parts.iter().all(Expr::is_constant)
    }

    /// Distinct node ids referenced anywhere in the bullet.
    pub fn referenced_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for part in &self.parts {
            part.collect_referenced_ids(&mut ids);
        }
        ids
    }

    /// Inline expressions in source order.
    pub fn inline_exprs(&self) -> impl Iterator<Item = &Expr> {
        self.parts
            .iter()
            .filter(|p| matches!(p.kind, ExprKind::InlineExpr(_)))
    }

    /// The call expression if the bullet is exactly one inline function
    /// call (surrounding whitespace allowed, no key).
    pub fn single_function_call(&self) -> Option<&Expr> {
        if self.key.is_some() {
            return None;
        }
        let mut found = None;
        for part in &self.parts {
            match &part.kind {
                ExprKind::StringLiteral(text) if text.trim().is_empty() => {}
                ExprKind::InlineExpr(inner) if found.is_none() => {
                    if inner.as_function_call().is_none() {
                        return None;
                    }
                    found = Some(inner.as_ref());
                }
                _ => return None,
            }
        }
        found
    }

    pub fn without_spans(&self) -> Bullet {
        Bullet {
            key: self.key.as_ref().map(|k| BulletKey {
                name: k.name.clone(),
                span: Span::default(),
            }),
            parts: self.parts.iter().map(Expr::without_spans).collect(),
            span: Span::default(),
        }
    }
}

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Typed parse failure with position information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// PARSER
// ============================================================================

/// Recursive-descent parser over the tokens of one inline expression.
pub struct Parser<'a> {
    pub(crate) source: &'a str,
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser. `source` is the full bullet text the token spans
    /// point into.
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    /// Parse the tokens as one complete expression.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if let Some(token) = self
            .tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Error(_)))
        {
            let message = match &token.kind {
                TokenKind::Error(msg) => format!("Lexer error: {}", msg),
                _ => "Lexer error".to_string(),
            };
            return Err(ParseError {
                message,
                offset: token.span.start,
                line: token.span.line,
                column: token.span.column,
            });
        }

        if self.is_at_end() {
            return Err(self.error("Expected expression"));
        }

        let expr = self.parse_additive()?;

        if !self.is_at_end() {
            return Err(self.error(&format!("Unexpected token: {}", self.current().kind)));
        }

        Ok(expr)
    }
}
