//! Outline DSL - Bullet Expression Parser
//!
//! Every node of an outline carries text that may mix literal prose with
//! `{...}` inline expressions and a leading `key:` that turns the node into
//! a named property.
//!
//! Architecture:
//! ```text
//! Bullet text
//!     ↓
//! Bullet scanner (key, literal runs, {…} boundaries)
//!     ↓
//! Lexer (tokens with absolute spans)
//!     ↓
//! Parser (recursive descent → Expr)
//!     ↓
//! Bullet AST
//!     ↓
//! Pretty Printer (for round-trip testing)
//! ```

pub mod lexer;
pub mod parser;
pub mod pretty_printer;

// Re-export key types for convenience
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::*;
pub use pretty_printer::{format_number, pretty_print, pretty_print_expr};
