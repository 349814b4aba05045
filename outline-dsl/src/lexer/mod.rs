//! Lexer module for inline expressions

pub mod scanner;
pub mod token;

pub use scanner::*;
pub use token::*;
