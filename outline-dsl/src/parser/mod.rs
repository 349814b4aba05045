//! Parser module for bullets, properties and inline expressions

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::*;
