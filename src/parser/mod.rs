//! Parser module
//!
//! This module handles parsing of tokens into an Abstract Syntax Tree.

pub mod ast;
pub mod parser;
pub mod printer;

pub use ast::*;
pub use parser::Parser;
pub use printer::print_ast;

use crate::error::Diagnostics;
use crate::lexer::Lexer;

/// Lex and parse a source text, returning the tree and every lexical and
/// syntax diagnostic
pub fn parse_source(source: &str) -> (Ast, Diagnostics) {
    let mut parser = Parser::new(Lexer::new(source).tokenize());
    let ast = parser.parse();
    (ast, parser.into_diagnostics())
}
