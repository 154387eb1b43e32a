//! Lexical analysis module
//!
//! This module handles tokenization of Aether source code.

pub mod token;
pub mod scanner;

pub use token::{Token, TokenType, Keyword, Literal, TemplatePart};
pub use scanner::Lexer;
