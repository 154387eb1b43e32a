//! Token definitions for the Aether language
//!
//! This module defines all token types used in lexical analysis.

use crate::error::Span;
use std::fmt;

/// A token in the Aether language
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
    /// Whether a line break separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    /// Create a new token
    pub fn new(token_type: TokenType, lexeme: String, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            span,
            newline_before: false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.token_type, TokenType::Error(_))
    }
}

/// Token types in the Aether language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Literals
    Literal(Literal),
    /// `f"..."` string: literal text interleaved with nested token runs
    Template(Vec<TemplatePart>),

    // Identifiers and keywords
    Identifier,
    Keyword(Keyword),

    // Style-block tokens (produced only inside `style { ... }`)
    StyleSelector(String),
    StyleProperty(String),
    StyleValue(Vec<TemplatePart>),

    // Arithmetic
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %

    // Comparison
    Equal,          // ==
    NotEqual,       // !=
    Less,           // <
    LessEqual,      // <=
    Greater,        // >
    GreaterEqual,   // >=

    // Logical
    AndAnd,     // &&
    OrOr,       // ||
    Bang,       // !

    // Assignment and arrows
    Assign,         // =
    FatArrow,       // =>
    Arrow,          // ->
    LeftArrow,      // <-

    // Optionals and unions
    Question,           // ?
    QuestionQuestion,   // ??
    Pipe,               // |

    // Delimiters
    LeftParen,      // (
    RightParen,     // )
    LeftBrace,      // {
    RightBrace,     // }
    LeftBracket,    // [
    RightBracket,   // ]
    Comma,          // ,
    Dot,            // .
    Colon,          // :
    Semicolon,      // ;

    // Special
    Error(String),
    Eof,
}

/// One segment of a formatted string or style value
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    /// Tokens of an embedded `{expr}`, terminated by their own `Eof`
    Expr(Vec<Token>),
}

/// Keywords in the Aether language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Declarations
    Let,
    Const,
    Fn,
    Type,
    Interface,
    Impl,
    Import,

    // Control flow
    Return,
    If,
    Elif,
    Else,
    For,
    In,
    While,
    Break,
    Continue,
    Match,
    Case,
    Try,
    Catch,

    // Concurrency
    Go,
    Chan,

    // Markup
    Ui,
    Style,

    // Literals
    True,
    False,
    None,
}

impl Keyword {
    /// Get keyword from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "let" => Some(Self::Let),
            "const" => Some(Self::Const),
            "fn" => Some(Self::Fn),
            "type" => Some(Self::Type),
            "interface" => Some(Self::Interface),
            "impl" => Some(Self::Impl),
            "import" => Some(Self::Import),
            "return" => Some(Self::Return),
            "if" => Some(Self::If),
            "elif" => Some(Self::Elif),
            "else" => Some(Self::Else),
            "for" => Some(Self::For),
            "in" => Some(Self::In),
            "while" => Some(Self::While),
            "break" => Some(Self::Break),
            "continue" => Some(Self::Continue),
            "match" => Some(Self::Match),
            "case" => Some(Self::Case),
            "try" => Some(Self::Try),
            "catch" => Some(Self::Catch),
            "go" => Some(Self::Go),
            "chan" => Some(Self::Chan),
            "ui" => Some(Self::Ui),
            "style" => Some(Self::Style),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Get string representation of keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Let => "let",
            Self::Const => "const",
            Self::Fn => "fn",
            Self::Type => "type",
            Self::Interface => "interface",
            Self::Impl => "impl",
            Self::Import => "import",
            Self::Return => "return",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::For => "for",
            Self::In => "in",
            Self::While => "while",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Match => "match",
            Self::Case => "case",
            Self::Try => "try",
            Self::Catch => "catch",
            Self::Go => "go",
            Self::Chan => "chan",
            Self::Ui => "ui",
            Self::Style => "style",
            Self::True => "true",
            Self::False => "false",
            Self::None => "none",
        }
    }

    /// Every keyword, in declaration order (used for completions)
    pub const ALL: [Keyword; 27] = [
        Self::Let,
        Self::Const,
        Self::Fn,
        Self::Type,
        Self::Interface,
        Self::Impl,
        Self::Import,
        Self::Return,
        Self::If,
        Self::Elif,
        Self::Else,
        Self::For,
        Self::In,
        Self::While,
        Self::Break,
        Self::Continue,
        Self::Match,
        Self::Case,
        Self::Try,
        Self::Catch,
        Self::Go,
        Self::Chan,
        Self::Ui,
        Self::Style,
        Self::True,
        Self::False,
        Self::None,
    ];

    /// Keywords that may begin a statement (parser recovery points)
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            Self::Let
                | Self::Const
                | Self::Fn
                | Self::Type
                | Self::Interface
                | Self::Impl
                | Self::Import
                | Self::Return
                | Self::If
                | Self::For
                | Self::While
                | Self::Break
                | Self::Continue
                | Self::Match
                | Self::Try
                | Self::Go
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Literal token values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Literal::Integer(n)) => write!(f, "integer {}", n),
            Self::Literal(Literal::Float(n)) => write!(f, "float {}", n),
            Self::Literal(Literal::String(_)) => write!(f, "string"),
            Self::Template(_) => write!(f, "formatted string"),
            Self::Identifier => write!(f, "identifier"),
            Self::Keyword(kw) => write!(f, "keyword '{}'", kw),
            Self::StyleSelector(s) => write!(f, "selector '{}'", s),
            Self::StyleProperty(p) => write!(f, "style property '{}'", p),
            Self::StyleValue(_) => write!(f, "style value"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
            Self::Less => write!(f, "<"),
            Self::LessEqual => write!(f, "<="),
            Self::Greater => write!(f, ">"),
            Self::GreaterEqual => write!(f, ">="),
            Self::AndAnd => write!(f, "&&"),
            Self::OrOr => write!(f, "||"),
            Self::Bang => write!(f, "!"),
            Self::Assign => write!(f, "="),
            Self::FatArrow => write!(f, "=>"),
            Self::Arrow => write!(f, "->"),
            Self::LeftArrow => write!(f, "<-"),
            Self::Question => write!(f, "?"),
            Self::QuestionQuestion => write!(f, "??"),
            Self::Pipe => write!(f, "|"),
            Self::LeftParen => write!(f, "("),
            Self::RightParen => write!(f, ")"),
            Self::LeftBrace => write!(f, "{{"),
            Self::RightBrace => write!(f, "}}"),
            Self::LeftBracket => write!(f, "["),
            Self::RightBracket => write!(f, "]"),
            Self::Comma => write!(f, ","),
            Self::Dot => write!(f, "."),
            Self::Colon => write!(f, ":"),
            Self::Semicolon => write!(f, ";"),
            Self::Error(message) => write!(f, "invalid token ({})", message),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_from_str() {
        assert_eq!(Keyword::from_str("let"), Some(Keyword::Let));
        assert_eq!(Keyword::from_str("fn"), Some(Keyword::Fn));
        assert_eq!(Keyword::from_str("go"), Some(Keyword::Go));
        assert_eq!(Keyword::from_str("style"), Some(Keyword::Style));
        assert_eq!(Keyword::from_str("invalid"), None);
        // type names are identifiers, not keywords
        assert_eq!(Keyword::from_str("Int"), None);
    }

    #[test]
    fn test_keyword_round_trip() {
        for kw in Keyword::ALL {
            assert_eq!(Keyword::from_str(kw.as_str()), Some(kw));
        }
    }
}
