//! Source formatting through the pretty-printer

use thiserror::Error;
use tracing::debug;

use crate::error::{Diagnostics, Span};
use crate::lexer::Lexer;
use crate::parser::{parse_source, print_ast};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// Lexical or syntax errors; nothing is formatted
    #[error("document has {} syntax error(s)", .0.len())]
    Syntax(Diagnostics),
    /// The printer works from the tree and would drop this comment
    #[error("{}:{}: cannot format a document with comments", .0.line, .0.column)]
    Comment(Span),
}

/// Canonical formatting of `source`. Documents with lexical or syntax
/// errors, or with comments the printer cannot keep, are left alone.
pub fn format_document(source: &str) -> Result<String, FormatError> {
    let (ast, diagnostics) = parse_source(source);
    if !diagnostics.is_empty() {
        debug!(errors = diagnostics.len(), "not formatting a document with syntax errors");
        return Err(FormatError::Syntax(diagnostics));
    }
    let (_, comments) = Lexer::new(source).tokenize_with_comments();
    if let Some(first) = comments.first() {
        debug!(comments = comments.len(), "not formatting a document with comments");
        return Err(FormatError::Comment(*first));
    }
    Ok(print_ast(&ast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_is_idempotent() {
        let source = "fn  add(a:Int,b:Int)->Int{return a+b}\nlet x=add( 1,2 )";
        let once = format_document(source).unwrap_or_default();
        assert!(!once.is_empty());
        assert_eq!(format_document(&once).unwrap_or_default(), once);
    }

    #[test]
    fn test_broken_source_is_rejected() {
        let result = format_document("let = 3");
        assert!(matches!(result, Err(FormatError::Syntax(d)) if !d.is_empty()));
    }

    #[test]
    fn test_comments_are_never_dropped() {
        let result = format_document("// comment\nprint(1) /* trailing */");
        let Err(FormatError::Comment(span)) = result else {
            panic!("expected a comment error, got {:?}", result);
        };
        assert_eq!((span.line, span.column), (1, 1));
        assert_eq!(
            FormatError::Comment(span).to_string(),
            "1:1: cannot format a document with comments"
        );
    }
}
