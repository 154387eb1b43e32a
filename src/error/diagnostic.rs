//! Diagnostic formatting for better error messages
//!
//! Renders a [`Diagnostic`] with a colored header and the offending source
//! line plus a caret, the way the CLI prints every entry.

use super::{Diagnostic, Span};
use colored::Colorize;

/// A diagnostic paired with the source text it points into
pub struct Report<'a> {
    diagnostic: &'a Diagnostic,
    source: Option<&'a str>,
}

impl<'a> Report<'a> {
    pub fn new(diagnostic: &'a Diagnostic) -> Self {
        Self {
            diagnostic,
            source: None,
        }
    }

    pub fn with_source(diagnostic: &'a Diagnostic, source: &'a str) -> Self {
        Self {
            diagnostic,
            source: Some(source),
        }
    }

    /// Format the diagnostic with color and context
    pub fn format(&self) -> String {
        let mut output = String::new();
        let d = self.diagnostic;

        let kind = d.kind.as_str().red().bold();
        output.push_str(&format!("{}: {}\n", kind, d.message));

        let location = match &d.file {
            Some(file) => format!("{}:{}:{}", file, d.span.line, d.span.column),
            None => format!("{}:{}", d.span.line, d.span.column),
        };
        output.push_str(&format!("  {} {}\n", "-->".blue().bold(), location));

        if let Some(source) = self.source {
            output.push_str(&self.format_source_context(source, &d.span));
        }

        output
    }

    fn format_source_context(&self, source: &str, span: &Span) -> String {
        let mut output = String::new();
        let lines: Vec<&str> = source.lines().collect();

        if span.line == 0 || span.line > lines.len() {
            return output;
        }

        let line_idx = span.line - 1;
        let width = span.line.to_string().len();

        output.push_str(&format!(
            "  {} {}\n",
            format!("{:width$}", span.line, width = width).blue().bold(),
            lines[line_idx]
        ));

        let line_len = lines[line_idx].chars().count();
        let caret_len = (span.end - span.start).clamp(1, line_len.saturating_sub(span.column - 1).max(1));
        let padding = " ".repeat(width + 2 + span.column.saturating_sub(1));
        output.push_str(&format!("{}{}\n", padding, "^".repeat(caret_len).red().bold()));

        output
    }
}

impl std::fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;

    #[test]
    fn test_report_without_source() {
        let d = Diagnostic::new(DiagnosticKind::LexError, "unexpected character", Span::at(1, 1));
        let formatted = Report::new(&d).format();
        assert!(formatted.contains("LexError"));
        assert!(formatted.contains("unexpected character"));
    }

    #[test]
    fn test_report_with_source() {
        let source = "let x = 42\nlet y = @\nlet z = 10";
        let d = Diagnostic::new(
            DiagnosticKind::LexError,
            "unexpected character '@'",
            Span::new(19, 20, 2, 9),
        );
        let formatted = Report::with_source(&d, source).format();
        assert!(formatted.contains("LexError"));
        assert!(formatted.contains("let y = @"));
        assert!(formatted.contains('^'));
    }
}
