//! Error handling and diagnostics for the Aether language
//!
//! Every phase (lexer, parser, checker, interpreter, scheduler) reports
//! problems as [`Diagnostic`] records collected into a [`Diagnostics`] sink.
//! Phases keep going after an error so one run can surface many problems,
//! but the pipeline never advances past a phase whose sink is non-empty.

use std::fmt;

pub mod diagnostic;

pub use diagnostic::Report;

/// Source span: byte range plus the 1-based line/column of its start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end: end.max(start + 1),
            line,
            column,
        }
    }

    /// Span covering the single position at `line:column` (mostly for tests)
    pub fn at(line: usize, column: usize) -> Self {
        Self::new(0, 1, line, column)
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        if other.start < self.start {
            return other.to(self);
        }
        Span {
            start: self.start,
            end: self.end.max(other.end),
            line: self.line,
            column: self.column,
        }
    }

    /// Whether the byte offset falls inside this span
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Diagnostic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    LexError,
    SyntaxError,
    TypeMismatch,
    UndeclaredName,
    DuplicateDeclaration,
    ArityMismatch,
    MissingInterfaceMethod,
    InvalidAssignment,
    ImportError,
    RuntimeError,
    Deadlock,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LexError => "LexError",
            Self::SyntaxError => "SyntaxError",
            Self::TypeMismatch => "TypeMismatch",
            Self::UndeclaredName => "UndeclaredName",
            Self::DuplicateDeclaration => "DuplicateDeclaration",
            Self::ArityMismatch => "ArityMismatch",
            Self::MissingInterfaceMethod => "MissingInterfaceMethod",
            Self::InvalidAssignment => "InvalidAssignment",
            Self::ImportError => "ImportError",
            Self::RuntimeError => "RuntimeError",
            Self::Deadlock => "Deadlock",
        }
    }

    /// Phase that produces this kind of diagnostic
    pub fn phase(&self) -> Phase {
        match self {
            Self::LexError => Phase::Lex,
            Self::SyntaxError => Phase::Parse,
            Self::RuntimeError | Self::Deadlock => Phase::Run,
            _ => Phase::Check,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Lex,
    Parse,
    Check,
    Run,
}

/// A single error record
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            file: None,
        }
    }

    pub fn with_file(mut self, file: Option<&str>) -> Self {
        if self.file.is_none() {
            self.file = file.map(str::to_string);
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(
                f,
                "{}:{}:{}: {}: {}",
                file, self.span.line, self.span.column, self.kind, self.message
            ),
            None => write!(
                f,
                "{}:{}: {}: {}",
                self.span.line, self.span.column, self.kind, self.message
            ),
        }
    }
}

/// Diagnostics sink for one compilation/evaluation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::new(kind, message, span));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Drop repeated entries, keeping the first occurrence
    pub fn dedup(&mut self) {
        let mut kept: Vec<Diagnostic> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if !kept.contains(&entry) {
                kept.push(entry);
            }
        }
        self.entries = kept;
    }

    /// Attach a filename to every entry that lacks one
    pub fn set_file(&mut self, file: Option<&str>) {
        for entry in &mut self.entries {
            if entry.file.is_none() {
                entry.file = file.map(str::to_string);
            }
        }
    }

    /// Entries ordered by source position (stable for equal positions)
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut entries: Vec<&Diagnostic> = self.entries.iter().collect();
        entries.sort_by_key(|d| (d.span.line, d.span.column, d.span.start));
        entries
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(entries: Vec<Diagnostic>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.sorted() {
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_display() {
        let span = Span::at(10, 5);
        assert_eq!(span.to_string(), "10:5");
    }

    #[test]
    fn test_span_is_never_empty() {
        let span = Span::new(4, 4, 1, 5);
        assert_eq!(span.end, 5);
    }

    #[test]
    fn test_span_join() {
        let a = Span::new(2, 4, 1, 3);
        let b = Span::new(10, 12, 2, 1);
        let joined = b.to(a);
        assert_eq!(joined.start, 2);
        assert_eq!(joined.end, 12);
        assert_eq!(joined.line, 1);
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new(DiagnosticKind::SyntaxError, "expected ';'", Span::at(5, 10))
            .with_file(Some("main.ae"));
        assert_eq!(d.to_string(), "main.ae:5:10: SyntaxError: expected ';'");
    }

    #[test]
    fn test_sorted_by_position() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticKind::TypeMismatch, "second", Span::new(20, 21, 3, 1));
        diags.report(DiagnosticKind::LexError, "first", Span::new(0, 1, 1, 1));
        let sorted = diags.sorted();
        assert_eq!(sorted[0].message, "first");
        assert_eq!(sorted[1].message, "second");
        assert_eq!(diags.count(DiagnosticKind::LexError), 1);
    }

    #[test]
    fn test_kind_phase() {
        assert_eq!(DiagnosticKind::LexError.phase(), Phase::Lex);
        assert_eq!(DiagnosticKind::ArityMismatch.phase(), Phase::Check);
        assert_eq!(DiagnosticKind::Deadlock.phase(), Phase::Run);
    }
}
