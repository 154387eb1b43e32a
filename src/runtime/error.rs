//! Runtime failures
//!
//! A [`RuntimeError`] is raised by the interpreter, can be caught by a
//! matching `try/catch`, and otherwise ends the task that raised it.

use std::fmt;

use thiserror::Error;

use crate::error::{Diagnostic, DiagnosticKind, Span};

/// Catchable error taxonomy. In source, `Error` names the supertype and
/// each kind is usable as a `catch` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DivisionByZero,
    IndexOutOfBounds,
    SendOnClosedChannel,
    UnmatchedPattern,
    InvalidArgument,
    Panic,
    /// Call nesting went past the interpreter's depth limit
    StackOverflow,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::DivisionByZero,
        ErrorKind::IndexOutOfBounds,
        ErrorKind::SendOnClosedChannel,
        ErrorKind::UnmatchedPattern,
        ErrorKind::InvalidArgument,
        ErrorKind::Panic,
        ErrorKind::StackOverflow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::IndexOutOfBounds => "IndexOutOfBounds",
            ErrorKind::SendOnClosedChannel => "SendOnClosedChannel",
            ErrorKind::UnmatchedPattern => "UnmatchedPattern",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Panic => "Panic",
            ErrorKind::StackOverflow => "StackOverflow",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn division_by_zero(span: Span) -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero", span)
    }

    pub fn index_out_of_bounds(index: i64, len: usize, span: Span) -> Self {
        Self::new(
            ErrorKind::IndexOutOfBounds,
            format!("index {} out of bounds for length {}", index, len),
            span,
        )
    }

    pub fn send_on_closed(span: Span) -> Self {
        Self::new(ErrorKind::SendOnClosedChannel, "send on closed channel", span)
    }

    pub fn stack_overflow(limit: usize, span: Span) -> Self {
        Self::new(
            ErrorKind::StackOverflow,
            format!("call depth exceeded {}", limit),
            span,
        )
    }

    pub fn invalid_argument(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::InvalidArgument, message, span)
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::RuntimeError, self.to_string(), self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("Error"), None);
    }

    #[test]
    fn test_runtime_error_diagnostic() {
        let err = RuntimeError::division_by_zero(Span::at(3, 7));
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.kind, DiagnosticKind::RuntimeError);
        assert_eq!(diagnostic.message, "DivisionByZero: division by zero");
        assert_eq!(diagnostic.span.line, 3);
    }
}
