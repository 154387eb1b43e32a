//! Language services
//!
//! Editor-facing queries (hover, go to definition, references,
//! completions, document outline, formatting) answered from the checker's
//! symbol table. These are plain functions over text; no protocol layer.

pub mod analysis;
pub mod format;

pub use analysis::{analyze, Analysis, CompletionItem, CompletionKind, DocumentSymbol, Hover, Position};
pub use format::{format_document, FormatError};
