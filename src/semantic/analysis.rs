//! Document analysis and position queries
//!
//! [`analyze`] runs the front end (lexer, parser, checker) over one
//! document and keeps the checker's symbol table and name uses. Every query
//! takes a 1-based [`Position`] and answers from that snapshot; nothing is
//! executed.

use std::collections::HashSet;

use crate::error::{Diagnostics, Span};
use crate::lexer::Keyword;
use crate::parser::{parse_source, Ast};
use crate::types::{Symbol, SymbolKind, TypeChecker};

/// 1-based line and column, columns counted in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hover {
    /// Declaration-style signature, e.g. `let count: Int`
    pub contents: String,
    /// The name the cursor is on
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Keyword,
    Variable,
    Function,
    Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: String,
    pub span: Span,
}

/// Snapshot of one analyzed document
pub struct Analysis {
    source: String,
    line_starts: Vec<usize>,
    pub ast: Ast,
    pub diagnostics: Diagnostics,
    symbols: Vec<Symbol>,
    references: Vec<(Span, usize)>,
}

/// Lex, parse and check `source`. Checking runs even when parsing failed,
/// so queries keep working on partially broken documents.
pub fn analyze(source: &str) -> Analysis {
    let (ast, mut diagnostics) = parse_source(source);
    let mut checker = TypeChecker::new();
    diagnostics.extend(checker.check(&ast));

    let line_starts = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    Analysis {
        source: source.to_string(),
        line_starts,
        ast,
        diagnostics,
        symbols: checker.symbols().to_vec(),
        references: checker.references().to_vec(),
    }
}

impl Analysis {
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Byte offset of `position`, clamped to the end of its line
    pub fn offset(&self, position: Position) -> Option<usize> {
        let start = *self.line_starts.get(position.line.checked_sub(1)?)?;
        let line = self.source[start..].split('\n').next().unwrap_or("");
        let column = position.column.saturating_sub(1);
        let within = line
            .char_indices()
            .nth(column)
            .map(|(i, _)| i)
            .unwrap_or(line.len());
        Some(start + within)
    }

    /// Symbol named at `position`, through either a use or the declaration
    fn symbol_at(&self, position: Position) -> Option<(usize, Span)> {
        let offset = self.offset(position)?;
        if let Some((span, id)) = self.references.iter().find(|(span, _)| span.contains(offset)) {
            return Some((*id, *span));
        }
        self.symbols
            .iter()
            .enumerate()
            .find(|(_, symbol)| symbol.local && symbol.span.contains(offset))
            .map(|(id, symbol)| (id, symbol.span))
    }

    pub fn hover(&self, position: Position) -> Option<Hover> {
        let (id, span) = self.symbol_at(position)?;
        Some(Hover {
            contents: self.symbols[id].detail(),
            span,
        })
    }

    /// Declaration span of the symbol at `position`; builtins have none
    pub fn definition(&self, position: Position) -> Option<Span> {
        let (id, _) = self.symbol_at(position)?;
        let symbol = &self.symbols[id];
        symbol.local.then_some(symbol.span)
    }

    /// Every use of the symbol at `position`, in source order
    pub fn references(&self, position: Position, include_declaration: bool) -> Vec<Span> {
        let Some((id, _)) = self.symbol_at(position) else {
            return Vec::new();
        };
        let mut spans: Vec<Span> = self
            .references
            .iter()
            .filter(|(_, target)| *target == id)
            .map(|(span, _)| *span)
            .collect();
        let symbol = &self.symbols[id];
        if include_declaration && symbol.local {
            spans.push(symbol.span);
        }
        spans.sort_by_key(|span| span.start);
        spans.dedup();
        spans
    }

    /// Names visible at `position` that extend the word before the cursor,
    /// followed by matching keywords
    pub fn completions(&self, position: Position) -> Vec<CompletionItem> {
        let Some(offset) = self.offset(position) else {
            return Vec::new();
        };
        let prefix = self.word_before(offset);

        let mut visible: Vec<&Symbol> = self
            .symbols
            .iter()
            .filter(|symbol| symbol.name.starts_with(prefix) && symbol.scope_span.contains(offset))
            .filter(|symbol| match symbol.kind {
                // Only functions and types are hoisted
                SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Parameter => {
                    !symbol.local || symbol.span.start <= offset
                }
                _ => true,
            })
            .collect();
        // Innermost declaration wins
        visible.sort_by_key(|symbol| symbol.scope_span.end - symbol.scope_span.start);
        let mut seen = HashSet::new();
        visible.retain(|symbol| seen.insert(symbol.name.clone()));
        visible.sort_by(|a, b| a.name.cmp(&b.name));

        let mut items: Vec<CompletionItem> = visible
            .into_iter()
            .map(|symbol| CompletionItem {
                label: symbol.name.clone(),
                kind: match symbol.kind {
                    SymbolKind::Function | SymbolKind::Builtin => CompletionKind::Function,
                    SymbolKind::Type | SymbolKind::Interface => CompletionKind::Type,
                    _ => CompletionKind::Variable,
                },
                detail: symbol.detail(),
            })
            .collect();

        items.extend(
            Keyword::ALL
                .iter()
                .map(Keyword::as_str)
                .filter(|keyword| keyword.starts_with(prefix))
                .map(|keyword| CompletionItem {
                    label: keyword.to_string(),
                    kind: CompletionKind::Keyword,
                    detail: "keyword".to_string(),
                }),
        );
        items
    }

    /// Declarations made in this document (parameters excluded), in
    /// source order
    pub fn document_symbols(&self) -> Vec<DocumentSymbol> {
        let mut symbols: Vec<DocumentSymbol> = self
            .symbols
            .iter()
            .filter(|symbol| symbol.local && symbol.kind != SymbolKind::Parameter)
            .map(|symbol| DocumentSymbol {
                name: symbol.name.clone(),
                kind: symbol.kind,
                detail: symbol.detail(),
                span: symbol.span,
            })
            .collect();
        symbols.sort_by_key(|symbol| symbol.span.start);
        symbols
    }

    fn word_before(&self, offset: usize) -> &str {
        let head = &self.source[..offset.min(self.source.len())];
        let start = head
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
            .last()
            .map(|(i, _)| i)
            .unwrap_or(head.len());
        &head[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "fn add(a: Int, b: Int) -> Int {\n    return a + b\n}\nlet total = add(1, 2)\nprint(total)\n";

    #[test]
    fn test_offsets() {
        let analysis = analyze(SOURCE);
        assert_eq!(analysis.offset(Position::new(1, 1)), Some(0));
        assert_eq!(analysis.offset(Position::new(2, 5)), Some(36));
        assert_eq!(analysis.offset(Position::new(99, 1)), None);
    }

    #[test]
    fn test_hover_on_use() {
        let analysis = analyze(SOURCE);
        assert!(analysis.diagnostics.is_empty());
        let hover = analysis.hover(Position::new(5, 8));
        assert_eq!(hover.map(|h| h.contents), Some("let total: Int".to_string()));
    }

    #[test]
    fn test_definition_and_references() {
        let analysis = analyze(SOURCE);
        let definition = analysis.definition(Position::new(4, 13));
        assert_eq!(definition.map(|s| (s.line, s.column)), Some((1, 4)));

        let uses = analysis.references(Position::new(1, 4), true);
        let lines: Vec<usize> = uses.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 4]);
        assert!(analysis.definition(Position::new(5, 2)).is_none());
    }

    #[test]
    fn test_completions_respect_scope() {
        let analysis = analyze(SOURCE);
        let labels: Vec<String> = analysis
            .completions(Position::new(2, 12))
            .into_iter()
            .map(|item| item.label)
            .collect();
        assert!(labels.contains(&"a".to_string()));
        assert!(labels.contains(&"add".to_string()));
        assert!(!labels.contains(&"total".to_string()));

        let items = analysis.completions(Position::new(5, 3));
        assert!(items.iter().any(|i| i.label == "print" && i.kind == CompletionKind::Function));
        assert!(items.iter().all(|i| i.label.starts_with("pr")));
    }

    #[test]
    fn test_keyword_completions() {
        let analysis = analyze("wh");
        let items = analysis.completions(Position::new(1, 3));
        assert!(items.iter().any(|i| i.label == "while" && i.kind == CompletionKind::Keyword));
    }

    #[test]
    fn test_document_symbols() {
        let analysis = analyze(SOURCE);
        let names: Vec<String> = analysis.document_symbols().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["add".to_string(), "total".to_string()]);
    }
}
