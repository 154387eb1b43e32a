//! Type system module
//!
//! This module handles name resolution and type checking.

pub mod type_def;
pub mod builtins;
pub mod checker;

pub use type_def::Type;
pub use builtins::Builtin;
pub use checker::{LoadedModule, Symbol, SymbolKind, TypeChecker, VTables};
