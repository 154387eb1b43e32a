//! Type checker implementation
//!
//! One pass over the tree that builds the scope tree, assigns a type to
//! every expression and reports every problem it finds. Function, type and
//! interface declarations are hoisted within their block; `let`/`const`
//! names are known to be pending until their declaration is reached.
//!
//! The checker also resolves interface dispatch: every `impl` block becomes
//! a vtable entry keyed by (interface, record), and method calls get the
//! matching [`MethodSlot`] written back into the tree.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, Span};
use crate::parser::ast::*;
use crate::parser::parse_source;
use crate::runtime::ErrorKind;
use super::builtins::Builtin;
use super::type_def::Type;

/// Interface method bodies per (interface, record), in interface order
pub type VTables = HashMap<(DeclId, DeclId), Vec<Rc<FunctionDecl>>>;

const PRELUDE: usize = 0;
const GLOBAL: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Parameter,
    Function,
    Type,
    Interface,
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    /// Span of the declaring name
    pub span: Span,
    /// Region of the source the symbol is visible in
    pub scope_span: Span,
    /// Declared in the checked document itself (not a builtin or import)
    pub local: bool,
    pub builtin: Option<Builtin>,
    /// Set for named function declarations (used by component calls)
    pub decl: Option<Rc<FunctionDecl>>,
}

impl Symbol {
    pub fn is_mutable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Parameter)
    }

    /// One-line description used by hover and completions
    pub fn detail(&self) -> String {
        match self.kind {
            SymbolKind::Builtin => match self.builtin {
                Some(builtin) => builtin.signature().to_string(),
                None => format!("fn {}", self.name),
            },
            SymbolKind::Variable => format!("let {}: {}", self.name, self.ty),
            SymbolKind::Constant => format!("const {}: {}", self.name, self.ty),
            SymbolKind::Parameter => format!("{}: {}", self.name, self.ty),
            SymbolKind::Function => match (&self.decl, &self.ty) {
                (Some(decl), Type::Function { params, ret, .. }) => {
                    let params: Vec<String> = decl
                        .params
                        .iter()
                        .zip(params.iter())
                        .map(|(p, t)| match p.default {
                            Some(_) => format!("{}: {} = ...", p.name, t),
                            None => format!("{}: {}", p.name, t),
                        })
                        .collect();
                    format!("fn {}({}) -> {}", self.name, params.join(", "), ret)
                }
                _ => format!("fn {}: {}", self.name, self.ty),
            },
            SymbolKind::Type => match &self.ty {
                Type::Record { .. } => format!("type {}", self.name),
                other => format!("type {} = {}", self.name, other),
            },
            SymbolKind::Interface => format!("interface {}", self.name),
        }
    }
}

/// A module pulled in by `import`, checked in the global scope
#[derive(Debug)]
pub struct LoadedModule {
    pub path: PathBuf,
    pub ast: Ast,
}

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<usize>,
    names: HashMap<String, usize>,
    /// `let`/`const` names of this block not declared yet
    pending: HashSet<String>,
    span: Span,
}

#[derive(Debug, Clone)]
struct RecordInfo {
    fields: Vec<(String, Type)>,
}

impl RecordInfo {
    fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MethodInfo {
    name: String,
    params: Vec<Type>,
    required: usize,
    ret: Type,
}

impl MethodInfo {
    fn signature(&self) -> Type {
        Type::Function {
            params: self.params.clone(),
            required: self.required,
            ret: Box::new(self.ret.clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct InterfaceInfo {
    name: String,
    methods: Vec<MethodInfo>,
}

enum Lookup {
    Found(usize),
    Pending,
    Missing,
}

/// Type checker
pub struct TypeChecker {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    current: usize,
    records: HashMap<DeclId, RecordInfo>,
    interfaces: HashMap<DeclId, InterfaceInfo>,
    implementations: HashSet<(DeclId, DeclId)>,
    record_methods: HashMap<DeclId, HashMap<String, (MethodSlot, MethodInfo)>>,
    vtables: VTables,
    pending_aliases: HashMap<usize, TypeExpr>,
    return_type: Option<Type>,
    loop_depth: usize,
    diagnostics: Diagnostics,
    references: Vec<(Span, usize)>,
    base_dir: Option<PathBuf>,
    loaded: HashSet<PathBuf>,
    modules: Vec<LoadedModule>,
    /// File being checked when inside an imported module
    file: Option<String>,
    repl: bool,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        let everywhere = Span {
            start: 0,
            end: usize::MAX,
            line: 1,
            column: 1,
        };
        let mut checker = Self {
            symbols: Vec::new(),
            scopes: vec![
                Scope {
                    parent: None,
                    names: HashMap::new(),
                    pending: HashSet::new(),
                    span: everywhere,
                },
                Scope {
                    parent: Some(PRELUDE),
                    names: HashMap::new(),
                    pending: HashSet::new(),
                    span: everywhere,
                },
            ],
            current: PRELUDE,
            records: HashMap::new(),
            interfaces: HashMap::new(),
            implementations: HashSet::new(),
            record_methods: HashMap::new(),
            vtables: HashMap::new(),
            pending_aliases: HashMap::new(),
            return_type: None,
            loop_depth: 0,
            diagnostics: Diagnostics::new(),
            references: Vec::new(),
            base_dir: None,
            loaded: HashSet::new(),
            modules: Vec::new(),
            file: None,
            repl: false,
        };

        // Register built-in functions
        for builtin in Builtin::ALL {
            let id = checker.symbols.len();
            checker.symbols.push(Symbol {
                name: builtin.name().to_string(),
                kind: SymbolKind::Builtin,
                ty: builtin.value_type(),
                span: Span::default(),
                scope_span: everywhere,
                local: false,
                builtin: Some(builtin),
                decl: None,
            });
            checker.scopes[PRELUDE]
                .names
                .insert(builtin.name().to_string(), id);
        }

        checker.current = GLOBAL;
        checker
    }

    /// Directory `import` paths of the checked document are relative to
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// In REPL mode a later unit may redeclare a global name
    pub fn set_repl_mode(&mut self, repl: bool) {
        self.repl = repl;
    }

    /// Type check one unit in the global scope
    pub fn check(&mut self, ast: &Ast) -> Diagnostics {
        self.current = GLOBAL;
        self.hoist(&ast.statements);
        for stmt in &ast.statements {
            self.check_stmt(stmt);
        }
        // Signatures are resolved both when hoisted and when checked.
        self.diagnostics.dedup();
        debug!(
            symbols = self.symbols.len(),
            errors = self.diagnostics.len(),
            "type check finished"
        );
        std::mem::take(&mut self.diagnostics)
    }

    /// Modules loaded by `import` since the last call, in load order
    pub fn take_modules(&mut self) -> Vec<LoadedModule> {
        std::mem::take(&mut self.modules)
    }

    pub fn vtables(&self) -> &VTables {
        &self.vtables
    }

    /// Whether record `record` implements interface `interface`
    pub fn implements(&self, interface: DeclId, record: DeclId) -> bool {
        self.implementations.contains(&(interface, record))
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Resolved name uses in the checked document: (use span, symbol index)
    pub fn references(&self) -> &[(Span, usize)] {
        &self.references
    }

    // ===== Scopes and symbols =====

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::new(kind, message, span).with_file(self.file.as_deref()));
    }

    fn mismatch(&mut self, message: impl Into<String>, span: Span) {
        self.error(DiagnosticKind::TypeMismatch, message, span);
    }

    fn enter_scope(&mut self, span: Span) {
        self.scopes.push(Scope {
            parent: Some(self.current),
            names: HashMap::new(),
            pending: HashSet::new(),
            span,
        });
        self.current = self.scopes.len() - 1;
    }

    fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, ty: Type, span: Span) -> usize {
        self.declare_symbol(name, kind, ty, span, None)
    }

    fn declare_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        ty: Type,
        span: Span,
        decl: Option<Rc<FunctionDecl>>,
    ) -> usize {
        let scope = self.current;
        if let Some(&existing) = self.scopes[scope].names.get(name) {
            if !(self.repl && scope == GLOBAL) {
                self.error(
                    DiagnosticKind::DuplicateDeclaration,
                    format!("'{}' is already declared in this scope", name),
                    span,
                );
                return existing;
            }
        }

        let id = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            ty,
            span,
            scope_span: self.scopes[scope].span,
            local: self.file.is_none(),
            builtin: None,
            decl,
        });
        self.scopes[scope].names.insert(name.to_string(), id);
        self.scopes[scope].pending.remove(name);
        id
    }

    fn lookup(&self, name: &str) -> Lookup {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let s = &self.scopes[id];
            if let Some(&symbol) = s.names.get(name) {
                return Lookup::Found(symbol);
            }
            if s.pending.contains(name) {
                return Lookup::Pending;
            }
            scope = s.parent;
        }
        Lookup::Missing
    }

    /// Look up a value name, reporting when it cannot be used here
    fn resolve_name(&mut self, name: &str, span: Span) -> Option<usize> {
        match self.lookup(name) {
            Lookup::Found(id) => {
                self.reference(span, id);
                Some(id)
            }
            Lookup::Pending => {
                self.error(
                    DiagnosticKind::UndeclaredName,
                    format!("'{}' is used before its declaration", name),
                    span,
                );
                None
            }
            Lookup::Missing => {
                self.error(
                    DiagnosticKind::UndeclaredName,
                    format!("Undeclared name '{}'", name),
                    span,
                );
                None
            }
        }
    }

    fn reference(&mut self, span: Span, symbol: usize) {
        if self.file.is_none() {
            self.references.push((span, symbol));
        }
    }

    fn types_compatible(&self, expected: &Type, actual: &Type) -> bool {
        expected.accepts(actual, &|i, r| self.implementations.contains(&(i, r)))
    }

    fn types_overlap(&self, a: &Type, b: &Type) -> bool {
        a.overlaps(b, &|i, r| self.implementations.contains(&(i, r)))
    }

    // ===== Type expressions =====

    fn resolve_type(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Named { name, span } => match name.as_str() {
                "Int" => Type::Int,
                "Float" => Type::Float,
                "String" => Type::String,
                "Boolean" => Type::Boolean,
                "Void" => Type::Void,
                "None" => Type::None,
                "Element" => Type::Element,
                "Stylesheet" => Type::Stylesheet,
                "Error" => Type::Error(None),
                _ => {
                    if let Some(kind) = ErrorKind::from_name(name) {
                        return Type::Error(Some(kind));
                    }
                    match self.lookup(name) {
                        Lookup::Found(id)
                            if matches!(
                                self.symbols[id].kind,
                                SymbolKind::Type | SymbolKind::Interface
                            ) =>
                        {
                            self.reference(*span, id);
                            if self.symbols[id].ty == Type::Unresolved {
                                return self.resolve_alias(id);
                            }
                            self.symbols[id].ty.clone()
                        }
                        Lookup::Found(_) => {
                            self.mismatch(format!("'{}' is not a type", name), *span);
                            Type::Invalid
                        }
                        _ => {
                            self.error(
                                DiagnosticKind::UndeclaredName,
                                format!("Unknown type '{}'", name),
                                *span,
                            );
                            Type::Invalid
                        }
                    }
                }
            },
            TypeExpr::Generic { name, args, span } => {
                let resolved: Vec<Type> = args.iter().map(|a| self.resolve_type(a)).collect();
                match (name.as_str(), resolved.len()) {
                    ("Array", 1) => Type::array(resolved[0].clone()),
                    ("Chan", 1) => Type::channel(resolved[0].clone()),
                    ("Array" | "Chan", n) => {
                        self.mismatch(
                            format!("'{}' expects 1 type argument, found {}", name, n),
                            *span,
                        );
                        Type::Invalid
                    }
                    _ => {
                        self.mismatch(format!("Type '{}' does not take type arguments", name), *span);
                        Type::Invalid
                    }
                }
            }
            TypeExpr::Array { element, .. } => Type::array(self.resolve_type(element)),
            TypeExpr::Optional { inner, .. } => Type::optional(self.resolve_type(inner)),
            TypeExpr::Union { members, .. } => {
                let members = members.iter().map(|m| self.resolve_type(m)).collect();
                Type::union(members)
            }
            TypeExpr::Function { params, ret, .. } => {
                let params = params.iter().map(|p| self.resolve_type(p)).collect();
                Type::function(params, self.resolve_type(ret))
            }
        }
    }

    fn resolve_alias(&mut self, symbol: usize) -> Type {
        match self.pending_aliases.remove(&symbol) {
            Some(target) => {
                let ty = self.resolve_type(&target);
                self.symbols[symbol].ty = ty.clone();
                ty
            }
            None => {
                let (name, span) = (self.symbols[symbol].name.clone(), self.symbols[symbol].span);
                self.mismatch(format!("Type alias '{}' refers to itself", name), span);
                self.symbols[symbol].ty = Type::Invalid;
                Type::Invalid
            }
        }
    }

    fn return_type_of(&mut self, decl: &FunctionDecl) -> Type {
        match &decl.return_type {
            Some(ty) => self.resolve_type(ty),
            None => Type::Void,
        }
    }

    /// Signature of a declaration, excluding any `self` receiver
    fn signature(&mut self, decl: &FunctionDecl) -> Type {
        let params = decl
            .params
            .iter()
            .map(|p| self.resolve_type(&p.type_annotation))
            .collect();
        Type::Function {
            params,
            required: decl.required_params(),
            ret: Box::new(self.return_type_of(decl)),
        }
    }

    // ===== Hoisting =====

    /// Bind the declarations of a block before any statement is checked
    fn hoist(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            if let Stmt::Import { path, span } = stmt {
                self.import_module(path, *span);
            }
        }

        let mut aliases = Vec::new();
        for stmt in statements {
            match stmt {
                Stmt::TypeDecl { id, name, name_span, kind, .. } => {
                    let ty = match kind {
                        TypeDeclKind::Record(_) => Type::Record { id: *id, name: name.clone() },
                        TypeDeclKind::Alias(_) => Type::Unresolved,
                    };
                    let symbol = self.declare(name, SymbolKind::Type, ty, *name_span);
                    if let TypeDeclKind::Alias(target) = kind {
                        if self.symbols[symbol].ty == Type::Unresolved {
                            self.pending_aliases.insert(symbol, target.clone());
                            aliases.push(symbol);
                        }
                    }
                }
                Stmt::Interface { id, name, name_span, .. } => {
                    let ty = Type::Interface { id: *id, name: name.clone() };
                    self.declare(name, SymbolKind::Interface, ty, *name_span);
                }
                _ => {}
            }
        }

        for symbol in aliases {
            if self.pending_aliases.contains_key(&symbol) {
                self.resolve_alias(symbol);
            }
        }

        for stmt in statements {
            match stmt {
                Stmt::TypeDecl { id, name, kind: TypeDeclKind::Record(fields), .. } => {
                    let mut resolved: Vec<(String, Type)> = Vec::new();
                    for field in fields {
                        let ty = self.resolve_type(&field.type_annotation);
                        if resolved.iter().any(|(n, _)| *n == field.name) {
                            self.error(
                                DiagnosticKind::DuplicateDeclaration,
                                format!("Field '{}' is declared twice in '{}'", field.name, name),
                                field.span,
                            );
                            continue;
                        }
                        resolved.push((field.name.clone(), ty));
                    }
                    self.records.insert(*id, RecordInfo { fields: resolved });
                }
                Stmt::Interface { id, name, methods, .. } => {
                    let mut infos: Vec<MethodInfo> = Vec::new();
                    for sig in methods {
                        let params = sig
                            .params
                            .iter()
                            .map(|p| self.resolve_type(&p.type_annotation))
                            .collect();
                        let ret = match &sig.return_type {
                            Some(ty) => self.resolve_type(ty),
                            None => Type::Void,
                        };
                        if infos.iter().any(|m| m.name == sig.name) {
                            self.error(
                                DiagnosticKind::DuplicateDeclaration,
                                format!("Method '{}' is declared twice in '{}'", sig.name, name),
                                sig.span,
                            );
                            continue;
                        }
                        infos.push(MethodInfo {
                            name: sig.name.clone(),
                            params,
                            required: sig.params.iter().filter(|p| p.default.is_none()).count(),
                            ret,
                        });
                    }
                    self.interfaces.insert(*id, InterfaceInfo { name: name.clone(), methods: infos });
                }
                _ => {}
            }
        }

        for stmt in statements {
            if let Stmt::Function(decl) = stmt {
                let ty = self.signature(decl);
                self.declare_symbol(
                    &decl.name,
                    SymbolKind::Function,
                    ty,
                    decl.name_span,
                    Some(Rc::clone(decl)),
                );
            }
        }

        for stmt in statements {
            if let Stmt::Impl { interface, interface_span, target, target_span, methods, .. } = stmt {
                self.register_impl(interface, *interface_span, target, *target_span, methods);
            }
        }

        for stmt in statements {
            if let Stmt::Let { name, .. } = stmt {
                self.scopes[self.current].pending.insert(name.clone());
            }
        }
    }

    fn register_impl(
        &mut self,
        interface: &str,
        interface_span: Span,
        target: &str,
        target_span: Span,
        methods: &[Rc<FunctionDecl>],
    ) {
        let iface_id = match self.resolve_type(&TypeExpr::Named {
            name: interface.to_string(),
            span: interface_span,
        }) {
            Type::Interface { id, .. } => id,
            Type::Invalid => return,
            _ => {
                self.mismatch(format!("'{}' is not an interface", interface), interface_span);
                return;
            }
        };
        let (record_id, record_name) = match self.resolve_type(&TypeExpr::Named {
            name: target.to_string(),
            span: target_span,
        }) {
            Type::Record { id, name } => (id, name),
            Type::Invalid => return,
            other => {
                self.mismatch(
                    format!("Only record types can implement interfaces, found '{}'", other),
                    target_span,
                );
                return;
            }
        };

        if !self.implementations.insert((iface_id, record_id)) {
            self.error(
                DiagnosticKind::DuplicateDeclaration,
                format!("'{}' already implements '{}'", record_name, interface),
                target_span,
            );
            return;
        }

        let info = match self.interfaces.get(&iface_id) {
            Some(info) => info.clone(),
            None => return,
        };
        let mut slots: Vec<Option<Rc<FunctionDecl>>> = vec![None; info.methods.len()];

        for method in methods {
            let found = self.signature(method);
            match info.methods.iter().position(|m| m.name == method.name) {
                Some(index) => {
                    let expected = &info.methods[index];
                    let matches = match &found {
                        Type::Function { params, ret, .. } => {
                            *params == expected.params && **ret == expected.ret
                        }
                        _ => false,
                    };
                    if !matches && !found.is_invalid() {
                        self.mismatch(
                            format!(
                                "Method '{}' does not match interface '{}': expected {}, found {}",
                                method.name,
                                info.name,
                                expected.signature(),
                                found
                            ),
                            method.name_span,
                        );
                    }
                    if slots[index].is_some() {
                        self.error(
                            DiagnosticKind::DuplicateDeclaration,
                            format!("Method '{}' is implemented twice", method.name),
                            method.name_span,
                        );
                    }
                    slots[index] = Some(Rc::clone(method));
                }
                None => self.mismatch(
                    format!("Method '{}' is not part of interface '{}'", method.name, info.name),
                    method.name_span,
                ),
            }
        }

        for (index, method) in info.methods.iter().enumerate() {
            if slots[index].is_none() {
                self.error(
                    DiagnosticKind::MissingInterfaceMethod,
                    format!(
                        "'{}' does not implement method '{}' required by '{}'",
                        record_name, method.name, info.name
                    ),
                    target_span,
                );
            }
        }

        for (index, method) in info.methods.iter().enumerate() {
            let entry = self.record_methods.entry(record_id).or_default();
            if entry.contains_key(&method.name) {
                let message = format!(
                    "'{}' already has a method named '{}' from another interface",
                    record_name, method.name
                );
                self.error(DiagnosticKind::DuplicateDeclaration, message, target_span);
                continue;
            }
            entry.insert(
                method.name.clone(),
                (MethodSlot { interface: iface_id, slot: index }, method.clone()),
            );
        }

        if slots.iter().all(Option::is_some) {
            self.vtables
                .insert((iface_id, record_id), slots.into_iter().flatten().collect());
        }
    }

    // ===== Imports =====

    fn import_module(&mut self, path: &str, span: Span) {
        let resolved = self.resolve_module_path(path);
        let key = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
        if !self.loaded.insert(key) {
            return;
        }

        let source = match std::fs::read_to_string(&resolved) {
            Ok(source) => source,
            Err(e) => {
                self.error(
                    DiagnosticKind::ImportError,
                    format!("Failed to load module '{}': {}", path, e),
                    span,
                );
                return;
            }
        };
        debug!(module = %resolved.display(), "loading module");

        let file = resolved.display().to_string();
        let (ast, mut parse_diagnostics) = parse_source(&source);
        if !parse_diagnostics.is_empty() {
            parse_diagnostics.set_file(Some(&file));
            self.diagnostics.extend(parse_diagnostics);
            return;
        }

        let saved_file = self.file.replace(file);
        let saved_dir = std::mem::replace(
            &mut self.base_dir,
            resolved.parent().map(Path::to_path_buf),
        );
        let saved_scope = std::mem::replace(&mut self.current, GLOBAL);

        self.hoist(&ast.statements);
        for stmt in &ast.statements {
            self.check_stmt(stmt);
        }

        self.current = saved_scope;
        self.base_dir = saved_dir;
        self.file = saved_file;
        self.modules.push(LoadedModule { path: resolved, ast });
    }

    fn resolve_module_path(&self, path: &str) -> PathBuf {
        let mut file = PathBuf::from(path);
        if file.extension().is_none() {
            file.set_extension(crate::SOURCE_EXTENSION);
        }
        match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file,
        }
    }

    // ===== Statements =====

    fn check_block(&mut self, statements: &[Stmt], span: Span) {
        self.enter_scope(span);
        self.hoist(statements);
        for stmt in statements {
            self.check_stmt(stmt);
        }
        self.exit_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import { .. } | Stmt::TypeDecl { .. } | Stmt::Interface { .. } => {}

            Stmt::Let { name, name_span, type_annotation, initializer, is_const, .. } => {
                let annotated = type_annotation.as_ref().map(|t| self.resolve_type(t));
                let init_type = self.check_expr(initializer, annotated.as_ref());

                let var_type = match annotated {
                    Some(annotated) => {
                        if !self.types_compatible(&annotated, &init_type) {
                            self.mismatch(
                                format!(
                                    "Cannot assign a value of type {} to '{}' of type {}",
                                    init_type, name, annotated
                                ),
                                initializer.span(),
                            );
                        }
                        annotated
                    }
                    None => {
                        match &init_type {
                            Type::Void => self.mismatch(
                                format!("Cannot bind '{}' to an expression of type Void", name),
                                initializer.span(),
                            ),
                            Type::None => self.mismatch(
                                format!("Cannot infer a type for '{}' from 'none'; add a type annotation", name),
                                initializer.span(),
                            ),
                            _ => {}
                        }
                        init_type
                    }
                };

                let kind = if *is_const { SymbolKind::Constant } else { SymbolKind::Variable };
                self.declare(name, kind, var_type, *name_span);
            }

            Stmt::Function(decl) => {
                self.check_function(decl, None);
            }

            Stmt::Impl { target, methods, .. } => {
                let self_type = match self.lookup(target) {
                    Lookup::Found(id) => self.symbols[id].ty.clone(),
                    _ => Type::Invalid,
                };
                let self_type = match self_type {
                    ty @ Type::Record { .. } => ty,
                    _ => Type::Invalid,
                };
                for method in methods {
                    self.check_function(method, Some(self_type.clone()));
                }
            }

            Stmt::Expression { expr, .. } => {
                self.check_expr(expr, None);
            }

            Stmt::Assign { target, value, span } => self.check_assign(target, value, *span),

            Stmt::If { branches, else_branch, span } => {
                for (condition, body) in branches {
                    self.check_condition(condition);
                    self.check_block(body, *span);
                }
                if let Some(body) = else_branch {
                    self.check_block(body, *span);
                }
            }

            Stmt::While { condition, body, span } => {
                self.check_condition(condition);
                self.loop_depth += 1;
                self.check_block(body, *span);
                self.loop_depth -= 1;
            }

            Stmt::For { variable, variable_span, iterable, body, span } => {
                let iterable_type = self.check_expr(iterable, None);
                let element = match iterable_type.iteration_type() {
                    Some(element) => element,
                    None => {
                        self.mismatch(
                            format!("Cannot iterate over a value of type {}", iterable_type),
                            iterable.span(),
                        );
                        Type::Invalid
                    }
                };
                self.enter_scope(*span);
                self.declare(variable, SymbolKind::Variable, element, *variable_span);
                self.loop_depth += 1;
                self.check_block(body, *span);
                self.loop_depth -= 1;
                self.exit_scope();
            }

            Stmt::Return { value, span } => {
                let expected = match self.return_type.clone() {
                    Some(expected) => expected,
                    None => {
                        self.error(
                            DiagnosticKind::SyntaxError,
                            "'return' outside of a function",
                            *span,
                        );
                        if let Some(value) = value {
                            self.check_expr(value, None);
                        }
                        return;
                    }
                };
                match value {
                    Some(value) => {
                        let actual = self.check_expr(value, Some(&expected));
                        if expected == Type::Void {
                            self.mismatch("Cannot return a value from a function returning Void", value.span());
                        } else if !self.types_compatible(&expected, &actual) {
                            self.mismatch(
                                format!("Expected return type {}, found {}", expected, actual),
                                value.span(),
                            );
                        }
                    }
                    None => {
                        if expected != Type::Void && !expected.is_invalid() {
                            self.mismatch(
                                format!("Missing return value of type {}", expected),
                                *span,
                            );
                        }
                    }
                }
            }

            Stmt::Break { span } | Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    let word = if matches!(stmt, Stmt::Break { .. }) { "break" } else { "continue" };
                    self.error(
                        DiagnosticKind::SyntaxError,
                        format!("'{}' outside of a loop", word),
                        *span,
                    );
                }
            }

            Stmt::Block { statements, span } => self.check_block(statements, *span),

            Stmt::Try { body, catches, span } => {
                self.check_block(body, *span);
                for clause in catches {
                    let error_type = match &clause.error_type {
                        Some(ty) => {
                            let resolved = self.resolve_type(ty);
                            if !self.is_error_type(&resolved) {
                                self.mismatch(
                                    format!("Catch clause type must be an error type, found {}", resolved),
                                    ty.span(),
                                );
                            }
                            resolved
                        }
                        None => Type::Error(None),
                    };
                    clause.resolved.replace(Some(error_type.clone()));

                    self.enter_scope(clause.span);
                    self.declare(&clause.name, SymbolKind::Variable, error_type, clause.name_span);
                    self.check_block(&clause.body, clause.span);
                    self.exit_scope();
                }
            }

            Stmt::Go { call, .. } => {
                self.check_expr(call, None);
            }

            Stmt::Send { channel, value, .. } => {
                let channel_type = self.check_expr(channel, None);
                match channel_type {
                    Type::Channel(element) => {
                        let actual = self.check_expr(value, Some(&element));
                        if !self.types_compatible(&element, &actual) {
                            self.mismatch(
                                format!("Cannot send a value of type {} on Chan<{}>", actual, element),
                                value.span(),
                            );
                        }
                    }
                    Type::Invalid => {
                        self.check_expr(value, None);
                    }
                    other => {
                        self.mismatch(format!("Cannot send on a value of type {}", other), channel.span());
                        self.check_expr(value, None);
                    }
                }
            }
        }
    }

    fn is_error_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Error(_) | Type::Invalid => true,
            Type::Union(members) => members.iter().all(|m| self.is_error_type(m)),
            _ => false,
        }
    }

    fn check_condition(&mut self, condition: &Expr) {
        let ty = self.check_expr(condition, None);
        if ty == Type::Void {
            self.mismatch("Condition has type Void", condition.span());
        }
    }

    /// Check a function body; returns the function's type
    fn check_function(&mut self, decl: &FunctionDecl, self_type: Option<Type>) -> Type {
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = self.resolve_type(&param.type_annotation);
            if let Some(default) = &param.default {
                let actual = self.check_expr(default, Some(&ty));
                if !self.types_compatible(&ty, &actual) {
                    self.mismatch(
                        format!(
                            "Default value of type {} does not match parameter '{}' of type {}",
                            actual, param.name, ty
                        ),
                        default.span(),
                    );
                }
            }
            params.push(ty);
        }

        let declared = decl.return_type.as_ref().map(|t| self.resolve_type(t));

        self.enter_scope(decl.span);
        if let Some(self_type) = self_type {
            self.declare("self", SymbolKind::Parameter, self_type, decl.name_span);
        }
        for (param, ty) in decl.params.iter().zip(params.iter()) {
            self.declare(&param.name, SymbolKind::Parameter, ty.clone(), param.span);
        }

        let saved_return = self.return_type.take();
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);

        let ret = match &decl.body {
            FunctionBody::Block(body) => {
                let ret = declared.unwrap_or(Type::Void);
                self.return_type = Some(ret.clone());
                self.hoist(body);
                for stmt in body {
                    self.check_stmt(stmt);
                }
                if ret != Type::Void && !ret.is_invalid() && !always_returns(body) {
                    let what = if decl.name.is_empty() {
                        "Function".to_string()
                    } else {
                        format!("Function '{}'", decl.name)
                    };
                    self.mismatch(
                        format!("{} must return a value of type {} on every path", what, ret),
                        decl.name_span,
                    );
                }
                ret
            }
            FunctionBody::Expr(body) => {
                self.return_type = declared.clone();
                let actual = self.check_expr(body, declared.as_ref());
                match declared {
                    Some(declared) => {
                        if !self.types_compatible(&declared, &actual) {
                            self.mismatch(
                                format!("Expected return type {}, found {}", declared, actual),
                                body.span(),
                            );
                        }
                        declared
                    }
                    None => actual,
                }
            }
        };

        self.return_type = saved_return;
        self.loop_depth = saved_loops;
        self.exit_scope();

        Type::Function {
            params,
            required: decl.required_params(),
            ret: Box::new(ret),
        }
    }

    fn check_assign(&mut self, target: &Expr, value: &Expr, span: Span) {
        let target_type = match target {
            Expr::Variable { name, span } => match self.resolve_name(name, *span) {
                Some(id) => {
                    let symbol = &self.symbols[id];
                    if symbol.is_mutable() {
                        symbol.ty.clone()
                    } else {
                        let message = match symbol.kind {
                            SymbolKind::Constant => format!("Cannot assign to constant '{}'", name),
                            _ => format!("Cannot assign to '{}'", name),
                        };
                        self.error(DiagnosticKind::InvalidAssignment, message, *span);
                        Type::Invalid
                    }
                }
                None => Type::Invalid,
            },
            Expr::Index { object, index, .. } => {
                self.check_assignment_root(object);
                let object_type = self.check_expr(object, None);
                let index_type = self.check_expr(index, None);
                if !matches!(index_type, Type::Int | Type::Invalid) {
                    self.mismatch(format!("Index must be Int, found {}", index_type), index.span());
                }
                match object_type {
                    Type::Array(element) => *element,
                    Type::String => {
                        self.error(
                            DiagnosticKind::InvalidAssignment,
                            "Strings cannot be modified by index",
                            target.span(),
                        );
                        Type::Invalid
                    }
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.mismatch(format!("Cannot index a value of type {}", other), object.span());
                        Type::Invalid
                    }
                }
            }
            Expr::Member { object, field, field_span, .. } => {
                self.check_assignment_root(object);
                let object_type = self.check_expr(object, None);
                self.field_type(&object_type, field, *field_span)
            }
            _ => {
                self.error(DiagnosticKind::InvalidAssignment, "Invalid assignment target", span);
                self.check_expr(target, None);
                Type::Invalid
            }
        };

        let actual = self.check_expr(value, Some(&target_type));
        if !self.types_compatible(&target_type, &actual) {
            self.mismatch(
                format!("Cannot assign a value of type {} to a target of type {}", actual, target_type),
                value.span(),
            );
        }
    }

    /// `a[i].f = v` updates the variable `a`, which must be mutable
    fn check_assignment_root(&mut self, object: &Expr) {
        let mut root = object;
        loop {
            match root {
                Expr::Index { object, .. } | Expr::Member { object, .. } => root = object,
                _ => break,
            }
        }
        match root {
            Expr::Variable { name, span } => {
                if let Lookup::Found(id) = self.lookup(name) {
                    if !self.symbols[id].is_mutable() {
                        self.error(
                            DiagnosticKind::InvalidAssignment,
                            format!("Cannot modify constant '{}'", name),
                            *span,
                        );
                    }
                }
            }
            other => self.error(
                DiagnosticKind::InvalidAssignment,
                "Only variables can be modified",
                other.span(),
            ),
        }
    }

    // ===== Expressions =====

    /// Type of `expr`; `expected` guides literals whose type cannot be
    /// inferred on their own (empty arrays, match arms)
    fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match expr {
            Expr::Literal { value, .. } => literal_type(value),

            Expr::Template { parts, .. } => {
                for part in parts {
                    if let TemplateSegment::Expr(inner) = part {
                        let ty = self.check_expr(inner, None);
                        if ty == Type::Void {
                            self.mismatch("Cannot interpolate a Void value", inner.span());
                        }
                    }
                }
                Type::String
            }

            Expr::Variable { name, span } => match self.resolve_name(name, *span) {
                Some(id) => match self.symbols[id].kind {
                    SymbolKind::Type | SymbolKind::Interface => {
                        self.mismatch(format!("'{}' is a type, not a value", name), *span);
                        Type::Invalid
                    }
                    _ => self.symbols[id].ty.clone(),
                },
                None => Type::Invalid,
            },

            Expr::Binary { left, operator, right, span } => {
                let left_type = self.check_expr(left, None);
                let right_type = self.check_expr(right, None);
                self.check_binary(*operator, &left_type, &right_type, *span)
            }

            Expr::Logical { left, operator, right, .. } => {
                let left_type = self.check_expr(left, None);
                match operator {
                    LogicalOp::And | LogicalOp::Or => {
                        let right_type = self.check_expr(right, None);
                        for (ty, side) in [(&left_type, left), (&right_type, right)] {
                            if *ty == Type::Void {
                                self.mismatch(
                                    format!("Operand of '{}' has type Void", operator.as_str()),
                                    side.span(),
                                );
                            }
                        }
                        Type::Boolean
                    }
                    LogicalOp::Coalesce => match left_type {
                        Type::Optional(inner) => {
                            let right_type = self.check_expr(right, Some(&inner));
                            if self.types_compatible(&inner, &right_type) {
                                *inner
                            } else {
                                Type::union(vec![*inner, right_type])
                            }
                        }
                        Type::None => self.check_expr(right, expected),
                        other => {
                            self.check_expr(right, None);
                            other
                        }
                    },
                }
            }

            Expr::Unary { operator, operand, span } => {
                let operand_type = self.check_expr(operand, None);
                match operator {
                    UnaryOp::Negate => match operand_type {
                        Type::Int | Type::Float | Type::Invalid => operand_type,
                        other => {
                            self.mismatch(format!("Cannot negate a value of type {}", other), *span);
                            Type::Invalid
                        }
                    },
                    UnaryOp::Not => {
                        if operand_type == Type::Void {
                            self.mismatch("Cannot apply '!' to Void", *span);
                        }
                        Type::Boolean
                    }
                    UnaryOp::Receive => match operand_type {
                        Type::Channel(element) => Type::optional(*element),
                        Type::Invalid => Type::Invalid,
                        other => {
                            self.mismatch(
                                format!("Cannot receive from a value of type {}", other),
                                operand.span(),
                            );
                            Type::Invalid
                        }
                    },
                }
            }

            Expr::Call { callee, arguments, span } => self.check_call(callee, arguments, *span),

            Expr::MethodCall { receiver, method, method_span, arguments, slot, span } => {
                let receiver_type = self.check_expr(receiver, None);
                self.check_method_call(&receiver_type, method, *method_span, arguments, slot, *span)
            }

            Expr::Index { object, index, .. } => {
                let object_type = self.check_expr(object, None);
                let index_type = self.check_expr(index, None);
                if !matches!(index_type, Type::Int | Type::Invalid) {
                    self.mismatch(format!("Index must be Int, found {}", index_type), index.span());
                }
                match object_type {
                    Type::Array(element) => *element,
                    Type::String => Type::String,
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.mismatch(format!("Cannot index a value of type {}", other), object.span());
                        Type::Invalid
                    }
                }
            }

            Expr::Member { object, field, field_span, .. } => {
                let object_type = self.check_expr(object, None);
                self.field_type(&object_type, field, *field_span)
            }

            Expr::Array { elements, span } => {
                let expected_element = expected.and_then(expected_array_element);
                if elements.is_empty() {
                    return match expected_element {
                        Some(element) => Type::array(element),
                        None => {
                            self.mismatch(
                                "Cannot infer the element type of an empty array; add a type annotation",
                                *span,
                            );
                            Type::Invalid
                        }
                    };
                }

                let mut types = Vec::with_capacity(elements.len());
                for element in elements {
                    types.push(self.check_expr(element, expected_element.as_ref()));
                }
                match expected_element {
                    Some(element) if types.iter().all(|t| self.types_compatible(&element, t)) => {
                        Type::array(element)
                    }
                    _ => Type::array(Type::union(types)),
                }
            }

            Expr::Record { name, name_span, fields, decl, span } => {
                self.check_record(name, *name_span, fields, decl, *span)
            }

            Expr::Lambda { function, .. } => self.check_function(function, None),

            Expr::Match { subject, arms, .. } => self.check_match(subject, arms, expected),

            Expr::Channel { element_type, capacity, .. } => {
                let element = self.resolve_type(element_type);
                if let Some(capacity) = capacity {
                    let ty = self.check_expr(capacity, None);
                    if !matches!(ty, Type::Int | Type::Invalid) {
                        self.mismatch(format!("Channel capacity must be Int, found {}", ty), capacity.span());
                    }
                }
                Type::channel(element)
            }

            Expr::Ui { children, .. } => {
                self.check_ui_nodes(children);
                Type::Element
            }

            Expr::Style { rules, .. } => {
                for rule in rules {
                    for declaration in &rule.declarations {
                        for part in &declaration.value {
                            if let TemplateSegment::Expr(inner) = part {
                                let ty = self.check_expr(inner, None);
                                if ty == Type::Void {
                                    self.mismatch("Cannot interpolate a Void value", inner.span());
                                }
                            }
                        }
                    }
                }
                Type::Stylesheet
            }
        }
    }

    fn check_binary(&mut self, operator: BinaryOp, left: &Type, right: &Type, span: Span) -> Type {
        if left.is_invalid() || right.is_invalid() {
            return match operator {
                BinaryOp::Equal | BinaryOp::NotEqual => Type::Boolean,
                _ if operator.is_comparison() => Type::Boolean,
                _ => Type::Invalid,
            };
        }

        match operator {
            BinaryOp::Add => match (left, right) {
                (Type::Int, Type::Int) => Type::Int,
                (l, r) if l.is_numeric() && r.is_numeric() => Type::Float,
                (Type::String, other) | (other, Type::String) if is_primitive(other) => Type::String,
                _ => self.operator_mismatch(operator, left, right, span),
            },
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                match (left, right) {
                    (Type::Int, Type::Int) => Type::Int,
                    (l, r) if l.is_numeric() && r.is_numeric() => Type::Float,
                    _ => self.operator_mismatch(operator, left, right, span),
                }
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let comparable = (left.is_numeric() && right.is_numeric())
                    || self.types_overlap(left, right);
                if !comparable {
                    self.mismatch(format!("Cannot compare {} with {}", left, right), span);
                }
                Type::Boolean
            }
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                let ordered = (left.is_numeric() && right.is_numeric())
                    || (*left == Type::String && *right == Type::String);
                if !ordered {
                    self.operator_mismatch(operator, left, right, span);
                }
                Type::Boolean
            }
        }
    }

    fn operator_mismatch(&mut self, operator: BinaryOp, left: &Type, right: &Type, span: Span) -> Type {
        self.mismatch(
            format!("Cannot apply '{}' to {} and {}", operator.as_str(), left, right),
            span,
        );
        Type::Invalid
    }

    fn check_call(&mut self, callee: &Expr, arguments: &[Expr], span: Span) -> Type {
        if let Expr::Variable { name, span: name_span } = callee {
            if let Lookup::Found(id) = self.lookup(name) {
                if let Some(builtin) = self.symbols[id].builtin {
                    self.reference(*name_span, id);
                    return self.check_builtin_call(builtin, arguments, span);
                }
            }
        }

        let callee_type = self.check_expr(callee, None);
        let what = match callee {
            Expr::Variable { name, .. } => format!("Function '{}'", name),
            _ => "Function".to_string(),
        };
        match callee_type {
            Type::Function { params, required, ret } => {
                self.check_arguments(&what, &params, required, arguments, span);
                *ret
            }
            Type::Invalid => {
                for argument in arguments {
                    self.check_expr(argument, None);
                }
                Type::Invalid
            }
            other => {
                self.mismatch(format!("Cannot call a value of type {}", other), callee.span());
                for argument in arguments {
                    self.check_expr(argument, None);
                }
                Type::Invalid
            }
        }
    }

    fn check_arguments(
        &mut self,
        what: &str,
        params: &[Type],
        required: usize,
        arguments: &[Expr],
        span: Span,
    ) {
        if arguments.len() < required || arguments.len() > params.len() {
            let expected = if required == params.len() {
                required.to_string()
            } else {
                format!("{} to {}", required, params.len())
            };
            self.error(
                DiagnosticKind::ArityMismatch,
                format!(
                    "{} expects {} argument(s), found {}",
                    what,
                    expected,
                    arguments.len()
                ),
                span,
            );
        }

        for (index, argument) in arguments.iter().enumerate() {
            match params.get(index) {
                Some(param) => {
                    let actual = self.check_expr(argument, Some(param));
                    if !self.types_compatible(param, &actual) {
                        self.mismatch(
                            format!("Argument {}: expected {}, found {}", index + 1, param, actual),
                            argument.span(),
                        );
                    }
                }
                None => {
                    self.check_expr(argument, None);
                }
            }
        }
    }

    fn check_builtin_call(&mut self, builtin: Builtin, arguments: &[Expr], span: Span) -> Type {
        let types: Vec<Type> = match builtin {
            Builtin::Push if arguments.len() == 2 => {
                let array = self.check_expr(&arguments[0], None);
                let element = match &array {
                    Type::Array(element) => Some((**element).clone()),
                    _ => None,
                };
                let value = self.check_expr(&arguments[1], element.as_ref());
                vec![array, value]
            }
            _ => arguments.iter().map(|a| self.check_expr(a, None)).collect(),
        };

        let (min, max) = builtin.arity();
        if types.len() < min || types.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            self.error(
                DiagnosticKind::ArityMismatch,
                format!(
                    "Function '{}' expects {} argument(s), found {}",
                    builtin.name(),
                    expected,
                    types.len()
                ),
                span,
            );
            return Type::Invalid;
        }

        match builtin.check(&types) {
            Ok(ty) => ty,
            Err(message) => {
                self.mismatch(message, span);
                Type::Invalid
            }
        }
    }

    fn check_method_call(
        &mut self,
        receiver: &Type,
        method: &str,
        method_span: Span,
        arguments: &[Expr],
        slot: &std::cell::Cell<Option<MethodSlot>>,
        span: Span,
    ) -> Type {
        let what = format!("Method '{}'", method);
        match receiver {
            Type::Record { id, name } => {
                let field = self
                    .records
                    .get(id)
                    .and_then(|info| info.field(method))
                    .cloned();
                if let Some(Type::Function { params, required, ret }) = field {
                    self.check_arguments(&what, &params, required, arguments, span);
                    return *ret;
                }

                let resolved = self
                    .record_methods
                    .get(id)
                    .and_then(|methods| methods.get(method))
                    .cloned();
                match resolved {
                    Some((method_slot, info)) => {
                        slot.set(Some(method_slot));
                        self.check_arguments(&what, &info.params, info.required, arguments, span);
                        info.ret
                    }
                    None => {
                        self.error(
                            DiagnosticKind::UndeclaredName,
                            format!("Type '{}' has no method '{}'", name, method),
                            method_span,
                        );
                        for argument in arguments {
                            self.check_expr(argument, None);
                        }
                        Type::Invalid
                    }
                }
            }
            Type::Interface { id, name } => {
                let found = self.interfaces.get(id).and_then(|info| {
                    info.methods
                        .iter()
                        .position(|m| m.name == method)
                        .map(|index| (index, info.methods[index].clone()))
                });
                match found {
                    Some((index, info)) => {
                        slot.set(Some(MethodSlot { interface: *id, slot: index }));
                        self.check_arguments(&what, &info.params, info.required, arguments, span);
                        info.ret
                    }
                    None => {
                        self.error(
                            DiagnosticKind::UndeclaredName,
                            format!("Interface '{}' has no method '{}'", name, method),
                            method_span,
                        );
                        Type::Invalid
                    }
                }
            }
            Type::Invalid => {
                for argument in arguments {
                    self.check_expr(argument, None);
                }
                Type::Invalid
            }
            other => {
                self.mismatch(format!("Type {} has no method '{}'", other, method), method_span);
                for argument in arguments {
                    self.check_expr(argument, None);
                }
                Type::Invalid
            }
        }
    }

    fn field_type(&mut self, object: &Type, field: &str, field_span: Span) -> Type {
        match object {
            Type::Record { id, name } => {
                match self.records.get(id).and_then(|info| info.field(field)).cloned() {
                    Some(ty) => ty,
                    None => {
                        self.error(
                            DiagnosticKind::UndeclaredName,
                            format!("Type '{}' has no field '{}'", name, field),
                            field_span,
                        );
                        Type::Invalid
                    }
                }
            }
            Type::Error(_) => match field {
                "message" | "kind" => Type::String,
                "line" | "column" => Type::Int,
                _ => {
                    self.error(
                        DiagnosticKind::UndeclaredName,
                        format!("Errors have no field '{}'", field),
                        field_span,
                    );
                    Type::Invalid
                }
            },
            Type::Invalid => Type::Invalid,
            other => {
                self.mismatch(format!("Type {} has no field '{}'", other, field), field_span);
                Type::Invalid
            }
        }
    }

    fn check_record(
        &mut self,
        name: &str,
        name_span: Span,
        fields: &[(String, Expr)],
        decl: &std::cell::Cell<Option<DeclId>>,
        span: Span,
    ) -> Type {
        let ty = self.resolve_type(&TypeExpr::Named {
            name: name.to_string(),
            span: name_span,
        });
        let (id, record_name) = match ty {
            Type::Record { id, name } => (id, name),
            other => {
                if !other.is_invalid() {
                    self.mismatch(format!("'{}' is not a record type", name), name_span);
                }
                for (_, value) in fields {
                    self.check_expr(value, None);
                }
                return Type::Invalid;
            }
        };
        decl.set(Some(id));

        let info = match self.records.get(&id) {
            Some(info) => info.clone(),
            None => return Type::Invalid,
        };

        let mut seen: HashSet<&str> = HashSet::new();
        for (field, value) in fields {
            if !seen.insert(field.as_str()) {
                self.error(
                    DiagnosticKind::DuplicateDeclaration,
                    format!("Field '{}' is given twice", field),
                    value.span(),
                );
            }
            match info.field(field) {
                Some(expected) => {
                    let actual = self.check_expr(value, Some(expected));
                    if !self.types_compatible(expected, &actual) {
                        self.mismatch(
                            format!(
                                "Field '{}' of '{}' has type {}, found {}",
                                field, record_name, expected, actual
                            ),
                            value.span(),
                        );
                    }
                }
                None => {
                    self.error(
                        DiagnosticKind::UndeclaredName,
                        format!("Type '{}' has no field '{}'", record_name, field),
                        value.span(),
                    );
                    self.check_expr(value, None);
                }
            }
        }

        for (field, ty) in &info.fields {
            if !seen.contains(field.as_str()) && !ty.is_nullable() {
                self.mismatch(
                    format!("Missing field '{}' in '{}' literal", field, record_name),
                    span,
                );
            }
        }

        Type::Record { id, name: record_name }
    }

    fn check_match(&mut self, subject: &Expr, arms: &[MatchArm], expected: Option<&Type>) -> Type {
        let subject_type = self.check_expr(subject, None);
        let mut arm_types = Vec::with_capacity(arms.len());

        for arm in arms {
            self.enter_scope(arm.span);
            match &arm.pattern {
                Pattern::Wildcard { .. } => {}
                Pattern::Literal { value, span } => {
                    let pattern_type = literal_type(value);
                    let possible = (pattern_type.is_numeric() && subject_type.is_numeric())
                        || self.types_overlap(&pattern_type, &subject_type);
                    if !possible {
                        self.mismatch(
                            format!(
                                "Pattern of type {} can never match a value of type {}",
                                pattern_type, subject_type
                            ),
                            *span,
                        );
                    }
                }
                Pattern::Binding { name, span } => {
                    self.declare(name, SymbolKind::Variable, subject_type.clone(), *span);
                }
                Pattern::Typed { name, type_annotation, resolved, span } => {
                    let ty = self.resolve_type(type_annotation);
                    if !self.types_overlap(&ty, &subject_type) {
                        self.mismatch(
                            format!(
                                "Pattern of type {} can never match a value of type {}",
                                ty, subject_type
                            ),
                            *span,
                        );
                    }
                    resolved.replace(Some(ty.clone()));
                    self.declare(name, SymbolKind::Variable, ty, *span);
                }
            }

            if let Some(guard) = &arm.guard {
                self.check_condition(guard);
            }

            let arm_type = match &arm.body {
                ArmBody::Expr(body) => self.check_expr(body, expected),
                ArmBody::Block(statements) => {
                    self.check_block(statements, arm.span);
                    Type::Void
                }
            };
            self.exit_scope();

            if let Some(expected) = expected {
                if arm_type != Type::Void && !self.types_compatible(expected, &arm_type) {
                    self.mismatch(
                        format!("Match arm has type {}, expected {}", arm_type, expected),
                        arm.span,
                    );
                }
            }
            arm_types.push(arm_type);
        }

        if arm_types.is_empty() || arm_types.iter().any(|t| *t == Type::Void) {
            return Type::Void;
        }
        match expected {
            Some(expected) if *expected != Type::Void => expected.clone(),
            _ => Type::union(arm_types),
        }
    }

    // ===== UI =====

    fn check_ui_nodes(&mut self, nodes: &[UiNode]) {
        for node in nodes {
            self.check_ui_node(node);
        }
    }

    fn check_ui_node(&mut self, node: &UiNode) {
        match node {
            UiNode::Element { tag, tag_span, attributes, children, span } => {
                if let Lookup::Found(id) = self.lookup(tag) {
                    let symbol = self.symbols[id].clone();
                    if let Type::Function { .. } = symbol.ty {
                        if symbol.kind != SymbolKind::Builtin {
                            self.reference(*tag_span, id);
                            self.check_component(&symbol, attributes, children, *span);
                            return;
                        }
                    }
                    if is_bare_value(node, symbol.kind) {
                        self.reference(*tag_span, id);
                        if !is_renderable(&symbol.ty) {
                            self.mismatch(
                                format!("Cannot place a value of type {} in markup", symbol.ty),
                                *tag_span,
                            );
                        }
                        return;
                    }
                }

                let mut seen: HashSet<&str> = HashSet::new();
                for attribute in attributes {
                    if !seen.insert(attribute.name.as_str()) {
                        self.error(
                            DiagnosticKind::DuplicateDeclaration,
                            format!("Attribute '{}' is given twice", attribute.name),
                            attribute.span,
                        );
                    }
                    let ty = self.check_expr(&attribute.value, None);
                    if matches!(ty, Type::Void | Type::Function { .. }) {
                        self.mismatch(
                            format!("Attribute '{}' cannot hold a value of type {}", attribute.name, ty),
                            attribute.value.span(),
                        );
                    }
                }
                self.check_ui_nodes(children);
            }
            UiNode::Text { value, .. } => {
                self.check_expr(value, None);
            }
            UiNode::Splice { expr, .. } => {
                let ty = self.check_expr(expr, None);
                if !is_renderable(&ty) {
                    self.mismatch(
                        format!("Cannot place a value of type {} in markup", ty),
                        expr.span(),
                    );
                }
            }
            UiNode::For { variable, variable_span, iterable, children, span } => {
                let iterable_type = self.check_expr(iterable, None);
                let element = match iterable_type.iteration_type() {
                    Some(element) => element,
                    None => {
                        self.mismatch(
                            format!("Cannot iterate over a value of type {}", iterable_type),
                            iterable.span(),
                        );
                        Type::Invalid
                    }
                };
                self.enter_scope(*span);
                self.declare(variable, SymbolKind::Variable, element, *variable_span);
                self.check_ui_nodes(children);
                self.exit_scope();
            }
            UiNode::If { branches, else_children, span } => {
                for (condition, children) in branches {
                    self.check_condition(condition);
                    self.enter_scope(*span);
                    self.check_ui_nodes(children);
                    self.exit_scope();
                }
                if let Some(children) = else_children {
                    self.enter_scope(*span);
                    self.check_ui_nodes(children);
                    self.exit_scope();
                }
            }
        }
    }

    /// A tag naming a function is a call with named arguments; nested
    /// children are passed as the `children` parameter
    fn check_component(
        &mut self,
        symbol: &Symbol,
        attributes: &[UiAttribute],
        children: &[UiNode],
        span: Span,
    ) {
        let (decl, params, ret) = match (&symbol.decl, &symbol.ty) {
            (Some(decl), Type::Function { params, ret, .. }) => (Rc::clone(decl), params.clone(), (**ret).clone()),
            _ => {
                self.mismatch(
                    format!("'{}' must be a declared function to be used as a component", symbol.name),
                    span,
                );
                return;
            }
        };

        let mut provided: HashSet<&str> = HashSet::new();
        for attribute in attributes {
            if !provided.insert(attribute.name.as_str()) {
                self.error(
                    DiagnosticKind::DuplicateDeclaration,
                    format!("Argument '{}' is given twice", attribute.name),
                    attribute.span,
                );
            }
            match decl.params.iter().position(|p| p.name == attribute.name) {
                Some(index) => {
                    let expected = &params[index];
                    let actual = self.check_expr(&attribute.value, Some(expected));
                    if !self.types_compatible(expected, &actual) {
                        self.mismatch(
                            format!(
                                "Argument '{}' of component '{}': expected {}, found {}",
                                attribute.name, symbol.name, expected, actual
                            ),
                            attribute.value.span(),
                        );
                    }
                }
                None => {
                    self.error(
                        DiagnosticKind::UndeclaredName,
                        format!("Component '{}' has no parameter '{}'", symbol.name, attribute.name),
                        attribute.span,
                    );
                    self.check_expr(&attribute.value, None);
                }
            }
        }

        if !children.is_empty() {
            match decl.params.iter().position(|p| p.name == "children") {
                Some(index) => {
                    if provided.contains("children") {
                        self.error(
                            DiagnosticKind::DuplicateDeclaration,
                            "Argument 'children' is given twice",
                            span,
                        );
                    }
                    let children_type = Type::array(Type::Element);
                    if !self.types_compatible(&params[index], &children_type) {
                        self.mismatch(
                            format!(
                                "Parameter 'children' of component '{}' must accept {}, found {}",
                                symbol.name, children_type, params[index]
                            ),
                            span,
                        );
                    }
                    provided.insert("children");
                }
                None => self.mismatch(
                    format!("Component '{}' does not accept children", symbol.name),
                    span,
                ),
            }
            self.check_ui_nodes(children);
        }

        for param in &decl.params {
            if param.default.is_none() && !provided.contains(param.name.as_str()) {
                self.error(
                    DiagnosticKind::ArityMismatch,
                    format!("Component '{}' is missing argument '{}'", symbol.name, param.name),
                    span,
                );
            }
        }

        if !self.types_compatible(&Type::Element, &ret) {
            self.mismatch(
                format!("Component '{}' must return Element, found {}", symbol.name, ret),
                span,
            );
        }
    }
}

fn literal_type(value: &Literal) -> Type {
    match value {
        Literal::Integer(_) => Type::Int,
        Literal::Float(_) => Type::Float,
        Literal::String(_) => Type::String,
        Literal::Boolean(_) => Type::Boolean,
        Literal::None => Type::None,
    }
}

/// Types whose display form may be concatenated onto a String
fn is_primitive(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Int | Type::Float | Type::String | Type::Boolean | Type::None | Type::Optional(_)
    )
}

/// A bare `name` in markup with no attributes or children that names a
/// value binding is spliced rather than treated as a tag
fn is_bare_value(node: &UiNode, kind: SymbolKind) -> bool {
    matches!(
        node,
        UiNode::Element { attributes, children, .. } if attributes.is_empty() && children.is_empty()
    ) && matches!(kind, SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Parameter)
}

fn is_renderable(ty: &Type) -> bool {
    match ty {
        Type::Element
        | Type::String
        | Type::Int
        | Type::Float
        | Type::Boolean
        | Type::None
        | Type::Invalid => true,
        Type::Optional(inner) | Type::Array(inner) => is_renderable(inner),
        Type::Union(members) => members.iter().all(is_renderable),
        _ => false,
    }
}

fn expected_array_element(expected: &Type) -> Option<Type> {
    match expected {
        Type::Array(element) => Some((**element).clone()),
        Type::Optional(inner) => expected_array_element(inner),
        Type::Union(members) => members.iter().find_map(expected_array_element),
        _ => None,
    }
}

/// Whether every path through `statements` ends in `return` (or a call
/// to `panic`, or a `while true` loop without `break`)
fn always_returns(statements: &[Stmt]) -> bool {
    statements.iter().any(stmt_returns)
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::If { branches, else_branch: Some(else_branch), .. } => {
            branches.iter().all(|(_, body)| always_returns(body)) && always_returns(else_branch)
        }
        Stmt::Block { statements, .. } => always_returns(statements),
        Stmt::Try { body, catches, .. } => {
            always_returns(body) && catches.iter().all(|c| always_returns(&c.body))
        }
        Stmt::Expression { expr: Expr::Call { callee, .. }, .. } => {
            matches!(&**callee, Expr::Variable { name, .. } if name == "panic")
        }
        Stmt::While {
            condition: Expr::Literal { value: Literal::Boolean(true), .. },
            body,
            ..
        } => !body.iter().any(breaks_loop),
        _ => false,
    }
}

/// Whether a `break` in `stmt` would leave the enclosing loop
fn breaks_loop(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Break { .. } => true,
        Stmt::If { branches, else_branch, .. } => {
            branches.iter().any(|(_, body)| body.iter().any(breaks_loop))
                || else_branch.as_ref().is_some_and(|b| b.iter().any(breaks_loop))
        }
        Stmt::Block { statements, .. } => statements.iter().any(breaks_loop),
        Stmt::Try { body, catches, .. } => {
            body.iter().any(breaks_loop)
                || catches.iter().any(|c| c.body.iter().any(breaks_loop))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Diagnostics {
        let (ast, parse_errors) = parse_source(source);
        assert!(parse_errors.is_empty(), "parse errors: {}", parse_errors);
        TypeChecker::new().check(&ast)
    }

    fn kinds(source: &str) -> Vec<DiagnosticKind> {
        check(source).iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_well_typed_program() {
        let diagnostics = check(
            "fn add(a: Int, b: Int) -> Int { return a + b }\n\
             fn greet(name: String = \"World\") -> String { return f\"Hello, {name}!\" }\n\
             let total = add(5, 3)\n\
             print(greet(), greet(\"Argus\"), total)\n",
        );
        assert!(diagnostics.is_empty(), "{}", diagnostics);
    }

    #[test]
    fn test_argument_type_mismatch() {
        assert_eq!(
            kinds("fn add(a: Int, b: Int) -> Int { return a + b }\nadd(1, \"two\")"),
            vec![DiagnosticKind::TypeMismatch]
        );
    }

    #[test]
    fn test_arity_with_defaults() {
        let source = "fn greet(name: String = \"World\") -> String { return name }\n\
                      greet()\ngreet(\"a\")\ngreet(\"a\", \"b\")";
        assert_eq!(kinds(source), vec![DiagnosticKind::ArityMismatch]);
    }

    #[test]
    fn test_undeclared_and_use_before_declaration() {
        assert_eq!(kinds("print(missing)"), vec![DiagnosticKind::UndeclaredName]);
        assert_eq!(
            kinds("print(x)\nlet x = 1"),
            vec![DiagnosticKind::UndeclaredName]
        );
    }

    #[test]
    fn test_functions_are_hoisted() {
        assert!(check("let x = later(2)\nfn later(n: Int) -> Int { return n * 2 }").is_empty());
    }

    #[test]
    fn test_duplicate_declaration() {
        assert_eq!(
            kinds("let a = 1\nlet a = 2"),
            vec![DiagnosticKind::DuplicateDeclaration]
        );
        // Shadowing in a nested block is fine.
        assert!(check("let a = 1\nif true { let a = \"s\"\nprint(a) }").is_empty());
    }

    #[test]
    fn test_const_assignment() {
        assert_eq!(
            kinds("const limit = 10\nlimit = 11"),
            vec![DiagnosticKind::InvalidAssignment]
        );
    }

    #[test]
    fn test_return_type_checked() {
        assert_eq!(
            kinds("fn f() -> Int { return \"no\" }"),
            vec![DiagnosticKind::TypeMismatch]
        );
        assert_eq!(
            kinds("fn f(x: Int) -> Int { if x > 0 { return 1 } }"),
            vec![DiagnosticKind::TypeMismatch]
        );
    }

    #[test]
    fn test_union_assignability() {
        assert!(check("type Id = Int | String\nlet a: Id = 1\nlet b: Id = \"x\"").is_empty());
        assert_eq!(
            kinds("type Id = Int | String\nlet c: Id = true"),
            vec![DiagnosticKind::TypeMismatch]
        );
    }

    #[test]
    fn test_interface_missing_method() {
        let source = "interface Shape {\n fn area(self) -> Float\n fn name(self) -> String\n}\n\
                      type Circle { r: Float }\n\
                      impl Shape for Circle {\n fn area(self) -> Float { return self.r * self.r }\n}";
        assert_eq!(kinds(source), vec![DiagnosticKind::MissingInterfaceMethod]);
    }

    #[test]
    fn test_interface_dispatch_slots() {
        let source = "interface Shape {\n fn area(self) -> Float\n}\n\
                      type Square { side: Float }\n\
                      impl Shape for Square {\n fn area(self) -> Float { return self.side * self.side }\n}\n\
                      fn total(s: Shape) -> Float { return s.area() }\n\
                      let sq = Square { side: 2.0 }\n\
                      print(total(sq), sq.area())";
        let (ast, parse_errors) = parse_source(source);
        assert!(parse_errors.is_empty());
        let mut checker = TypeChecker::new();
        let diagnostics = checker.check(&ast);
        assert!(diagnostics.is_empty(), "{}", diagnostics);
        assert_eq!(checker.vtables().len(), 1);
    }

    #[test]
    fn test_record_literal_fields() {
        let decl = "type Point { x: Int, y: Int }\n";
        assert!(check(&format!("{}let p = Point {{ x: 1, y: 2 }}\nprint(p.x)", decl)).is_empty());
        assert_eq!(
            kinds(&format!("{}let p = Point {{ x: 1 }}", decl)),
            vec![DiagnosticKind::TypeMismatch]
        );
        assert_eq!(
            kinds(&format!("{}let p = Point {{ x: 1, y: 2 }}\nprint(p.z)", decl)),
            vec![DiagnosticKind::UndeclaredName]
        );
    }

    #[test]
    fn test_channel_types() {
        assert!(check(
            "let ch = chan<Int>()\nch <- 1\nlet v: Int? = <-ch\nlet n = v ?? 0\nclose(ch)\nprint(n + 1)"
        )
        .is_empty());
        assert_eq!(
            kinds("let ch = chan<Int>()\nch <- \"s\""),
            vec![DiagnosticKind::TypeMismatch]
        );
    }

    #[test]
    fn test_match_and_try() {
        let source = "fn describe(x: Int | String) -> String {\n\
                      return match x {\n case 0 => \"zero\"\n case n: Int if n > 10 => \"big\"\n case s: String => s\n case _ => \"other\"\n }\n}\n\
                      try { print(1 / 0) } catch e: DivisionByZero { print(e.message) }";
        assert!(check(source).is_empty(), "{}", check(source));
    }

    #[test]
    fn test_component_arguments() {
        let source = "fn Card(title: String, children: [Element] = []) -> Element {\n\
                      return ui { div { h2 { {title} } {children} } }\n}\n\
                      let page = ui { Card(title: \"Hi\") { p { \"body\" } } }\n\
                      let bad = ui { Card(heading: \"x\") }";
        let found = kinds(source);
        assert!(found.contains(&DiagnosticKind::UndeclaredName));
        assert!(found.contains(&DiagnosticKind::ArityMismatch));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(kinds("break"), vec![DiagnosticKind::SyntaxError]);
    }

    #[test]
    fn test_missing_import() {
        assert_eq!(
            kinds("import \"does/not/exist\""),
            vec![DiagnosticKind::ImportError]
        );
    }

    #[test]
    fn test_references_are_recorded() {
        let (ast, _) = parse_source("let x = 1\nprint(x + x)");
        let mut checker = TypeChecker::new();
        checker.check(&ast);
        let x = checker
            .symbols()
            .iter()
            .position(|s| s.name == "x")
            .expect("x declared");
        let uses = checker.references().iter().filter(|(_, id)| *id == x).count();
        assert_eq!(uses, 2);
    }
}
