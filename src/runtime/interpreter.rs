//! Interpreter implementation
//!
//! A tree-walking evaluator over the checked tree. Evaluation is async so
//! that a channel operation anywhere in a call stack can suspend the whole
//! task; every recursive step returns a boxed future. The interpreter is a
//! cheap handle over shared state, so spawned tasks own a clone of it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::async_runtime::{Channel, Scheduler, TaskFuture};
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, Span};
use crate::parser::ast::*;
use crate::types::{Builtin, LoadedModule, Type, VTables};
use crate::ui::{
    render_artifact, BoundDeclaration, BoundNode, BoundPart, BoundStyleRule, StyleCompiler,
    StyleRule, UiChild, UiCompiler, UiElement,
};
use super::environment::{Env, Environment};
use super::error::{ErrorKind, RuntimeError};
use super::value::{Closure, ErrorValue, RecordValue, Value};

/// Closure calls a single task may nest before `StackOverflow` is raised
pub const MAX_CALL_DEPTH: usize = 2000;

type Eval<'s, T> = Pin<Box<dyn Future<Output = Result<T, Flow>> + 's>>;
type CallFuture<'s> = Pin<Box<dyn Future<Output = Result<Value, RuntimeError>> + 's>>;

/// Control flow signals
#[derive(Debug)]
enum Flow {
    Return(Value),
    Break,
    Continue,
    Error(RuntimeError),
}

impl From<RuntimeError> for Flow {
    fn from(err: RuntimeError) -> Self {
        Flow::Error(err)
    }
}

impl Flow {
    /// Outcome at a boundary where only errors can arrive
    fn into_result(self) -> Result<(), RuntimeError> {
        match self {
            Flow::Error(err) => Err(err),
            _ => Ok(()),
        }
    }
}

/// Where `print` writes. A buffer can be shared with the thread the
/// program is evaluated on.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    #[default]
    Stdout,
    Buffer(Arc<Mutex<String>>),
}

impl OutputSink {
    pub fn buffer() -> Self {
        OutputSink::Buffer(Arc::new(Mutex::new(String::new())))
    }

    pub fn write_line(&self, line: &str) {
        match self {
            OutputSink::Stdout => println!("{}", line),
            OutputSink::Buffer(buffer) => {
                let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                buffer.push_str(line);
                buffer.push('\n');
            }
        }
    }

    /// Everything written so far; always empty for stdout
    pub fn contents(&self) -> String {
        match self {
            OutputSink::Stdout => String::new(),
            OutputSink::Buffer(buffer) => buffer.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct RecordLayout {
    name: String,
    fields: Vec<String>,
}

#[derive(Debug, Default)]
struct Artifacts {
    element: Option<Rc<UiElement>>,
    rules: Vec<StyleRule>,
}

struct Shared {
    globals: Env,
    vtables: RefCell<VTables>,
    records: RefCell<HashMap<DeclId, RecordLayout>>,
    scheduler: Scheduler,
    output: OutputSink,
    artifacts: RefCell<Artifacts>,
    last_value: RefCell<Option<Value>>,
    repl: Cell<bool>,
}

/// A call with its callee and arguments already evaluated. `None`
/// arguments take the parameter's default.
struct PreparedCall {
    callee: Value,
    receiver: Option<Value>,
    args: Vec<Option<Value>>,
    span: Span,
}

enum PathStep {
    Index(i64, Span),
    Field(String, Span),
}

/// Iteration over an array snapshot, a string's characters or a channel
enum Cursor {
    Items(Rc<Vec<Value>>, usize),
    Channel(Channel, Span),
}

impl Cursor {
    fn new(value: Value, span: Span) -> Result<Self, RuntimeError> {
        match value {
            Value::Array(items) => Ok(Cursor::Items(items, 0)),
            Value::String(s) => {
                let chars = s.chars().map(|c| Value::string(c.to_string())).collect();
                Ok(Cursor::Items(Rc::new(chars), 0))
            }
            Value::Channel(channel) => Ok(Cursor::Channel(channel, span)),
            other => Err(RuntimeError::invalid_argument(
                format!("cannot iterate over a value of type {}", other.type_name()),
                span,
            )),
        }
    }

    async fn next(&mut self) -> Option<Value> {
        match self {
            Cursor::Items(items, position) => {
                let item = items.get(*position).cloned();
                *position += 1;
                item
            }
            Cursor::Channel(channel, span) => channel.recv(*span).await,
        }
    }
}

/// Interpreter
#[derive(Clone)]
pub struct Interpreter {
    shared: Rc<Shared>,
}

impl Interpreter {
    pub fn new(output: OutputSink) -> Self {
        let prelude = Environment::global();
        for builtin in Builtin::ALL {
            prelude.define(builtin.name(), Value::Builtin(builtin));
        }
        let globals = Environment::child(&prelude);

        Self {
            shared: Rc::new(Shared {
                globals,
                vtables: RefCell::new(HashMap::new()),
                records: RefCell::new(HashMap::new()),
                scheduler: Scheduler::new(),
                output,
                artifacts: RefCell::new(Artifacts::default()),
                last_value: RefCell::new(None),
                repl: Cell::new(false),
            }),
        }
    }

    /// In REPL mode `main` is never called implicitly
    pub fn set_repl_mode(&self, repl: bool) {
        self.shared.repl.set(repl);
    }

    /// Register the interface dispatch tables built by the checker
    pub fn add_vtables(&self, vtables: &VTables) {
        let mut own = self.shared.vtables.borrow_mut();
        for (key, methods) in vtables {
            own.insert(*key, methods.clone());
        }
    }

    pub fn globals(&self) -> &Env {
        &self.shared.globals
    }

    pub fn output(&self) -> &OutputSink {
        &self.shared.output
    }

    /// Value of the last top-level expression statement of the last run
    pub fn take_last_value(&self) -> Option<Value> {
        self.shared.last_value.borrow_mut().take()
    }

    /// Most recently compiled UI element
    pub fn last_element(&self) -> Option<Rc<UiElement>> {
        self.shared.artifacts.borrow().element.clone()
    }

    /// Every style rule compiled so far, in order
    pub fn style_rules(&self) -> Vec<StyleRule> {
        self.shared.artifacts.borrow().rules.clone()
    }

    /// Rendered markup plus stylesheet, if anything was compiled
    pub fn artifact(&self) -> Option<String> {
        let artifacts = self.shared.artifacts.borrow();
        if artifacts.element.is_none() && artifacts.rules.is_empty() {
            return None;
        }
        Some(render_artifact(artifacts.element.as_deref(), &artifacts.rules))
    }

    /// Execute imported modules and then `ast` under the scheduler.
    /// Returns the runtime diagnostics (uncaught errors and deadlock).
    pub fn run(&self, modules: &[LoadedModule], ast: &Ast) -> Diagnostics {
        let interp = self.clone();
        let main: TaskFuture<'_> = Box::pin(async move { interp.exec_program(modules, ast).await });
        let report = self.shared.scheduler.run(main);

        let mut diagnostics = Diagnostics::new();
        for (task, err) in &report.task_errors {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::RuntimeError,
                format!("{} (in task '{}')", err, task),
                err.span,
            ));
        }
        if let Some(err) = &report.main_error {
            diagnostics.push(err.to_diagnostic());
        }
        if let Some(deadlock) = report.deadlock {
            diagnostics.report(DiagnosticKind::Deadlock, deadlock.message, deadlock.span);
        }
        debug!(errors = diagnostics.len(), "run finished");
        diagnostics
    }

    async fn exec_program(&self, modules: &[LoadedModule], ast: &Ast) -> Result<(), RuntimeError> {
        let globals = Rc::clone(&self.shared.globals);
        for module in modules {
            debug!(path = %module.path.display(), "executing module");
            if let Err(flow) = self.exec_block(&module.ast.statements, &globals).await {
                flow.into_result()?;
            }
        }

        self.hoist(&ast.statements, &globals);
        for stmt in &ast.statements {
            match stmt {
                Stmt::Expression { expr, .. } => match self.eval_expr(expr, &globals).await {
                    Ok(value) => *self.shared.last_value.borrow_mut() = Some(value),
                    Err(flow) => flow.into_result()?,
                },
                other => {
                    if let Err(flow) = self.exec_stmt(other, &globals).await {
                        flow.into_result()?;
                    }
                }
            }
        }

        if !self.shared.repl.get() && declares_uncalled_main(ast) {
            if let Some(main) = globals.get("main") {
                let call = PreparedCall {
                    callee: main,
                    receiver: None,
                    args: Vec::new(),
                    span: Span::default(),
                };
                self.call_value(call).await?;
            }
        }
        Ok(())
    }

    /// Bind the block's function declarations and record layouts up front
    fn hoist(&self, statements: &[Stmt], env: &Env) {
        for stmt in statements {
            match stmt {
                Stmt::Function(decl) => {
                    let closure = Closure {
                        decl: Rc::clone(decl),
                        env: Rc::clone(env),
                    };
                    env.define(decl.name.clone(), Value::Function(Rc::new(closure)));
                }
                Stmt::TypeDecl { id, name, kind: TypeDeclKind::Record(fields), .. } => {
                    self.shared.records.borrow_mut().insert(
                        *id,
                        RecordLayout {
                            name: name.clone(),
                            fields: fields.iter().map(|f| f.name.clone()).collect(),
                        },
                    );
                }
                _ => {}
            }
        }
    }

    // ===== Statements =====

    fn exec_block<'s>(&'s self, statements: &'s [Stmt], env: &'s Env) -> Eval<'s, ()> {
        Box::pin(async move {
            self.hoist(statements, env);
            for stmt in statements {
                self.exec_stmt(stmt, env).await?;
            }
            Ok(())
        })
    }

    fn exec_stmt<'s>(&'s self, stmt: &'s Stmt, env: &'s Env) -> Eval<'s, ()> {
        Box::pin(async move {
            match stmt {
                Stmt::Let { name, initializer, .. } => {
                    let value = self.eval_expr(initializer, env).await?;
                    env.define(name.clone(), value);
                }

                // Hoisted, or resolved entirely by the checker
                Stmt::Function(_)
                | Stmt::TypeDecl { .. }
                | Stmt::Interface { .. }
                | Stmt::Impl { .. }
                | Stmt::Import { .. } => {}

                Stmt::Expression { expr, .. } => {
                    self.eval_expr(expr, env).await?;
                }

                Stmt::Assign { target, value, .. } => {
                    let value = self.eval_expr(value, env).await?;
                    self.assign(target, value, env).await?;
                }

                Stmt::If { branches, else_branch, .. } => {
                    for (condition, body) in branches {
                        if self.eval_expr(condition, env).await?.is_truthy() {
                            let scope = Environment::child(env);
                            return self.exec_block(body, &scope).await;
                        }
                    }
                    if let Some(body) = else_branch {
                        let scope = Environment::child(env);
                        self.exec_block(body, &scope).await?;
                    }
                }

                Stmt::While { condition, body, .. } => {
                    while self.eval_expr(condition, env).await?.is_truthy() {
                        let scope = Environment::child(env);
                        match self.exec_block(body, &scope).await {
                            Ok(()) | Err(Flow::Continue) => {}
                            Err(Flow::Break) => break,
                            Err(other) => return Err(other),
                        }
                    }
                }

                Stmt::For { variable, iterable, body, .. } => {
                    let value = self.eval_expr(iterable, env).await?;
                    let mut cursor = Cursor::new(value, iterable.span())?;
                    while let Some(item) = cursor.next().await {
                        let scope = Environment::child(env);
                        scope.define(variable.clone(), item);
                        match self.exec_block(body, &scope).await {
                            Ok(()) | Err(Flow::Continue) => {}
                            Err(Flow::Break) => break,
                            Err(other) => return Err(other),
                        }
                    }
                }

                Stmt::Return { value, .. } => {
                    let value = match value {
                        Some(expr) => self.eval_expr(expr, env).await?,
                        None => Value::None,
                    };
                    return Err(Flow::Return(value));
                }

                Stmt::Break { .. } => return Err(Flow::Break),
                Stmt::Continue { .. } => return Err(Flow::Continue),

                Stmt::Block { statements, .. } => {
                    let scope = Environment::child(env);
                    self.exec_block(statements, &scope).await?;
                }

                Stmt::Try { body, catches, .. } => {
                    let scope = Environment::child(env);
                    match self.exec_block(body, &scope).await {
                        Err(Flow::Error(err)) => return self.handle_error(err, catches, env).await,
                        other => return other,
                    }
                }

                Stmt::Go { call, span } => {
                    let call = self.prepare_call(call, env).await?;
                    let name = match &call.callee {
                        Value::Function(closure) => closure.name().to_string(),
                        Value::Builtin(builtin) => builtin.name().to_string(),
                        other => {
                            return Err(RuntimeError::invalid_argument(
                                format!("cannot spawn a value of type {}", other.type_name()),
                                *span,
                            )
                            .into())
                        }
                    };
                    let interp = self.clone();
                    let task: TaskFuture<'static> =
                        Box::pin(async move { interp.call_value(call).await.map(|_| ()) });
                    self.shared.scheduler.spawn(name, task);
                }

                Stmt::Send { channel, value, span } => {
                    let target = self.eval_expr(channel, env).await?;
                    let value = self.eval_expr(value, env).await?;
                    match target {
                        Value::Channel(channel) => channel.send(value, *span).await?,
                        other => {
                            return Err(RuntimeError::invalid_argument(
                                format!("cannot send to a value of type {}", other.type_name()),
                                *span,
                            )
                            .into())
                        }
                    }
                }
            }
            Ok(())
        })
    }

    /// Run the first catch clause whose type matches `err`, or re-raise
    fn handle_error<'s>(
        &'s self,
        err: RuntimeError,
        catches: &'s [CatchClause],
        env: &'s Env,
    ) -> Eval<'s, ()> {
        Box::pin(async move {
            let caught = Value::Error(Rc::new(ErrorValue {
                kind: err.kind,
                message: err.message.clone(),
                line: err.span.line,
                column: err.span.column,
            }));
            for clause in catches {
                let ty = clause.resolved.borrow().clone().unwrap_or(Type::Error(None));
                if self.value_matches(&caught, &ty) {
                    debug!(kind = %err.kind, "caught runtime error");
                    let scope = Environment::child(env);
                    scope.define(clause.name.clone(), caught);
                    return self.exec_block(&clause.body, &scope).await;
                }
            }
            Err(Flow::Error(err))
        })
    }

    fn assign<'s>(&'s self, target: &'s Expr, value: Value, env: &'s Env) -> Eval<'s, ()> {
        Box::pin(async move {
            let mut path: Vec<&Expr> = Vec::new();
            let mut current = target;
            let (root, root_span) = loop {
                match current {
                    Expr::Variable { name, span } => break (name, *span),
                    Expr::Index { object, .. } | Expr::Member { object, .. } => {
                        path.push(current);
                        current = &**object;
                    }
                    other => {
                        return Err(RuntimeError::invalid_argument("invalid assignment target", other.span()).into())
                    }
                }
            };

            let mut steps = Vec::with_capacity(path.len());
            for node in path.into_iter().rev() {
                match node {
                    Expr::Index { index, span, .. } => match self.eval_expr(index, env).await? {
                        Value::Int(i) => steps.push(PathStep::Index(i, *span)),
                        other => {
                            return Err(RuntimeError::invalid_argument(
                                format!("index must be Int, found {}", other.type_name()),
                                index.span(),
                            )
                            .into())
                        }
                    },
                    Expr::Member { field, field_span, .. } => {
                        steps.push(PathStep::Field(field.clone(), *field_span))
                    }
                    _ => {}
                }
            }

            match env.update(root, |slot| set_path(slot, &steps, value)) {
                Some(result) => Ok(result?),
                None => Err(RuntimeError::invalid_argument(format!("undefined name '{}'", root), root_span).into()),
            }
        })
    }

    // ===== Expressions =====

    fn eval_expr<'s>(&'s self, expr: &'s Expr, env: &'s Env) -> Eval<'s, Value> {
        Box::pin(async move {
            match expr {
                Expr::Literal { value, .. } => Ok(literal_value(value)),

                Expr::Template { parts, .. } => {
                    let mut text = String::new();
                    for part in parts {
                        match part {
                            TemplateSegment::Text(s) => text.push_str(s),
                            TemplateSegment::Expr(inner) => {
                                let value = self.eval_expr(inner, env).await?;
                                text.push_str(&value.to_string());
                            }
                        }
                    }
                    Ok(Value::string(text))
                }

                Expr::Variable { name, span } => env.get(name).ok_or_else(|| {
                    Flow::from(RuntimeError::invalid_argument(format!("undefined name '{}'", name), *span))
                }),

                Expr::Binary { left, operator, right, span } => {
                    let left = self.eval_expr(left, env).await?;
                    let right = self.eval_expr(right, env).await?;
                    Ok(binary(*operator, &left, &right, *span)?)
                }

                Expr::Logical { left, operator, right, .. } => {
                    let left = self.eval_expr(left, env).await?;
                    match operator {
                        LogicalOp::And if !left.is_truthy() => Ok(Value::Boolean(false)),
                        LogicalOp::Or if left.is_truthy() => Ok(Value::Boolean(true)),
                        LogicalOp::And | LogicalOp::Or => {
                            Ok(Value::Boolean(self.eval_expr(right, env).await?.is_truthy()))
                        }
                        LogicalOp::Coalesce => match left {
                            Value::None => self.eval_expr(right, env).await,
                            other => Ok(other),
                        },
                    }
                }

                Expr::Unary { operator, operand, span } => {
                    let value = self.eval_expr(operand, env).await?;
                    match (operator, value) {
                        (UnaryOp::Receive, Value::Channel(channel)) => {
                            Ok(channel.recv(*span).await.unwrap_or(Value::None))
                        }
                        (UnaryOp::Receive, other) => Err(RuntimeError::invalid_argument(
                            format!("cannot receive from a value of type {}", other.type_name()),
                            *span,
                        )
                        .into()),
                        (UnaryOp::Not, value) => Ok(Value::Boolean(!value.is_truthy())),
                        (UnaryOp::Negate, Value::Int(n)) => n
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(|| Flow::from(overflow(*span))),
                        (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
                        (UnaryOp::Negate, other) => Err(RuntimeError::invalid_argument(
                            format!("cannot negate a value of type {}", other.type_name()),
                            *span,
                        )
                        .into()),
                    }
                }

                Expr::Call { .. } | Expr::MethodCall { .. } => {
                    let call = self.prepare_call(expr, env).await?;
                    Ok(self.call_value(call).await?)
                }

                Expr::Index { object, index, span } => {
                    let object = self.eval_expr(object, env).await?;
                    let index = self.eval_expr(index, env).await?;
                    Ok(index_value(&object, &index, *span)?)
                }

                Expr::Member { object, field, field_span, .. } => {
                    let object = self.eval_expr(object, env).await?;
                    Ok(member_value(&object, field, *field_span)?)
                }

                Expr::Array { elements, .. } => {
                    let mut items = Vec::with_capacity(elements.len());
                    for element in elements {
                        items.push(self.eval_expr(element, env).await?);
                    }
                    Ok(Value::array(items))
                }

                Expr::Record { name, fields, decl, span, .. } => {
                    let unknown = || RuntimeError::invalid_argument(format!("unknown record type '{}'", name), *span);
                    let id = decl.get().ok_or_else(unknown)?;
                    let mut given: Vec<(&str, Value)> = Vec::with_capacity(fields.len());
                    for (field, value) in fields {
                        given.push((field.as_str(), self.eval_expr(value, env).await?));
                    }
                    let layout = self.shared.records.borrow().get(&id).cloned();
                    let layout = layout.ok_or_else(unknown)?;
                    let fields = layout
                        .fields
                        .iter()
                        .map(|field| {
                            let value = given
                                .iter()
                                .find(|(n, _)| *n == field.as_str())
                                .map(|(_, v)| v.clone())
                                .unwrap_or(Value::None);
                            (field.clone(), value)
                        })
                        .collect();
                    Ok(Value::Record(Rc::new(RecordValue {
                        type_id: id,
                        name: layout.name,
                        fields,
                    })))
                }

                Expr::Lambda { function, .. } => Ok(Value::Function(Rc::new(Closure {
                    decl: Rc::clone(function),
                    env: Rc::clone(env),
                }))),

                Expr::Match { subject, arms, span } => self.eval_match(subject, arms, *span, env).await,

                Expr::Channel { capacity, span, .. } => {
                    let capacity = match capacity {
                        None => None,
                        Some(expr) => match self.eval_expr(expr, env).await? {
                            Value::Int(n) if n >= 1 => Some(n as usize),
                            other => {
                                return Err(RuntimeError::invalid_argument(
                                    format!("channel capacity must be at least 1, found {}", other),
                                    *span,
                                )
                                .into())
                            }
                        },
                    };
                    Ok(Value::Channel(Channel::new(&self.shared.scheduler, capacity)))
                }

                Expr::Ui { children, .. } => {
                    let nodes = self.eval_ui_nodes(children, env).await?;
                    let element = Rc::new(UiCompiler::new().compile(&nodes));
                    self.shared.artifacts.borrow_mut().element = Some(Rc::clone(&element));
                    Ok(Value::Element(element))
                }

                Expr::Style { rules, .. } => {
                    let mut bound = Vec::with_capacity(rules.len());
                    for rule in rules {
                        let mut declarations = Vec::with_capacity(rule.declarations.len());
                        for declaration in &rule.declarations {
                            let mut parts = Vec::with_capacity(declaration.value.len());
                            for segment in &declaration.value {
                                parts.push(match segment {
                                    TemplateSegment::Text(text) => BoundPart::Text(text.clone()),
                                    TemplateSegment::Expr(inner) => {
                                        BoundPart::Value(self.eval_expr(inner, env).await?)
                                    }
                                });
                            }
                            declarations.push(BoundDeclaration {
                                property: declaration.property.clone(),
                                parts,
                            });
                        }
                        bound.push(BoundStyleRule {
                            selectors: rule.selectors.clone(),
                            declarations,
                        });
                    }
                    let sheet = StyleCompiler::new().compile(&bound);
                    self.shared
                        .artifacts
                        .borrow_mut()
                        .rules
                        .extend(sheet.rules.iter().cloned());
                    Ok(Value::Stylesheet(Rc::new(sheet)))
                }
            }
        })
    }

    fn eval_match<'s>(
        &'s self,
        subject: &'s Expr,
        arms: &'s [MatchArm],
        span: Span,
        env: &'s Env,
    ) -> Eval<'s, Value> {
        Box::pin(async move {
            let value = self.eval_expr(subject, env).await?;
            for arm in arms {
                let Some(bindings) = self.match_pattern(&arm.pattern, &value) else {
                    continue;
                };
                let scope = Environment::child(env);
                for (name, bound) in bindings {
                    scope.define(name, bound);
                }
                if let Some(guard) = &arm.guard {
                    if !self.eval_expr(guard, &scope).await?.is_truthy() {
                        continue;
                    }
                }
                return match &arm.body {
                    ArmBody::Expr(body) => self.eval_expr(body, &scope).await,
                    ArmBody::Block(statements) => {
                        self.exec_block(statements, &scope).await?;
                        Ok(Value::None)
                    }
                };
            }
            Err(RuntimeError::new(
                ErrorKind::UnmatchedPattern,
                format!("no match arm matches {}", value),
                span,
            )
            .into())
        })
    }

    /// Bindings introduced when `pattern` matches `value`
    fn match_pattern(&self, pattern: &Pattern, value: &Value) -> Option<Vec<(String, Value)>> {
        match pattern {
            Pattern::Wildcard { .. } => Some(Vec::new()),
            Pattern::Literal { value: literal, .. } => {
                (literal_value(literal) == *value).then(Vec::new)
            }
            Pattern::Binding { name, .. } => Some(vec![(name.clone(), value.clone())]),
            Pattern::Typed { name, resolved, .. } => {
                let ty = resolved.borrow().clone().unwrap_or(Type::Any);
                self.value_matches(value, &ty)
                    .then(|| vec![(name.clone(), value.clone())])
            }
        }
    }

    /// Runtime type test used by typed patterns and `catch` clauses
    fn value_matches(&self, value: &Value, ty: &Type) -> bool {
        match (ty, value) {
            (Type::Any | Type::Invalid | Type::Unresolved, _) => true,
            (Type::Int, Value::Int(_))
            | (Type::Float, Value::Float(_))
            | (Type::String, Value::String(_))
            | (Type::Boolean, Value::Boolean(_))
            | (Type::None | Type::Void, Value::None)
            | (Type::Function { .. }, Value::Function(_) | Value::Builtin(_))
            | (Type::Channel(_), Value::Channel(_))
            | (Type::Element, Value::Element(_))
            | (Type::Stylesheet, Value::Stylesheet(_))
            | (Type::Error(None), Value::Error(_)) => true,
            (Type::Optional(_), Value::None) => true,
            (Type::Optional(inner), v) => self.value_matches(v, inner),
            (Type::Union(members), v) => members.iter().any(|m| self.value_matches(v, m)),
            (Type::Array(element), Value::Array(items)) => {
                items.iter().all(|item| self.value_matches(item, element))
            }
            (Type::Record { id, .. }, Value::Record(record)) => record.type_id == *id,
            (Type::Interface { id, .. }, Value::Record(record)) => {
                self.shared.vtables.borrow().contains_key(&(*id, record.type_id))
            }
            (Type::Error(Some(kind)), Value::Error(err)) => err.kind == *kind,
            _ => false,
        }
    }

    // ===== Calls =====

    fn prepare_call<'s>(&'s self, expr: &'s Expr, env: &'s Env) -> Eval<'s, PreparedCall> {
        Box::pin(async move {
            match expr {
                Expr::Call { callee, arguments, span } => {
                    let callee = self.eval_expr(callee, env).await?;
                    let args = self.eval_arguments(arguments, env).await?;
                    Ok(PreparedCall {
                        callee,
                        receiver: None,
                        args,
                        span: *span,
                    })
                }
                Expr::MethodCall { receiver, method, method_span, arguments, slot, span } => {
                    let receiver = self.eval_expr(receiver, env).await?;
                    let args = self.eval_arguments(arguments, env).await?;
                    match slot.get() {
                        Some(slot) => {
                            let decl = self.resolve_method(&receiver, slot, method, *method_span)?;
                            let closure = Closure {
                                decl,
                                env: Rc::clone(&self.shared.globals),
                            };
                            Ok(PreparedCall {
                                callee: Value::Function(Rc::new(closure)),
                                receiver: Some(receiver),
                                args,
                                span: *span,
                            })
                        }
                        // A function-typed record field
                        None => Ok(PreparedCall {
                            callee: member_value(&receiver, method, *method_span)?,
                            receiver: None,
                            args,
                            span: *span,
                        }),
                    }
                }
                other => Err(RuntimeError::invalid_argument("expected a call", other.span()).into()),
            }
        })
    }

    fn eval_arguments<'s>(&'s self, arguments: &'s [Expr], env: &'s Env) -> Eval<'s, Vec<Option<Value>>> {
        Box::pin(async move {
            let mut values = Vec::with_capacity(arguments.len());
            for argument in arguments {
                values.push(Some(self.eval_expr(argument, env).await?));
            }
            Ok(values)
        })
    }

    fn resolve_method(
        &self,
        receiver: &Value,
        slot: MethodSlot,
        method: &str,
        span: Span,
    ) -> Result<Rc<FunctionDecl>, RuntimeError> {
        let Value::Record(record) = receiver else {
            return Err(RuntimeError::invalid_argument(
                format!("cannot call method '{}' on a value of type {}", method, receiver.type_name()),
                span,
            ));
        };
        self.shared
            .vtables
            .borrow()
            .get(&(slot.interface, record.type_id))
            .and_then(|methods| methods.get(slot.slot))
            .cloned()
            .ok_or_else(|| {
                RuntimeError::invalid_argument(
                    format!("'{}' has no implementation of method '{}'", record.name, method),
                    span,
                )
            })
    }

    fn call_value<'s>(&'s self, call: PreparedCall) -> CallFuture<'s> {
        Box::pin(async move {
            let PreparedCall { callee, receiver, args, span } = call;
            match callee {
                Value::Builtin(builtin) => {
                    let args = args.into_iter().map(|a| a.unwrap_or(Value::None)).collect();
                    self.call_builtin(builtin, args, span)
                }
                Value::Function(closure) => self.call_closure(closure, receiver, args, span).await,
                other => Err(RuntimeError::invalid_argument(
                    format!("cannot call a value of type {}", other.type_name()),
                    span,
                )),
            }
        })
    }

    fn call_closure<'s>(
        &'s self,
        closure: Rc<Closure>,
        receiver: Option<Value>,
        args: Vec<Option<Value>>,
        span: Span,
    ) -> CallFuture<'s> {
        Box::pin(async move {
            let scheduler = &self.shared.scheduler;
            if scheduler.enter_call() > MAX_CALL_DEPTH {
                scheduler.exit_call();
                return Err(RuntimeError::stack_overflow(MAX_CALL_DEPTH, span));
            }
            let result = self.invoke_closure(&closure, receiver, args, span).await;
            scheduler.exit_call();
            result
        })
    }

    async fn invoke_closure(
        &self,
        closure: &Closure,
        receiver: Option<Value>,
        args: Vec<Option<Value>>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let scope = Environment::child(&closure.env);
        if let Some(receiver) = receiver {
            scope.define("self", receiver);
        }

        let mut args = args.into_iter();
        for param in &closure.decl.params {
            let value = match args.next().flatten() {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => match self.eval_expr(default, &scope).await {
                        Ok(value) => value,
                        Err(flow) => {
                            flow.into_result()?;
                            Value::None
                        }
                    },
                    None => {
                        return Err(RuntimeError::invalid_argument(
                            format!("missing argument '{}' in call to {}", param.name, closure.name()),
                            span,
                        ))
                    }
                },
            };
            scope.define(param.name.clone(), value);
        }

        let result = match &closure.decl.body {
            FunctionBody::Block(statements) => {
                self.exec_block(statements, &scope).await.map(|()| Value::None)
            }
            FunctionBody::Expr(body) => self.eval_expr(body, &scope).await,
        };
        match result {
            Ok(value) | Err(Flow::Return(value)) => Ok(value),
            Err(Flow::Error(err)) => Err(err),
            Err(Flow::Break | Flow::Continue) => Ok(Value::None),
        }
    }

    fn call_builtin(&self, builtin: Builtin, args: Vec<Value>, span: Span) -> Result<Value, RuntimeError> {
        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            return Err(RuntimeError::invalid_argument(
                format!("{} got {} argument(s)", builtin.name(), args.len()),
                span,
            ));
        }
        let wrong = |value: &Value| {
            RuntimeError::invalid_argument(
                format!("{} cannot take a value of type {}", builtin.name(), value.type_name()),
                span,
            )
        };

        match builtin {
            Builtin::Print => {
                let line: Vec<String> = args.iter().map(Value::to_string).collect();
                self.shared.output.write_line(&line.join(" "));
                Ok(Value::None)
            }
            Builtin::Len => match &args[0] {
                Value::Array(items) => Ok(Value::Int(items.len() as i64)),
                Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                other => Err(wrong(other)),
            },
            Builtin::Str => Ok(Value::string(args[0].to_string())),
            Builtin::Float => match &args[0] {
                Value::Int(n) => Ok(Value::Float(*n as f64)),
                Value::Float(x) => Ok(Value::Float(*x)),
                other => Err(wrong(other)),
            },
            Builtin::Push => match &args[0] {
                Value::Array(items) => {
                    let mut items = (**items).clone();
                    items.push(args[1].clone());
                    Ok(Value::array(items))
                }
                other => Err(wrong(other)),
            },
            Builtin::Range => {
                let (start, end) = match args.as_slice() {
                    [Value::Int(end)] => (0, *end),
                    [Value::Int(start), Value::Int(end)] => (*start, *end),
                    [other, ..] => return Err(wrong(other)),
                    [] => (0, 0),
                };
                Ok(Value::array((start..end).map(Value::Int).collect()))
            }
            Builtin::Close => match &args[0] {
                Value::Channel(channel) => {
                    channel.close(span)?;
                    Ok(Value::None)
                }
                other => Err(wrong(other)),
            },
            Builtin::Panic => Err(RuntimeError::new(ErrorKind::Panic, args[0].to_string(), span)),
        }
    }

    // ===== UI =====

    fn eval_ui_nodes<'s>(&'s self, nodes: &'s [UiNode], env: &'s Env) -> Eval<'s, Vec<BoundNode>> {
        Box::pin(async move {
            let mut bound = Vec::with_capacity(nodes.len());
            for node in nodes {
                match node {
                    UiNode::Element { tag, attributes, children, span, .. } => {
                        match env.get(tag) {
                            Some(Value::Function(component)) => {
                                let value = self
                                    .call_component(component, attributes, children, *span, env)
                                    .await?;
                                bound.push(BoundNode::Splice(value));
                                continue;
                            }
                            // A bare name bound to a value splices it
                            Some(value)
                                if attributes.is_empty()
                                    && children.is_empty()
                                    && !matches!(value, Value::Builtin(_)) =>
                            {
                                bound.push(BoundNode::Splice(value));
                                continue;
                            }
                            _ => {}
                        }
                        let mut values = Vec::with_capacity(attributes.len());
                        for attribute in attributes {
                            let value = self.eval_expr(&attribute.value, env).await?;
                            values.push((attribute.name.clone(), value));
                        }
                        let children = self.eval_ui_nodes(children, env).await?;
                        bound.push(BoundNode::Element {
                            tag: tag.clone(),
                            attributes: values,
                            children,
                        });
                    }
                    UiNode::Text { value, .. } => {
                        bound.push(BoundNode::Text(self.eval_expr(value, env).await?));
                    }
                    UiNode::Splice { expr, .. } => {
                        bound.push(BoundNode::Splice(self.eval_expr(expr, env).await?));
                    }
                    UiNode::For { variable, iterable, children, .. } => {
                        let value = self.eval_expr(iterable, env).await?;
                        let mut cursor = Cursor::new(value, iterable.span())?;
                        while let Some(item) = cursor.next().await {
                            let scope = Environment::child(env);
                            scope.define(variable.clone(), item);
                            bound.extend(self.eval_ui_nodes(children, &scope).await?);
                        }
                    }
                    UiNode::If { branches, else_children, .. } => {
                        let mut taken = false;
                        for (condition, children) in branches {
                            if self.eval_expr(condition, env).await?.is_truthy() {
                                let scope = Environment::child(env);
                                bound.extend(self.eval_ui_nodes(children, &scope).await?);
                                taken = true;
                                break;
                            }
                        }
                        if let (false, Some(children)) = (taken, else_children) {
                            let scope = Environment::child(env);
                            bound.extend(self.eval_ui_nodes(children, &scope).await?);
                        }
                    }
                }
            }
            Ok(bound)
        })
    }

    /// Call a function used as a tag: attributes bind parameters by name
    /// and nested children arrive as `children: [Element]`
    fn call_component<'s>(
        &'s self,
        component: Rc<Closure>,
        attributes: &'s [UiAttribute],
        children: &'s [UiNode],
        span: Span,
        env: &'s Env,
    ) -> Eval<'s, Value> {
        Box::pin(async move {
            let mut named: Vec<(&str, Value)> = Vec::with_capacity(attributes.len());
            for attribute in attributes {
                named.push((attribute.name.as_str(), self.eval_expr(&attribute.value, env).await?));
            }
            let mut child_list = None;
            if !children.is_empty() {
                let nodes = self.eval_ui_nodes(children, env).await?;
                child_list = Some(element_list(UiCompiler::new().compile(&nodes)));
            }

            let args: Vec<Option<Value>> = component
                .decl
                .params
                .iter()
                .map(|param| match named.iter().find(|(n, _)| *n == param.name) {
                    Some((_, value)) => Some(value.clone()),
                    None if param.name == "children" => child_list.take(),
                    None => None,
                })
                .collect();
            Ok(self.call_closure(component, None, args, span).await?)
        })
    }
}

/// Children of a compiled block as an `[Element]` array; bare text
/// becomes a one-child fragment
fn element_list(compiled: UiElement) -> Value {
    let children = if compiled.is_fragment() {
        compiled.children
    } else {
        vec![UiChild::Element(Rc::new(compiled))]
    };
    let items = children
        .into_iter()
        .map(|child| match child {
            UiChild::Element(element) => Value::Element(element),
            UiChild::Text(text) => Value::Element(Rc::new(UiElement::fragment(vec![UiChild::Text(text)]))),
        })
        .collect();
    Value::array(items)
}

/// Whether the unit declares a top-level `main` without calling it
fn declares_uncalled_main(ast: &Ast) -> bool {
    let declared = ast.statements.iter().any(|stmt| {
        matches!(stmt, Stmt::Function(decl) if decl.name == "main" && decl.required_params() == 0)
    });
    let called = ast.statements.iter().any(|stmt| match stmt {
        Stmt::Expression { expr: Expr::Call { callee, .. }, .. } => {
            matches!(&**callee, Expr::Variable { name, .. } if name == "main")
        }
        _ => false,
    });
    declared && !called
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::String(s) => Value::string(s),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::None => Value::None,
    }
}

fn overflow(span: Span) -> RuntimeError {
    RuntimeError::invalid_argument("integer overflow", span)
}

fn binary(op: BinaryOp, left: &Value, right: &Value, span: Span) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Equal => return Ok(Value::Boolean(left == right)),
        BinaryOp::NotEqual => return Ok(Value::Boolean(left != right)),
        _ => {}
    }

    let mismatch = || {
        RuntimeError::invalid_argument(
            format!(
                "cannot apply '{}' to {} and {}",
                op.as_str(),
                left.type_name(),
                right.type_name()
            ),
            span,
        )
    };

    if op.is_comparison() {
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(mismatch()),
            },
        };
        let Some(ordering) = ordering else {
            return Ok(Value::Boolean(false));
        };
        return Ok(Value::Boolean(match op {
            BinaryOp::Less => ordering.is_lt(),
            BinaryOp::LessEqual => ordering.is_le(),
            BinaryOp::Greater => ordering.is_gt(),
            _ => ordering.is_ge(),
        }));
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
                    return Err(RuntimeError::division_by_zero(span))
                }
                BinaryOp::Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::Int).ok_or_else(|| overflow(span))
        }
        (Value::String(_), _) | (_, Value::String(_)) if op == BinaryOp::Add => {
            Ok(Value::string(format!("{}{}", left, right)))
        }
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Subtract => Ok(Value::Float(a - b)),
                BinaryOp::Multiply => Ok(Value::Float(a * b)),
                BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => {
                    Err(RuntimeError::division_by_zero(span))
                }
                BinaryOp::Divide => Ok(Value::Float(a / b)),
                _ => Ok(Value::Float(a % b)),
            },
            _ => Err(mismatch()),
        },
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn index_value(object: &Value, index: &Value, span: Span) -> Result<Value, RuntimeError> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::invalid_argument(
            format!("index must be Int, found {}", index.type_name()),
            span,
        ));
    };
    match object {
        Value::Array(items) => usize::try_from(*i)
            .ok()
            .and_then(|position| items.get(position))
            .cloned()
            .ok_or_else(|| RuntimeError::index_out_of_bounds(*i, items.len(), span)),
        Value::String(s) => usize::try_from(*i)
            .ok()
            .and_then(|position| s.chars().nth(position))
            .map(|c| Value::string(c.to_string()))
            .ok_or_else(|| RuntimeError::index_out_of_bounds(*i, s.chars().count(), span)),
        other => Err(RuntimeError::invalid_argument(
            format!("cannot index a value of type {}", other.type_name()),
            span,
        )),
    }
}

fn member_value(object: &Value, field: &str, span: Span) -> Result<Value, RuntimeError> {
    let missing = || {
        RuntimeError::invalid_argument(
            format!("{} has no field '{}'", object.type_name(), field),
            span,
        )
    };
    match object {
        Value::Record(record) => record.get(field).cloned().ok_or_else(missing),
        Value::Error(err) => match field {
            "message" => Ok(Value::string(&err.message)),
            "kind" => Ok(Value::string(err.kind.name())),
            "line" => Ok(Value::Int(err.line as i64)),
            "column" => Ok(Value::Int(err.column as i64)),
            _ => Err(missing()),
        },
        _ => Err(missing()),
    }
}

/// Store `value` at `steps` below `slot`, copying shared composites on
/// the way down
fn set_path(slot: &mut Value, steps: &[PathStep], value: Value) -> Result<(), RuntimeError> {
    let Some((step, rest)) = steps.split_first() else {
        *slot = value;
        return Ok(());
    };
    match (step, slot) {
        (PathStep::Index(i, span), Value::Array(items)) => {
            let items = Rc::make_mut(items);
            let len = items.len();
            let target = usize::try_from(*i)
                .ok()
                .and_then(|position| items.get_mut(position))
                .ok_or_else(|| RuntimeError::index_out_of_bounds(*i, len, *span))?;
            set_path(target, rest, value)
        }
        (PathStep::Field(name, span), Value::Record(record)) => {
            let record = Rc::make_mut(record);
            let type_name = record.name.clone();
            let target = record.get_mut(name).ok_or_else(|| {
                RuntimeError::invalid_argument(format!("{} has no field '{}'", type_name, name), *span)
            })?;
            set_path(target, rest, value)
        }
        (PathStep::Index(_, span) | PathStep::Field(_, span), other) => Err(RuntimeError::invalid_argument(
            format!("cannot assign into a value of type {}", other.type_name()),
            *span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeChecker;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (String, Diagnostics) {
        let (ast, diagnostics) = crate::parser::parse_source(source);
        assert!(diagnostics.is_empty(), "parse errors: {:?}", diagnostics);
        let mut checker = TypeChecker::new();
        let diagnostics = checker.check(&ast);
        assert!(diagnostics.is_empty(), "type errors: {:?}", diagnostics);
        let interp = Interpreter::new(OutputSink::buffer());
        interp.add_vtables(checker.vtables());
        let diagnostics = interp.run(&checker.take_modules(), &ast);
        (interp.output().contents(), diagnostics)
    }

    fn output(source: &str) -> String {
        let (out, diagnostics) = run(source);
        assert!(diagnostics.is_empty(), "runtime errors: {:?}", diagnostics);
        out
    }

    #[test]
    fn test_arithmetic_and_calls() {
        let out = output("fn add(a: Int, b: Int) -> Int { return a + b }\nprint(add(5, 3))");
        assert_eq!(out, "8\n");
    }

    #[test]
    fn test_default_parameters() {
        let out = output(
            "fn greet(name: String = \"World\") -> String { return f\"Hello, {name}!\" }\n\
             print(greet())\nprint(greet(\"Argus\"))",
        );
        assert_eq!(out, "Hello, World!\nHello, Argus!\n");
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(output("print(1 + 2.5)\nprint(7 / 2)\nprint(2.0 * 2)"), "3.5\n3\n4.0\n");
    }

    #[test]
    fn test_closures_capture_lexically() {
        let source = "fn counter() -> fn() -> Int {\n\
                      let n = 0\n\
                      return fn() -> Int { n = n + 1\n return n }\n\
                      }\n\
                      let next = counter()\n\
                      next()\n\
                      print(next())";
        assert_eq!(output(source), "2\n");
    }

    #[test]
    fn test_arrays_are_copied_on_write() {
        let source = "let a = [1, 2]\nlet b = a\nb[0] = 9\nprint(a)\nprint(b)";
        assert_eq!(output(source), "[1, 2]\n[9, 2]\n");
    }

    #[test]
    fn test_record_field_assignment() {
        let source = "type Point { x: Int, y: Int }\n\
                      let p = Point { x: 1, y: 2 }\n\
                      p.x = 5\n\
                      print(p)";
        assert_eq!(output(source), "Point { x: 5, y: 2 }\n");
    }

    #[test]
    fn test_match_with_guards_and_types() {
        let source = "fn describe(v: Int | String) -> String {\n\
                      return match v {\n\
                      case 1 => \"one\",\n\
                      case n: Int if n > 10 => \"big\",\n\
                      case s: String => f\"text {s}\",\n\
                      case _ => \"other\"\n\
                      }\n\
                      }\n\
                      print(describe(1))\nprint(describe(20))\nprint(describe(\"x\"))\nprint(describe(3))";
        assert_eq!(output(source), "one\nbig\ntext x\nother\n");
    }

    #[test]
    fn test_unmatched_pattern_is_a_runtime_error() {
        let (_, diagnostics) = run("let x = 5\nlet y = match x { case 1 => 2 }");
        assert_eq!(diagnostics.count(DiagnosticKind::RuntimeError), 1);
        let message = &diagnostics.iter().next().map(|d| d.message.clone()).unwrap_or_default();
        assert!(message.starts_with("UnmatchedPattern"));
    }

    #[test]
    fn test_try_catch_by_kind() {
        let source = "try {\n let z = 1 / 0\n} catch e: IndexOutOfBounds {\n print(\"wrong\")\n\
                      } catch e: DivisionByZero {\n print(e.kind)\n}";
        assert_eq!(output(source), "DivisionByZero\n");
    }

    #[test]
    fn test_uncaught_error_stops_program() {
        let (out, diagnostics) = run("print(\"before\")\nlet a = [1]\nprint(a[3])\nprint(\"after\")");
        assert_eq!(out, "before\n");
        assert_eq!(diagnostics.count(DiagnosticKind::RuntimeError), 1);
    }

    #[test]
    fn test_interface_dispatch() {
        let source = "interface Shape { fn area(self) -> Float }\n\
                      type Square { side: Float }\n\
                      impl Shape for Square { fn area(self) -> Float { return self.side * self.side } }\n\
                      fn total(s: Shape) -> Float { return s.area() }\n\
                      print(total(Square { side: 3.0 }))";
        assert_eq!(output(source), "9.0\n");
    }

    #[test]
    fn test_producer_consumer() {
        let source = "fn produce(ch: Chan<String>) {\n\
                      for i in range(5) { ch <- f\"Message {i}\" }\n\
                      close(ch)\n\
                      }\n\
                      let ch = chan<String>()\n\
                      go produce(ch)\n\
                      let count = 0\n\
                      for msg in ch { print(msg)\n count = count + 1 }\n\
                      print(count)";
        assert_eq!(
            output(source),
            "Message 0\nMessage 1\nMessage 2\nMessage 3\nMessage 4\n5\n"
        );
    }

    #[test]
    fn test_deadlock_reported_once() {
        let source = "let a = chan<Int>()\n\
                      let b = chan<Int>()\n\
                      fn other(a: Chan<Int>, b: Chan<Int>) {\n let v = <-a\n b <- 1\n}\n\
                      go other(a, b)\n\
                      let w = <-b\n\
                      a <- 1";
        let (_, diagnostics) = run(source);
        assert_eq!(diagnostics.count(DiagnosticKind::Deadlock), 1);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_bounded_channel_blocks_sender() {
        let source = "let ch = chan<Int>(1)\n\
                      fn fill(ch: Chan<Int>) { ch <- 1\n print(\"sent 1\")\n ch <- 2\n print(\"sent 2\") }\n\
                      go fill(ch)\n\
                      print(<-ch ?? 0)\n\
                      print(<-ch ?? 0)";
        assert_eq!(output(source), "sent 1\n1\nsent 2\n2\n");
    }

    #[test]
    fn test_ui_and_style_artifact() {
        let source = "let items = [\"a\", \"b\"]\n\
                      let page = ui { ul(class: \"list\") { for i in items { li { {i} } } } }\n\
                      let sheet = style { .list { color: red } }";
        let (ast, _) = crate::parser::parse_source(source);
        let mut checker = TypeChecker::new();
        assert!(checker.check(&ast).is_empty());
        let interp = Interpreter::new(OutputSink::buffer());
        assert!(interp.run(&[], &ast).is_empty());
        let artifact = interp.artifact().unwrap_or_default();
        assert!(artifact.contains("<ul class=\"list\">"));
        assert!(artifact.contains("<li>a</li>"));
        assert!(artifact.contains(".list {\n  color: red;\n}"));
        assert_eq!(interp.style_rules().len(), 1);
    }

    #[test]
    fn test_bare_names_in_markup_splice_values() {
        let source = "let xs = [\"a\", \"b\"]\n\
                      let title = \"T\"\n\
                      let page = ui { div { h1 { title } ul { for i in xs { li { i } } } br } }";
        let (ast, _) = crate::parser::parse_source(source);
        let mut checker = TypeChecker::new();
        assert!(checker.check(&ast).is_empty());
        let interp = Interpreter::new(OutputSink::buffer());
        assert!(interp.run(&[], &ast).is_empty());
        let artifact = interp.artifact().unwrap_or_default();
        assert!(artifact.contains("<h1>T</h1>"), "{}", artifact);
        assert!(artifact.contains("<li>a</li>"), "{}", artifact);
        assert!(artifact.contains("<li>b</li>"), "{}", artifact);
        assert!(artifact.contains("<br>"), "{}", artifact);
        assert!(!artifact.contains("<title>"), "{}", artifact);
    }

    #[test]
    fn test_main_is_called_when_declared() {
        assert_eq!(output("fn main() { print(\"hi\") }"), "hi\n");
        assert_eq!(output("fn main() { print(\"hi\") }\nmain()"), "hi\n");
    }
}
