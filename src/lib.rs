//! # Aether Programming Language
//!
//! A statically-typed scripting language with:
//! - records, interfaces and `match` with typed patterns
//! - `ui { }` markup blocks and `style { }` blocks compiled to an artifact
//! - goroutine-style tasks (`go`) talking over typed channels
//!
//! ## Architecture
//!
//! The language implementation is organized into several modules:
//! - `lexer`: Tokenization of source code
//! - `parser`: Parsing tokens into an Abstract Syntax Tree (AST), with recovery
//! - `types`: Name resolution and type checking
//! - `runtime`: Tree-walking interpreter
//! - `async_runtime`: Cooperative task scheduler and channels
//! - `ui`: UI and style compilers and the markup renderer
//! - `semantic`: Language services (hover, completions, formatting)
//! - `error`: Spans and diagnostics

pub mod error;
pub mod lexer;
pub mod parser;
pub mod types;
pub mod runtime;
pub mod async_runtime;
pub mod ui;
pub mod semantic;

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, warn};

// Re-export commonly used types
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, Span};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{Ast, Parser};
pub use runtime::{Interpreter, OutputSink, Value};

/// Version of the Aether language
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extension of Aether source files
pub const SOURCE_EXTENSION: &str = "ae";

/// Stack reserved for the thread programs are checked and evaluated on.
/// Every source-level call nests several future polls, so this is sized
/// for [`runtime::MAX_CALL_DEPTH`] calls in an unoptimized build.
pub const EVAL_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Options for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Used in diagnostics and to resolve `import` paths
    pub filename: Option<String>,
    pub output: OutputSink,
}

/// Result of [`run`]
#[derive(Debug, Default)]
pub struct RunResult {
    /// Diagnostics of the first failing phase; empty on success
    pub diagnostics: Diagnostics,
    /// Rendered markup and stylesheet, if the program compiled any
    pub artifact: Option<String>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Token stream of `source`, ending with `Eof`
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

/// Run `work` on a thread with an [`EVAL_STACK_SIZE`] stack and wait for
/// it. Runs on the calling thread if no thread can be spawned.
pub fn with_eval_stack<T, F>(work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    let slot = Mutex::new(Some(work));
    let finished = thread::scope(|scope| {
        let spawned = thread::Builder::new()
            .name("aether-eval".to_string())
            .stack_size(EVAL_STACK_SIZE)
            .spawn_scoped(scope, || {
                let work = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                work.map(|work| work())
            });
        match spawned {
            Ok(handle) => match handle.join() {
                Ok(result) => result,
                Err(payload) => std::panic::resume_unwind(payload),
            },
            Err(err) => {
                warn!(error = %err, "cannot spawn evaluation thread, using the current one");
                None
            }
        }
    });
    if let Some(result) = finished {
        return result;
    }
    match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some(work) => work(),
        None => unreachable!("evaluation thread took the work without finishing it"),
    }
}

/// Lex, parse and type check without evaluating
pub fn check(source: &str, filename: Option<&str>) -> Diagnostics {
    with_eval_stack(|| {
        let (_, mut diagnostics) = front_end(source, filename);
        diagnostics.set_file(filename);
        diagnostics
    })
}

/// Compile and run a program on its own evaluation thread
///
/// Each phase runs only when every earlier phase produced no diagnostics.
pub fn run(source: &str, options: &RunOptions) -> RunResult {
    with_eval_stack(|| run_here(source, options))
}

fn run_here(source: &str, options: &RunOptions) -> RunResult {
    let filename = options.filename.as_deref();
    let (checked, mut diagnostics) = front_end(source, filename);
    let Some((ast, mut checker)) = checked else {
        diagnostics.set_file(filename);
        return RunResult {
            diagnostics,
            artifact: None,
        };
    };

    let interpreter = Interpreter::new(options.output.clone());
    interpreter.add_vtables(checker.vtables());
    let modules = checker.take_modules();
    debug!(modules = modules.len(), "evaluating");
    let mut diagnostics = interpreter.run(&modules, &ast);
    diagnostics.set_file(filename);

    RunResult {
        diagnostics,
        artifact: interpreter.artifact(),
    }
}

/// Parse and check; the tree and checker are returned only when both
/// phases were clean
fn front_end(source: &str, filename: Option<&str>) -> (Option<(Ast, types::TypeChecker)>, Diagnostics) {
    let (ast, diagnostics) = parser::parse_source(source);
    debug!(statements = ast.statements.len(), errors = diagnostics.len(), "parsed");
    if !diagnostics.is_empty() {
        return (None, diagnostics);
    }

    let mut checker = types::TypeChecker::new();
    if let Some(dir) = filename.and_then(|f| Path::new(f).parent()) {
        checker = checker.with_base_dir(dir);
    }
    let diagnostics = checker.check(&ast);
    if !diagnostics.is_empty() {
        return (None, diagnostics);
    }
    (Some((ast, checker)), diagnostics)
}

/// Interactive session: one checker scope and one runtime environment
/// shared by every unit fed to it. Units run on the calling thread; wrap
/// the session's owner in [`with_eval_stack`] for deep recursion.
pub struct Session {
    checker: types::TypeChecker,
    interpreter: Interpreter,
}

impl Session {
    pub fn new(output: OutputSink) -> Self {
        let mut checker = types::TypeChecker::new();
        checker.set_repl_mode(true);
        let interpreter = Interpreter::new(output);
        interpreter.set_repl_mode(true);
        Self { checker, interpreter }
    }

    /// Run one unit. Returns the value of its last top-level expression
    /// statement, if any.
    pub fn eval(&mut self, source: &str) -> Result<Option<Value>, Diagnostics> {
        let (ast, diagnostics) = parser::parse_source(source);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        let diagnostics = self.checker.check(&ast);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        self.interpreter.add_vtables(self.checker.vtables());
        let modules = self.checker.take_modules();
        let diagnostics = self.interpreter.run(&modules, &ast);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        Ok(self.interpreter.take_last_value())
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffered() -> RunOptions {
        RunOptions {
            filename: None,
            output: OutputSink::buffer(),
        }
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_run_prints() {
        let options = buffered();
        let result = run("print(\"Hello, World!\")", &options);
        assert!(result.is_success());
        assert_eq!(options.output.contents(), "Hello, World!\n");
        assert!(result.artifact.is_none());
    }

    #[test]
    fn test_type_errors_stop_before_evaluation() {
        let options = buffered();
        let result = run("print(\"side effect\")\nlet x: Int = \"hello\"", &options);
        assert_eq!(result.diagnostics.count(DiagnosticKind::TypeMismatch), 1);
        assert_eq!(options.output.contents(), "");
    }

    #[test]
    fn test_check_attaches_filename() {
        let diagnostics = check("let a = b", Some("main.ae"));
        let first = diagnostics.iter().next().map(|d| d.to_string()).unwrap_or_default();
        assert!(first.starts_with("main.ae:1:9"), "{}", first);
    }

    #[test]
    fn test_session_keeps_state() {
        let mut session = Session::new(OutputSink::buffer());
        assert_eq!(session.eval("let x = 40"), Ok(None));
        assert_eq!(session.eval("fn inc(n: Int) -> Int { return n + 1 }"), Ok(None));
        assert_eq!(session.eval("inc(x + 1)"), Ok(Some(Value::Int(42))));
        assert!(session.eval("undefined_name").is_err());
        assert_eq!(session.eval("x"), Ok(Some(Value::Int(40))));
    }
}
