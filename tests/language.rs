//! End-to-end programs through the library pipeline

use std::fs;

use aether_lang::semantic::{analyze, format_document, Position};
use aether_lang::{run, DiagnosticKind, OutputSink, RunOptions, RunResult, Session, Value};
use pretty_assertions::assert_eq;

fn execute(source: &str) -> (String, RunResult) {
    let options = RunOptions {
        filename: None,
        output: OutputSink::buffer(),
    };
    let result = run(source, &options);
    (options.output.contents(), result)
}

fn output_of(source: &str) -> String {
    let (out, result) = execute(source);
    assert!(result.is_success(), "{}", result.diagnostics);
    out
}

#[test]
fn test_hello_world() {
    assert_eq!(output_of("print(\"Hello, World!\")"), "Hello, World!\n");
}

#[test]
fn test_functions_defaults_and_templates() {
    let source = r#"
fn add(a: Int, b: Int) -> Int { return a + b }
fn greet(name: String = "World") -> String { return f"Hello, {name}!" }
let total = add(5, 3)
print(greet(), greet("Argus"), total)
"#;
    assert_eq!(output_of(source), "Hello, World! Hello, Argus! 8\n");
}

#[test]
fn test_loops_and_control_flow() {
    let source = r#"
let sum = 0
for i in range(10) {
    if i % 2 == 0 { continue }
    if i > 7 { break }
    sum = sum + i
}
let n = 3
while n > 0 { n = n - 1 }
print(sum, n)
"#;
    assert_eq!(output_of(source), "16 0\n");
}

#[test]
fn test_arrays_and_builtins() {
    let source = r#"
let xs = [3, 1, 2]
let ys = push(xs, 4)
print(len(xs), len(ys), ys[3], len("héllo"))
print(str(1.5) + "!", float(2))
"#;
    assert_eq!(output_of(source), "3 4 4 5\n1.5! 2.0\n");
}

#[test]
fn test_records_and_interfaces() {
    let source = r#"
interface Shape {
    fn area(self) -> Float
    fn name(self) -> String
}
type Circle { r: Float }
type Rect { w: Float, h: Float }
impl Shape for Circle {
    fn area(self) -> Float { return 3.0 * self.r * self.r }
    fn name(self) -> String { return "circle" }
}
impl Shape for Rect {
    fn area(self) -> Float { return self.w * self.h }
    fn name(self) -> String { return "rect" }
}
fn describe(s: Shape) -> String { return f"{s.name()}: {s.area()}" }
print(describe(Circle { r: 1.0 }))
print(describe(Rect { w: 2.0, h: 3.0 }))
"#;
    assert_eq!(output_of(source), "circle: 3.0\nrect: 6.0\n");
}

#[test]
fn test_try_catch_and_error_fields() {
    let source = r#"
fn risky(xs: [Int], i: Int) -> Int { return xs[i] }
try {
    print(risky([1, 2], 5))
} catch e: DivisionByZero {
    print("unreachable")
} catch e {
    print(e.kind, e.line)
}
"#;
    assert_eq!(output_of(source), "IndexOutOfBounds 2\n");
}

#[test]
fn test_panic_is_catchable() {
    let source = "try { panic(\"boom\") } catch e: Panic { print(e.message) }";
    assert_eq!(output_of(source), "boom\n");
}

#[test]
fn test_uncaught_runtime_error_is_a_diagnostic() {
    let (out, result) = execute("print(\"start\")\nlet z = 10 / 0\nprint(\"never\")");
    assert_eq!(out, "start\n");
    let messages: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
    assert_eq!(messages, vec!["2:9: RuntimeError: DivisionByZero: division by zero".to_string()]);
}

#[test]
fn test_deep_recursion() {
    let source = "fn sum(n: Int) -> Int { if n == 0 { return 0 }\n return n + sum(n - 1) }\nprint(sum(1000))";
    assert_eq!(output_of(source), "500500\n");
}

#[test]
fn test_runaway_recursion_is_a_diagnostic() {
    let (out, result) = execute("fn forever(n: Int) -> Int { return forever(n + 1) }\nprint(forever(0))\nprint(\"never\")");
    assert_eq!(out, "");
    assert_eq!(result.diagnostics.count(DiagnosticKind::RuntimeError), 1);
    let (message, line) = result
        .diagnostics
        .iter()
        .next()
        .map(|d| (d.message.clone(), d.span.line))
        .unwrap_or_default();
    assert!(message.starts_with("StackOverflow: call depth exceeded"), "{}", message);
    assert_eq!(line, 1);
}

#[test]
fn test_runaway_recursion_is_catchable() {
    let source = r#"
fn forever(n: Int) -> Int { return forever(n + 1) }
fn sum(n: Int) -> Int { if n == 0 { return 0 }
 return n + sum(n - 1) }
try { print(forever(0)) } catch e: StackOverflow { print("caught", e.kind) }
print(sum(1500))
"#;
    assert_eq!(output_of(source), "caught StackOverflow\n1125750\n");
}

#[test]
fn test_syntax_errors_are_all_reported() {
    let (out, result) = execute("let a = \nlet b = 2\nlet c = )\nprint(b)");
    assert_eq!(out, "");
    assert_eq!(result.diagnostics.count(DiagnosticKind::SyntaxError), 2);
}

#[test]
fn test_type_errors_block_evaluation() {
    let (out, result) = execute("print(\"x\")\nlet n: Int = \"text\"\nprint(undefined)");
    assert_eq!(out, "");
    assert_eq!(result.diagnostics.count(DiagnosticKind::TypeMismatch), 1);
    assert_eq!(result.diagnostics.count(DiagnosticKind::UndeclaredName), 1);
}

#[test]
fn test_workers_and_channels() {
    let source = r#"
fn worker(id: Int, jobs: Chan<Int>, results: Chan<Int>) {
    for job in jobs { results <- job * 10 + id }
}
let jobs = chan<Int>()
let results = chan<Int>(4)
go worker(1, jobs, results)
go worker(2, jobs, results)
for j in range(4) { jobs <- j }
close(jobs)
let total = 0
for k in range(4) { total = total + ((<-results) ?? 0) / 10 }
print(total)
"#;
    assert_eq!(output_of(source), "6\n");
}

#[test]
fn test_deadlock_is_reported() {
    let (_, result) = execute("let ch = chan<Int>()\nlet v = <-ch");
    assert_eq!(result.diagnostics.count(DiagnosticKind::Deadlock), 1);
    let first = result.diagnostics.iter().next();
    let message = first.map(|d| d.message.clone()).unwrap_or_default();
    assert!(message.contains("main (waiting to receive)"), "{}", message);
    let position = first.map(|d| (d.span.line, d.span.column));
    assert_eq!(position, Some((2, 9)));
}

#[test]
fn test_failing_task_does_not_stop_main() {
    let source = r#"
fn bad() { let xs = [1]
 print(xs[2]) }
go bad()
let ch = chan<Int>(1)
ch <- 1
print(<-ch ?? 0)
"#;
    let (out, result) = execute(source);
    assert_eq!(out, "1\n");
    assert_eq!(result.diagnostics.count(DiagnosticKind::RuntimeError), 1);
    let message = result.diagnostics.iter().next().map(|d| d.message.clone()).unwrap_or_default();
    assert!(message.contains("in task 'bad'"), "{}", message);
}

#[test]
fn test_component_artifact() {
    let source = r#"
fn Card(title: String, children: [Element] = []) -> Element {
    return ui { div(class: "card") { h2 { {title} } {children} } }
}
let page = ui { Card(title: "Hi") { p { "body" } } }
let w = 120
let sheet = style {
    .card, div > p.note { width: {w}px; color: #333 }
}
"#;
    let (_, result) = execute(source);
    assert!(result.is_success(), "{}", result.diagnostics);
    assert_eq!(
        result.artifact.unwrap_or_default(),
        "<div class=\"card\">\n  <h2>Hi</h2>\n  <p>body</p>\n</div>\n\
         <style>\n.card, div > p.note {\n  width: 120px;\n  color: #333;\n}\n</style>\n"
    );
}

#[test]
fn test_imports_resolve_relative_to_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("math.ae"), "fn square(n: Int) -> Int { return n * n }\n").unwrap();
    let main = dir.path().join("main.ae");
    fs::write(&main, "import \"math\"\nprint(square(7))\n").unwrap();

    let options = RunOptions {
        filename: Some(main.display().to_string()),
        output: OutputSink::buffer(),
    };
    let source = fs::read_to_string(&main).unwrap();
    let result = run(&source, &options);
    assert!(result.is_success(), "{}", result.diagnostics);
    assert_eq!(options.output.contents(), "49\n");
}

#[test]
fn test_session_units_share_state() {
    let mut session = Session::new(OutputSink::buffer());
    assert_eq!(session.eval("type P { x: Int }"), Ok(None));
    assert_eq!(session.eval("let p = P { x: 2 }"), Ok(None));
    assert_eq!(session.eval("p.x * 21"), Ok(Some(Value::Int(42))));
}

#[test]
fn test_language_services_on_document() {
    let source = "let count = 1\nprint(count)\n";
    let analysis = analyze(source);
    assert!(analysis.diagnostics.is_empty());
    let hover = analysis.hover(Position::new(2, 8)).map(|h| h.contents);
    assert_eq!(hover.as_deref(), Some("let count: Int"));
    assert_eq!(analysis.references(Position::new(1, 5), true).len(), 2);

    let formatted = format_document("let   count=1").unwrap_or_default();
    assert_eq!(formatted.trim_end(), "let count = 1");
}
