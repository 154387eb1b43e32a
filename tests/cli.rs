//! Command-line behaviour of the `aether` binary

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn aether() -> Command {
    let mut cmd = Command::cargo_bin("aether").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("AETHER_LOG");
    cmd
}

fn script(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn test_run_prints_and_succeeds() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "hello.ae", "print(\"Hello, World!\")\n");
    aether()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout("Hello, World!\n");
}

#[test]
fn test_bare_file_argument_runs_it() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "sum.ae", "let a = 2\nprint(a * 21)\n");
    aether().arg(&file).assert().success().stdout("42\n");
}

#[test]
fn test_runtime_error_exits_with_failure() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "div.ae", "print(\"start\")\nlet z = 10 / 0\n");
    aether()
        .arg(&file)
        .assert()
        .code(1)
        .stdout("start\n")
        .stderr(predicate::str::contains("DivisionByZero").and(predicate::str::contains("div.ae:2:9")));
}

#[test]
fn test_check_reports_type_errors() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "bad.ae", "print(\"x\")\nlet n: Int = \"text\"\n");
    aether()
        .arg("--check")
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("TypeMismatch").and(predicate::str::contains("1 error(s)")));
}

#[test]
fn test_check_clean_file() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "good.ae", "fn id(x: Int) -> Int { return x }\nprint(id(1))\n");
    aether()
        .arg("--check")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ok:"));
}

#[test]
fn test_tokens_listing() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "tokens.ae", "let x = 1\n");
    aether()
        .arg("--tokens")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"let\"").and(predicate::str::contains("Total tokens: 5")));
}

#[test]
fn test_fmt_prints_and_writes() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "messy.ae", "let   x=1\n");
    aether().arg("fmt").arg(&file).assert().success().stdout("let x = 1\n");

    aether().arg("fmt").arg("--write").arg(&file).assert().success().stdout("");
    assert_eq!(fs::read_to_string(&file).unwrap(), "let x = 1\n");
}

#[test]
fn test_fmt_rejects_syntax_errors() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "broken.ae", "let = 3\n");
    aether()
        .arg("fmt")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SyntaxError"));
}

#[test]
fn test_fmt_keeps_files_with_comments() {
    let dir = TempDir::new().unwrap();
    let source = "// keep me\nlet   x=1\n";
    let file = script(&dir, "commented.ae", source);
    aether()
        .arg("fmt")
        .arg("--write")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("commented.ae:1:1: cannot format a document with comments"));
    assert_eq!(fs::read_to_string(&file).unwrap(), source);
}

#[test]
fn test_deadlock_points_at_the_receive() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "stuck.ae", "let ch = chan<Int>()\nlet v = <-ch\n");
    aether()
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Deadlock").and(predicate::str::contains("stuck.ae:2:9")));
}

#[test]
fn test_deep_recursion_does_not_crash() {
    let dir = TempDir::new().unwrap();
    let file = script(
        &dir,
        "deep.ae",
        "fn sum(n: Int) -> Int { if n == 0 { return 0 }\n return n + sum(n - 1) }\nprint(sum(1000))\n",
    );
    aether().arg(&file).assert().success().stdout("500500\n");
}

#[test]
fn test_output_writes_artifact() {
    let dir = TempDir::new().unwrap();
    let file = script(
        &dir,
        "page.ae",
        "let page = ui { p(class: \"note\") { \"hi\" } }\nlet sheet = style { p.note { color: red } }\n",
    );
    let target = dir.path().join("page.html");
    aether()
        .arg("run")
        .arg(&file)
        .arg("--output")
        .arg(&target)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "<p class=\"note\">hi</p>\n<style>\np.note {\n  color: red;\n}\n</style>\n"
    );
}

#[test]
fn test_missing_file_is_a_usage_error() {
    aether()
        .arg("run")
        .arg("does-not-exist.ae")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_repl_session() {
    aether()
        .arg("--repl")
        .write_stdin("let x = 20\nx * 2 + 2\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}
