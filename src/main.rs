//! Aether Language CLI
//!
//! Command-line interface for the Aether programming language.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use aether_lang::error::diagnostic::Report;
use aether_lang::semantic::{format_document, FormatError};
use aether_lang::{
    check, run, tokenize, with_eval_stack, Diagnostics, OutputSink, RunOptions, Session, Value, VERSION,
};

#[derive(Parser)]
#[command(
    name = "aether",
    version,
    about = "Aether programming language",
    long_about = None,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// The file to run (default if no subcommand)
    file: Option<PathBuf>,

    /// Lex, parse and type check a file without running it
    #[arg(long, value_name = "FILE", conflicts_with_all = ["tokens", "repl", "file"])]
    check: Option<PathBuf>,

    /// Print the token stream of a file
    #[arg(long, value_name = "FILE", conflicts_with_all = ["repl", "file"])]
    tokens: Option<PathBuf>,

    /// Start an interactive session
    #[arg(long, conflicts_with = "file")]
    repl: bool,

    /// Write the rendered markup and stylesheet to this path
    #[arg(short, long, value_name = "PATH", global = true)]
    output: Option<PathBuf>,

    /// Debug logging (overridden by AETHER_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a file
    Run {
        /// The file to execute
        file: PathBuf,
    },
    /// Print a file in canonical formatting
    Fmt {
        /// The file to format
        file: PathBuf,
        /// Rewrite the file in place instead of printing it
        #[arg(short, long)]
        write: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("AETHER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let output = cli.output.as_deref();
    match cli.command {
        Some(Commands::Run { file }) => run_file(&file, output),
        Some(Commands::Fmt { file, write }) => format_file(&file, write),
        None => {
            if let Some(file) = cli.check {
                check_file(&file)
            } else if let Some(file) = cli.tokens {
                show_file_tokens(&file)
            } else if let Some(file) = cli.file.filter(|_| !cli.repl) {
                run_file(&file, output)
            } else {
                with_eval_stack(repl)
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

/// Print every diagnostic in source order; excerpts only for entries in
/// `filename` itself
fn report(diagnostics: &Diagnostics, source: &str, filename: Option<&str>) {
    for diagnostic in diagnostics.sorted() {
        let report = if diagnostic.file.as_deref() == filename {
            Report::with_source(diagnostic, source)
        } else {
            Report::new(diagnostic)
        };
        eprint!("{}", report.format());
    }
}

fn status(diagnostics: &Diagnostics) -> ExitCode {
    if diagnostics.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Run a script from a file
fn run_file(path: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let source = read_source(path)?;
    let filename = path.display().to_string();
    debug!(file = %filename, "running");

    let options = RunOptions {
        filename: Some(filename.clone()),
        output: OutputSink::Stdout,
    };
    let result = run(&source, &options);
    report(&result.diagnostics, &source, Some(&filename));

    if let Some(target) = output {
        match &result.artifact {
            Some(artifact) => fs::write(target, artifact)
                .with_context(|| format!("failed to write '{}'", target.display()))?,
            None => warn!(path = %target.display(), "program produced no ui or style output"),
        }
    }
    Ok(status(&result.diagnostics))
}

fn check_file(path: &Path) -> Result<ExitCode> {
    let source = read_source(path)?;
    let filename = path.display().to_string();
    let diagnostics = check(&source, Some(&filename));
    report(&diagnostics, &source, Some(&filename));
    if diagnostics.is_empty() {
        println!("{} {}", "ok:".green().bold(), filename);
    } else {
        eprintln!("{} error(s) in {}", diagnostics.len(), filename);
    }
    Ok(status(&diagnostics))
}

fn format_file(path: &Path, write: bool) -> Result<ExitCode> {
    let source = read_source(path)?;
    let filename = path.display().to_string();
    match format_document(&source) {
        Ok(formatted) if write => {
            fs::write(path, formatted).with_context(|| format!("failed to write '{}'", filename))?;
            Ok(ExitCode::SUCCESS)
        }
        Ok(formatted) => {
            print!("{}", formatted);
            Ok(ExitCode::SUCCESS)
        }
        Err(FormatError::Syntax(mut diagnostics)) => {
            diagnostics.set_file(Some(&filename));
            report(&diagnostics, &source, Some(&filename));
            Ok(ExitCode::FAILURE)
        }
        Err(err @ FormatError::Comment(_)) => {
            eprintln!("{} {}:{}", "error:".red().bold(), filename, err);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Show tokens from lexing a file
fn show_file_tokens(path: &Path) -> Result<ExitCode> {
    let source = read_source(path)?;
    let tokens = tokenize(&source);

    println!("Tokens for '{}':", path.display());
    println!("{}", "=".repeat(60));
    for (i, token) in tokens.iter().enumerate() {
        println!(
            "{:4}: {:>4}:{:<4} {:24} | {:?}",
            i,
            token.span.line,
            token.span.column,
            format!("{:?}", token.token_type),
            token.lexeme
        );
    }
    println!("{}", "=".repeat(60));
    println!("Total tokens: {}", tokens.len());

    let errors = tokens.iter().filter(|t| t.is_error()).count();
    Ok(if errors == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Interactive loop; every unit shares one scope
fn repl() -> Result<ExitCode> {
    println!("Aether v{} - Language Interpreter", VERSION);
    println!("Type 'exit' to quit\n");

    let mut session = Session::new(OutputSink::Stdout);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut line_number = 1;

    loop {
        print!("aether:{} > ", line_number);
        io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next() else { break };
        let input = line.context("failed to read input")?;
        let input = input.trim();
        if input == "exit" || input == "quit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match session.eval(input) {
            Ok(Some(Value::None)) | Ok(None) => {}
            Ok(Some(value)) => println!("{}", value),
            Err(diagnostics) => report(&diagnostics, input, None),
        }
        line_number += 1;
    }

    println!("\nGoodbye!");
    Ok(ExitCode::SUCCESS)
}
