//! Runtime module
//!
//! This module handles interpretation and execution of Aether programs.

pub mod environment;
pub mod error;
pub mod value;
pub mod interpreter;

pub use environment::{Env, Environment};
pub use error::{ErrorKind, RuntimeError};
pub use value::{Closure, ErrorValue, RecordValue, Value};
pub use interpreter::{Interpreter, OutputSink, MAX_CALL_DEPTH};
