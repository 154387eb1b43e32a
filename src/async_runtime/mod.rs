//! Async runtime module
//!
//! Cooperative tasks spawned by `go` and the channels they talk over.

pub mod channel;
pub mod executor;

pub use channel::Channel;
pub use executor::{RunReport, Scheduler, TaskFuture, TaskId, TaskState};
