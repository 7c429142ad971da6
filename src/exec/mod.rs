// src/exec/mod.rs

//! Process execution layer for the plan runner.
//!
//! - [`command`] runs one step's shell command with `tokio::process` and
//!   reports its exit status.
//! - [`report`] turns unit states and exit statuses into a run summary.

pub mod command;
pub mod report;

pub use command::run_step;
pub use report::{RunSummary, StepOutcome, StepReport};
