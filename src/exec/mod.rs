// src/exec/mod.rs

//! Execution layer: turns scheduled work into unit runs.
//!
//! - [`backend`] provides the `BindingExecutor` trait used by the watch loop
//!   and the production `UnitExecutor`.
//! - [`task_runner`] implements the task graph's `StepExecutor`, mapping
//!   every step name onto the unit or helper that performs it.

pub mod backend;
pub mod task_runner;

pub use backend::{run_units, BindingExecutor, UnitExecutor};
pub use task_runner::TaskRunner;
