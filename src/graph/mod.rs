// src/graph/mod.rs

//! Task graph: which steps an invocation runs, and in what order.
//!
//! - [`invocation`] defines the named entry points and validates them with
//!   `petgraph`.
//! - [`dag`] holds the adjacency view used for scheduling.
//! - [`scheduler`] is the pure per-invocation state machine.
//! - [`runner`] drives the scheduler, running ready steps concurrently.

pub mod dag;
pub mod invocation;
pub mod runner;
pub mod scheduler;

pub use dag::DagGraph;
pub use invocation::{resolve, FailurePolicy, Invocation, StepSpec};
pub use runner::{run_invocation, StepExecutor};
pub use scheduler::{InvocationReport, Scheduler, StepOutcome, StepState};
