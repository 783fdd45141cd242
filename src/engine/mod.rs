// src/engine/mod.rs

//! The watch loop.
//!
//! Each watch binding moves through `Idle → Dispatching → Reloading → Idle`.
//! Events for a binding that is busy set a single pending flag; when the
//! binding returns to idle it dispatches once more, so runs for one binding
//! never overlap and the last edit always wins. Bindings are independent of
//! each other.
//!
//! The pure state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::reload::ReloadMessage;
use crate::types::TaskName;

/// How a dispatched binding ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    /// Every unit succeeded. `written` lists output files relative to the
    /// project root.
    Succeeded { written: Vec<String> },
    /// A unit failed; it has already been reported.
    Failed,
}

/// Events flowing into the runtime from the watcher and the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A watched file matching `binding` changed.
    PathChanged { binding: String, path: String },
    /// The units of `binding` finished.
    BindingCompleted {
        binding: String,
        outcome: BindingOutcome,
    },
    /// The reload for `binding` has been broadcast.
    ReloadSent { binding: String },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Command produced by the pure core, to be executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Run these units in order for `binding`.
    Dispatch { binding: String, units: Vec<TaskName> },
    /// Broadcast `message` to connected browsers on behalf of `binding`.
    Reload {
        binding: String,
        message: ReloadMessage,
    },
}

/// Decision returned by the core after handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use self::core::{BindingPhase, CoreRuntime};
pub use runtime::Runtime;
