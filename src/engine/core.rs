// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! Consumes [`RuntimeEvent`]s and produces the commands the IO shell should
//! run. No channels, no Tokio, no filesystem: everything here is
//! deterministic and unit tested directly.

use std::collections::BTreeMap;

use crate::engine::event_handlers::{handle_completion, handle_path_change, handle_reload_sent};
use crate::engine::{CoreStep, RuntimeEvent};
use crate::types::{ReloadStyle, TaskName};
use crate::watch::WatchBinding;

/// Where a binding is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPhase {
    Idle,
    /// Units are running.
    Dispatching,
    /// Waiting for the reload broadcast to go out.
    Reloading,
}

/// Static description plus per-cycle state of one binding.
#[derive(Debug, Clone)]
pub(crate) struct BindingSlot {
    pub units: Vec<TaskName>,
    pub reload: ReloadStyle,
    pub phase: BindingPhase,
    /// A change arrived while the binding was busy.
    pub pending: bool,
}

#[derive(Debug, Default)]
pub struct CoreRuntime {
    slots: BTreeMap<String, BindingSlot>,
}

impl CoreRuntime {
    pub fn new(bindings: &[WatchBinding]) -> Self {
        let slots = bindings
            .iter()
            .map(|b| {
                (
                    b.name().to_string(),
                    BindingSlot {
                        units: b.units().to_vec(),
                        reload: b.reload(),
                        phase: BindingPhase::Idle,
                        pending: false,
                    },
                )
            })
            .collect();
        Self { slots }
    }

    pub fn phase_of(&self, binding: &str) -> Option<BindingPhase> {
        self.slots.get(binding).map(|s| s.phase)
    }

    pub fn is_pending(&self, binding: &str) -> bool {
        self.slots.get(binding).is_some_and(|s| s.pending)
    }

    /// Every binding is idle with nothing pending.
    pub fn is_idle(&self) -> bool {
        self.slots
            .values()
            .all(|s| s.phase == BindingPhase::Idle && !s.pending)
    }

    /// Handle a single event, updating state and returning commands.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::PathChanged { binding, path } => {
                handle_path_change(&mut self.slots, binding, &path)
            }
            RuntimeEvent::BindingCompleted { binding, outcome } => {
                handle_completion(&mut self.slots, binding, outcome)
            }
            RuntimeEvent::ReloadSent { binding } => handle_reload_sent(&mut self.slots, binding),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
