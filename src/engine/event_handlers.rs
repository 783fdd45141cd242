// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::engine::core::{BindingPhase, BindingSlot};
use crate::engine::{BindingOutcome, CoreCommand, CoreStep};
use crate::reload::ReloadMessage;
use crate::types::ReloadStyle;

type Slots = BTreeMap<String, BindingSlot>;

/// Reload message for a finished binding.
///
/// Injection needs at least one stylesheet to swap; otherwise the page is
/// reloaded.
pub fn reload_message(style: ReloadStyle, written: &[String]) -> ReloadMessage {
    match style {
        ReloadStyle::Full => ReloadMessage::Reload,
        ReloadStyle::Inject => {
            let paths: Vec<String> = written
                .iter()
                .filter(|p| p.ends_with(".css"))
                .cloned()
                .collect();
            if paths.is_empty() {
                ReloadMessage::Reload
            } else {
                ReloadMessage::Inject { paths }
            }
        }
    }
}

/// Begin a cycle for an idle binding.
fn begin(slot: &mut BindingSlot, binding: String) -> CoreCommand {
    slot.pending = false;
    if slot.units.is_empty() {
        slot.phase = BindingPhase::Reloading;
        CoreCommand::Reload {
            message: reload_message(slot.reload, &[]),
            binding,
        }
    } else {
        slot.phase = BindingPhase::Dispatching;
        CoreCommand::Dispatch {
            units: slot.units.clone(),
            binding,
        }
    }
}

/// Return a binding to idle, starting the coalesced rerun if one is owed.
fn settle(slot: &mut BindingSlot, binding: String) -> CoreStep {
    slot.phase = BindingPhase::Idle;
    if slot.pending {
        debug!(binding = %binding, "running coalesced change");
        CoreStep::running(vec![begin(slot, binding)])
    } else {
        CoreStep::running(Vec::new())
    }
}

/// Handle a change on a watched path.
///
/// - Idle: dispatch the binding's units (or go straight to reloading when
///   it has none).
/// - Busy: remember that another run is owed; further changes fold into it.
pub(crate) fn handle_path_change(slots: &mut Slots, binding: String, path: &str) -> CoreStep {
    let Some(slot) = slots.get_mut(&binding) else {
        debug!(binding = %binding, "change for unknown binding; ignoring");
        return CoreStep::running(Vec::new());
    };

    match slot.phase {
        BindingPhase::Idle => {
            info!(binding = %binding, path = %path, "change detected");
            CoreStep::running(vec![begin(slot, binding)])
        }
        BindingPhase::Dispatching | BindingPhase::Reloading => {
            debug!(binding = %binding, path = %path, "binding busy; coalescing change");
            slot.pending = true;
            CoreStep::running(Vec::new())
        }
    }
}

/// Handle the end of a binding's units.
///
/// Both outcomes move on to reloading. A failure has already been reported,
/// so the page is reloaded in full rather than injected.
pub(crate) fn handle_completion(slots: &mut Slots, binding: String, outcome: BindingOutcome) -> CoreStep {
    let Some(slot) = slots.get_mut(&binding) else {
        return CoreStep::running(Vec::new());
    };
    if slot.phase != BindingPhase::Dispatching {
        debug!(binding = %binding, phase = ?slot.phase, "unexpected completion; ignoring");
        return CoreStep::running(Vec::new());
    }

    let message = match outcome {
        BindingOutcome::Succeeded { written } => reload_message(slot.reload, &written),
        BindingOutcome::Failed => ReloadMessage::Reload,
    };
    slot.phase = BindingPhase::Reloading;
    CoreStep::running(vec![CoreCommand::Reload { message, binding }])
}

/// Handle the acknowledgement that a reload went out.
pub(crate) fn handle_reload_sent(slots: &mut Slots, binding: String) -> CoreStep {
    match slots.get_mut(&binding) {
        Some(slot) if slot.phase == BindingPhase::Reloading => settle(slot, binding),
        _ => CoreStep::running(Vec::new()),
    }
}
