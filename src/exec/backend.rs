// src/exec/backend.rs

//! Pluggable executor for watch bindings.
//!
//! The runtime talks to a `BindingExecutor` instead of running units itself.
//! Production uses [`UnitExecutor`]; tests swap in a fake that records
//! dispatches and emits completions on demand.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{BindingOutcome, RuntimeEvent};
use crate::errors::Result;
use crate::sink::ErrorSink;
use crate::types::TaskName;
use crate::units::sources::relative_str;
use crate::units::{AssetUnits, BuildContext};

/// Trait abstracting how a binding's units are run.
///
/// `dispatch` must return promptly: completion is reported later as a
/// `RuntimeEvent::BindingCompleted` on the runtime channel.
pub trait BindingExecutor: Send {
    fn dispatch(
        &mut self,
        binding: String,
        units: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Runs asset units on the tokio runtime.
///
/// Units of one binding run sequentially in declared order; the first
/// failure ends the sequence.
pub struct UnitExecutor {
    units: Arc<AssetUnits>,
    ctx: BuildContext,
    sink: ErrorSink,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl UnitExecutor {
    pub fn new(
        units: Arc<AssetUnits>,
        ctx: BuildContext,
        sink: ErrorSink,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            units,
            ctx,
            sink,
            runtime_tx,
        }
    }
}

/// Run `names` in order, stopping at the first failure.
pub async fn run_units(
    units: &AssetUnits,
    names: &[TaskName],
    ctx: &BuildContext,
    sink: &ErrorSink,
) -> BindingOutcome {
    let mut written = Vec::new();
    for name in names {
        let Some(unit) = units.get(name) else {
            sink.report(name, "no such unit");
            return BindingOutcome::Failed;
        };
        match unit.run(ctx, sink).await {
            Ok(output) => written.extend(
                output
                    .written
                    .iter()
                    .filter_map(|p| relative_str(&ctx.root, p)),
            ),
            Err(_) => return BindingOutcome::Failed,
        }
    }
    BindingOutcome::Succeeded { written }
}

impl BindingExecutor for UnitExecutor {
    fn dispatch(
        &mut self,
        binding: String,
        units: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let registry = Arc::clone(&self.units);
        let ctx = self.ctx.clone();
        let sink = self.sink.clone();
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            tokio::spawn(async move {
                let outcome = run_units(&registry, &units, &ctx, &sink).await;
                debug!(binding = %binding, ?outcome, "binding finished");
                if tx
                    .send(RuntimeEvent::BindingCompleted { binding, outcome })
                    .await
                    .is_err()
                {
                    warn!("runtime channel closed; dropping completion");
                }
            });
            Ok(())
        })
    }
}
