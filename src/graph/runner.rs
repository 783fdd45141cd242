// src/graph/runner.rs

//! Async driver for a [`Scheduler`]: ready steps run concurrently on the
//! tokio runtime.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::graph::invocation::Invocation;
use crate::graph::scheduler::{InvocationReport, Scheduler, StepOutcome};
use crate::pipeline::BoxFuture;
use crate::types::TaskName;

/// Runs one step by name.
///
/// Implementations report their own failures (to the error sink); the
/// runner only needs the outcome.
pub trait StepExecutor: Send + Sync {
    fn run_step<'a>(&'a self, step: &'a str) -> BoxFuture<'a, StepOutcome>;
}

/// Run every step of `invocation`, honouring its edges and failure policy.
pub async fn run_invocation(invocation: &Invocation, executor: Arc<dyn StepExecutor>) -> InvocationReport {
    let mut scheduler = Scheduler::new(invocation);
    let mut running: JoinSet<(TaskName, StepOutcome)> = JoinSet::new();
    let mut names: HashMap<tokio::task::Id, TaskName> = HashMap::new();

    let spawn = |running: &mut JoinSet<(TaskName, StepOutcome)>,
                 names: &mut HashMap<tokio::task::Id, TaskName>,
                 step: TaskName| {
        info!(step = %step, "starting step");
        let executor = Arc::clone(&executor);
        let key = step.clone();
        let handle = running.spawn(async move {
            let outcome = executor.run_step(&step).await;
            (step, outcome)
        });
        names.insert(handle.id(), key);
    };

    for step in scheduler.start() {
        spawn(&mut running, &mut names, step);
    }

    while let Some(joined) = running.join_next_with_id().await {
        let (step, outcome) = match joined {
            Ok((id, (step, outcome))) => {
                names.remove(&id);
                (step, outcome)
            }
            Err(err) => {
                let step = names.remove(&err.id()).unwrap_or_default();
                error!(step = %step, error = %err, "step panicked or was cancelled");
                (step, StepOutcome::Failed)
            }
        };

        info!(step = %step, ?outcome, "step finished");
        for next in scheduler.complete(&step, outcome) {
            spawn(&mut running, &mut names, next);
        }
    }

    let report = scheduler.report();
    info!(
        invocation = %report.invocation,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        blocked = report.blocked.len(),
        "invocation finished"
    );
    report
}
