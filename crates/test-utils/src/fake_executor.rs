use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use wpwatch::engine::{BindingOutcome, RuntimeEvent};
use wpwatch::errors::Result;
use wpwatch::exec::BindingExecutor;
use wpwatch::graph::{StepExecutor, StepOutcome};
use wpwatch::pipeline::BoxFuture;
use wpwatch::types::TaskName;

/// One recorded `dispatch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub binding: String,
    pub units: Vec<TaskName>,
}

/// A fake binding executor that:
/// - records every dispatch,
/// - immediately reports `BindingCompleted` unless built with [`manual`],
///   succeeding with the configured written paths or failing.
///
/// [`manual`]: FakeBindingExecutor::manual
pub struct FakeBindingExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<Dispatch>>>,
    written: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    auto_complete: bool,
}

impl FakeBindingExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            dispatched: Arc::new(Mutex::new(Vec::new())),
            written: HashMap::new(),
            failing: HashSet::new(),
            auto_complete: true,
        }
    }

    /// Never report completion; the test sends `BindingCompleted` itself.
    pub fn manual(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    /// Paths reported as written when `binding` succeeds.
    pub fn writes(mut self, binding: &str, paths: &[&str]) -> Self {
        self.written.insert(
            binding.to_string(),
            paths.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn failing(mut self, binding: &str) -> Self {
        self.failing.insert(binding.to_string());
        self
    }

    /// Shared view of the dispatch log.
    pub fn dispatched(&self) -> Arc<Mutex<Vec<Dispatch>>> {
        Arc::clone(&self.dispatched)
    }
}

impl BindingExecutor for FakeBindingExecutor {
    fn dispatch(
        &mut self,
        binding: String,
        units: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.dispatched.lock().unwrap().push(Dispatch {
            binding: binding.clone(),
            units,
        });

        let outcome = if self.failing.contains(&binding) {
            BindingOutcome::Failed
        } else {
            BindingOutcome::Succeeded {
                written: self.written.get(&binding).cloned().unwrap_or_default(),
            }
        };
        let tx = self.runtime_tx.clone();
        let auto_complete = self.auto_complete;

        Box::pin(async move {
            if auto_complete {
                // Spawned so the runtime never waits on its own channel.
                tokio::spawn(async move {
                    let _ = tx
                        .send(RuntimeEvent::BindingCompleted { binding, outcome })
                        .await;
                });
            }
            Ok(())
        })
    }
}

/// A fake step executor that records the order steps ran in and fails the
/// configured ones.
#[derive(Debug, Clone, Default)]
pub struct FakeStepExecutor {
    failing: HashSet<String>,
    ran: Arc<Mutex<Vec<String>>>,
}

impl FakeStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, step: &str) -> Self {
        self.failing.insert(step.to_string());
        self
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

impl StepExecutor for FakeStepExecutor {
    fn run_step<'a>(&'a self, step: &'a str) -> BoxFuture<'a, StepOutcome> {
        Box::pin(async move {
            self.ran.lock().unwrap().push(step.to_string());
            tokio::task::yield_now().await;
            if self.failing.contains(step) {
                StepOutcome::Failed
            } else {
                StepOutcome::Succeeded
            }
        })
    }
}
