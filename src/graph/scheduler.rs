// src/graph/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info};

use crate::graph::dag::DagGraph;
use crate::graph::invocation::{FailurePolicy, Invocation};
use crate::types::TaskName;

/// Per-step state within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Waiting on dependencies.
    Pending,
    /// Handed to the executor.
    Running,
    Succeeded,
    Failed,
    /// Never ran because a dependency failed under [`FailurePolicy::Stop`].
    Blocked,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Succeeded | StepState::Failed | StepState::Blocked)
    }
}

/// Outcome reported by the executor for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
}

/// Final tally of an invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationReport {
    pub invocation: String,
    pub succeeded: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    pub blocked: Vec<TaskName>,
}

impl InvocationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.blocked.is_empty()
    }
}

/// Decides which steps of an invocation may run next.
///
/// The scheduler never runs anything itself: [`Scheduler::start`] and
/// [`Scheduler::complete`] return the steps that just became ready, already
/// marked `Running`.
#[derive(Debug)]
pub struct Scheduler {
    name: String,
    graph: DagGraph,
    policy: FailurePolicy,
    states: HashMap<TaskName, StepState>,
}

impl Scheduler {
    pub fn new(invocation: &Invocation) -> Self {
        let graph = DagGraph::from_invocation(invocation);
        let states = graph
            .steps()
            .map(|s| (s.to_string(), StepState::Pending))
            .collect();
        Self {
            name: invocation.name().to_string(),
            graph,
            policy: invocation.policy(),
            states,
        }
    }

    pub fn state_of(&self, step: &str) -> Option<StepState> {
        self.states.get(step).copied()
    }

    /// Every step is terminal.
    pub fn is_finished(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }

    /// Steps with no dependencies.
    pub fn start(&mut self) -> Vec<TaskName> {
        info!(invocation = %self.name, "starting invocation");
        self.collect_ready()
    }

    /// Record the outcome of a running step and return what became ready.
    pub fn complete(&mut self, step: &str, outcome: StepOutcome) -> Vec<TaskName> {
        match self.states.get(step).copied() {
            Some(StepState::Running) => {
                let state = match outcome {
                    StepOutcome::Succeeded => StepState::Succeeded,
                    StepOutcome::Failed => StepState::Failed,
                };
                self.states.insert(step.to_string(), state);
            }
            other => {
                debug!(step = %step, state = ?other, "completion for a step that is not running; ignoring");
                return Vec::new();
            }
        }

        if outcome == StepOutcome::Failed && self.policy == FailurePolicy::Stop {
            self.mark_dependents_blocked(step);
        }

        self.collect_ready()
    }

    /// Transitively block everything downstream of `step`.
    fn mark_dependents_blocked(&mut self, step: &str) {
        let mut stack: Vec<String> = self.graph.dependents_of(step).to_vec();
        while let Some(name) = stack.pop() {
            if let Some(state) = self.states.get_mut(&name) {
                if *state == StepState::Pending {
                    *state = StepState::Blocked;
                    info!(step = %name, blocked_by = %step, "step blocked by failed dependency");
                    stack.extend(self.graph.dependents_of(&name).iter().cloned());
                }
            }
        }
    }

    fn dep_satisfied(&self, dep: &str) -> bool {
        match (self.states.get(dep), self.policy) {
            (Some(StepState::Succeeded), _) => true,
            (Some(StepState::Failed), FailurePolicy::Continue) => true,
            _ => false,
        }
    }

    fn collect_ready(&mut self) -> Vec<TaskName> {
        let ready: Vec<TaskName> = self
            .graph
            .steps()
            .filter(|s| self.states.get(*s) == Some(&StepState::Pending))
            .filter(|s| self.graph.dependencies_of(s).iter().all(|d| self.dep_satisfied(d)))
            .map(|s| s.to_string())
            .collect();

        for step in &ready {
            self.states.insert(step.clone(), StepState::Running);
        }
        ready
    }

    /// Snapshot of the outcome so far.
    pub fn report(&self) -> InvocationReport {
        let mut report = InvocationReport {
            invocation: self.name.clone(),
            ..Default::default()
        };
        for step in self.graph.steps() {
            match self.states.get(step) {
                Some(StepState::Succeeded) => report.succeeded.push(step.to_string()),
                Some(StepState::Failed) => report.failed.push(step.to_string()),
                Some(StepState::Blocked) => report.blocked.push(step.to_string()),
                _ => {}
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::invocation::{default_invocation, fonts_invocation};

    #[test]
    fn default_runs_builds_in_parallel_then_serve_even_after_failure() {
        let mut s = Scheduler::new(&default_invocation());
        assert_eq!(s.start(), vec!["styles", "scripts", "vendor-scripts"]);

        assert!(s.complete("styles", StepOutcome::Failed).is_empty());
        assert!(s.complete("scripts", StepOutcome::Succeeded).is_empty());
        assert_eq!(s.complete("vendor-scripts", StepOutcome::Succeeded), vec!["serve"]);
    }

    #[test]
    fn fonts_stop_blocks_every_later_step() {
        let mut s = Scheduler::new(&fonts_invocation());
        assert_eq!(s.start(), vec!["unzip-fonts"]);
        assert!(s.complete("unzip-fonts", StepOutcome::Failed).is_empty());
        assert!(s.is_finished());

        let report = s.report();
        assert_eq!(report.failed, vec!["unzip-fonts"]);
        assert_eq!(report.blocked, vec!["fonts-css", "fonts-sass", "clean-fonts"]);
        assert!(!report.is_success());
    }

    #[test]
    fn stray_completion_is_ignored() {
        let mut s = Scheduler::new(&fonts_invocation());
        s.start();
        assert!(s.complete("clean-fonts", StepOutcome::Succeeded).is_empty());
        assert_eq!(s.state_of("clean-fonts"), Some(StepState::Pending));
    }
}
