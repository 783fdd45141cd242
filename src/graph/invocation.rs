// src/graph/invocation.rs

//! Named invocations: the entry points a user can ask for.

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, WpwatchError};
use crate::types::TaskName;
use crate::units::fonts::{CLEAN_FONTS, FONTS_CSS, FONTS_SASS, UNZIP_FONTS};
use crate::units::housekeeping::{DELETE_STALE, MAKE_FOLDERS};
use crate::units::{SCRIPTS, STYLES, VENDOR_SCRIPTS};

pub const DEFAULT: &str = "default";
pub const BUILD: &str = "build";
pub const FONTS: &str = "fonts";
/// Starts the reload server and the watch loop; runs until shutdown.
pub const SERVE: &str = "serve";

/// Every step name, each also invocable on its own.
pub const STEPS: [&str; 10] = [
    STYLES,
    SCRIPTS,
    VENDOR_SCRIPTS,
    SERVE,
    DELETE_STALE,
    MAKE_FOLDERS,
    UNZIP_FONTS,
    FONTS_CSS,
    FONTS_SASS,
    CLEAN_FONTS,
];

/// What happens to the dependents of a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Dependents still run; the failure has already been reported.
    Continue,
    /// Dependents are blocked and never run.
    Stop,
}

/// One node of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub name: TaskName,
    /// Steps that must finish first.
    pub after: Vec<TaskName>,
}

/// A named DAG of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    name: String,
    steps: Vec<StepSpec>,
    policy: FailurePolicy,
}

impl Invocation {
    pub fn new(name: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            policy,
        }
    }

    /// Add a step that runs after `after`.
    pub fn step(mut self, name: &str, after: &[&str]) -> Self {
        self.steps.push(StepSpec {
            name: name.to_string(),
            after: after.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Every `after` names a step of this invocation, names are unique and
    /// the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(WpwatchError::ConfigError(format!(
                    "invocation '{}' lists step '{}' twice",
                    self.name, step.name
                )));
            }
        }
        for step in &self.steps {
            for dep in &step.after {
                if !names.contains(dep.as_str()) {
                    return Err(WpwatchError::ConfigError(format!(
                        "step '{}' in invocation '{}' runs after unknown step '{}'",
                        step.name, self.name, dep
                    )));
                }
            }
        }
        self.order().map(|_| ())
    }

    /// Steps in a valid execution order.
    pub fn order(&self) -> Result<Vec<&str>> {
        // Edge direction: dep -> step.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for step in &self.steps {
            graph.add_node(step.name.as_str());
        }
        for step in &self.steps {
            for dep in &step.after {
                graph.add_edge(dep.as_str(), step.name.as_str(), ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            WpwatchError::DagCycle(format!(
                "cycle detected in invocation '{}' involving step '{}'",
                self.name,
                cycle.node_id()
            ))
        })
    }
}

/// Build assets in parallel, then serve and watch.
pub fn default_invocation() -> Invocation {
    Invocation::new(DEFAULT, FailurePolicy::Continue)
        .step(STYLES, &[])
        .step(SCRIPTS, &[])
        .step(VENDOR_SCRIPTS, &[])
        .step(SERVE, &[STYLES, SCRIPTS, VENDOR_SCRIPTS])
}

/// One-time project housekeeping.
pub fn build_invocation() -> Invocation {
    Invocation::new(BUILD, FailurePolicy::Stop)
        .step(DELETE_STALE, &[])
        .step(MAKE_FOLDERS, &[DELETE_STALE])
}

/// Extract fonts and merge their stylesheet into the typography partial.
pub fn fonts_invocation() -> Invocation {
    Invocation::new(FONTS, FailurePolicy::Stop)
        .step(UNZIP_FONTS, &[])
        .step(FONTS_CSS, &[UNZIP_FONTS])
        .step(FONTS_SASS, &[FONTS_CSS])
        .step(CLEAN_FONTS, &[FONTS_SASS])
}

/// Look up an invocation by name.
pub fn resolve(name: &str) -> Result<Invocation> {
    let invocation = match name {
        DEFAULT => default_invocation(),
        BUILD => build_invocation(),
        FONTS => fonts_invocation(),
        step if STEPS.contains(&step) => Invocation::new(step, FailurePolicy::Stop).step(step, &[]),
        other => return Err(WpwatchError::UnknownTask(other.to_string())),
    };
    invocation.validate()?;
    Ok(invocation)
}

/// All names accepted by [`resolve`].
pub fn names() -> Vec<&'static str> {
    let mut all = vec![DEFAULT, BUILD, FONTS];
    all.extend(STEPS);
    all
}
