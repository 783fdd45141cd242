// src/graph/dag.rs

use std::collections::HashMap;

use crate::graph::invocation::Invocation;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    deps: Vec<String>,
    dependents: Vec<String>,
}

/// Adjacency view of a validated invocation, keyed by step name.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    /// Declaration order, for stable iteration.
    order: Vec<String>,
}

impl DagGraph {
    /// Assumes every `after` reference is valid and there are no cycles.
    pub fn from_invocation(invocation: &Invocation) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();
        let mut order = Vec::new();

        for step in invocation.steps() {
            order.push(step.name.clone());
            nodes.insert(
                step.name.clone(),
                DagNode {
                    deps: step.after.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        for step in invocation.steps() {
            for dep in &step.after {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(step.name.clone());
                }
            }
        }

        Self { nodes, order }
    }

    /// Step names in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
