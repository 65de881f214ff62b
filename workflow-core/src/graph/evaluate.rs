//! Evaluation
//!
//! Resolves a node by recursively resolving the nodes its recipe references,
//! depth-first and left to right, then calling the recorded function.
//!
//! A string argument counts as a reference only when the graph holds a
//! recipe under that name; any other string is passed through as a literal.
//! A literal string that happens to collide with a node name is therefore
//! always read as a reference.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::recipe::Recipe;
use super::task_graph::TaskGraph;
use crate::error::{GraphError, Result};

/// Evaluate `name` against `graph`.
///
/// Each node is computed at most once per call.
pub fn evaluate(graph: &TaskGraph, name: &str) -> Result<Value> {
    Evaluator::new(graph).evaluate(name)
}

/// Single-use evaluation state.
struct Evaluator<'g> {
    graph: &'g TaskGraph,
    memo: HashMap<String, Value>,
    /// Names currently being resolved, for cycle reporting.
    active: HashSet<String>,
}

impl<'g> Evaluator<'g> {
    fn new(graph: &'g TaskGraph) -> Self {
        Self {
            graph,
            memo: HashMap::new(),
            active: HashSet::new(),
        }
    }

    fn evaluate(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.memo.get(name) {
            return Ok(value.clone());
        }

        let graph = self.graph;
        let value = match graph.get_task(name)? {
            Recipe::Literal(value) => value.clone(),
            Recipe::Call { function, args } => {
                if !self.active.insert(name.to_string()) {
                    return Err(GraphError::CycleDetected(name.to_string()));
                }

                let mut resolved = Vec::with_capacity(args.len());
                for arg in args {
                    match arg.as_str() {
                        Some(dep) if graph.contains(dep) => resolved.push(self.evaluate(dep)?),
                        _ => resolved.push(arg.clone()),
                    }
                }

                self.active.remove(name);

                tracing::trace!(name, function = function.name(), "evaluating");
                function
                    .call(&resolved)
                    .map_err(|source| GraphError::RecomputeFailed {
                        name: name.to_string(),
                        source,
                    })?
            }
        };

        self.memo.insert(name.to_string(), value.clone());
        Ok(value)
    }
}
