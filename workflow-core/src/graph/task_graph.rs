//! Task Graph
//!
//! The task graph maps node names to recipes. Edges are never stored: they
//! are derived on demand from the string-valued arguments of each recipe,
//! pointing from the referenced name (source) to the recipe's name
//! (follower).

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use super::recipe::{Function, Recipe};
use crate::error::{GraphError, Result};

/// Recipes indexed by node name, in the order they were first recorded.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: IndexMap<String, Recipe>,
}

impl TaskGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a literal value for `name`, replacing any prior recipe.
    pub fn set_literal(&mut self, name: impl Into<String>, value: Value) {
        self.tasks.insert(name.into(), Recipe::Literal(value));
    }

    /// Record `function` applied to `args`/`kwargs` for `name`, replacing
    /// any prior recipe.
    ///
    /// Arguments are bound against the declared parameters now; defaults
    /// are copied into the recipe.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        function: &Function,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<()> {
        let args = function.bind(args, kwargs)?;
        self.tasks.insert(
            name.into(),
            Recipe::Call {
                function: function.clone(),
                args,
            },
        );
        Ok(())
    }

    /// Delete the recipe for `name`, if any.
    ///
    /// Other recipes that reference `name` keep doing so; `name` then shows
    /// up among the roots.
    pub fn remove(&mut self, name: &str) -> Option<Recipe> {
        self.tasks.shift_remove(name)
    }

    /// Get the recipe recorded for `name`.
    pub fn get_task(&self, name: &str) -> Result<&Recipe> {
        self.tasks
            .get(name)
            .ok_or_else(|| GraphError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Names that own a recipe, in recording order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names referenced by some recipe that have no recipe of their own.
    ///
    /// These are supplied by the external store.
    pub fn roots(&self) -> Vec<String> {
        let mut roots = IndexSet::new();
        for recipe in self.tasks.values() {
            for source in recipe.references() {
                if !self.tasks.contains_key(source) {
                    roots.insert(source);
                }
            }
        }
        roots.into_iter().map(str::to_string).collect()
    }

    /// Names whose recipe references `name`, each once.
    pub fn followers_of(&self, name: &str) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(_, recipe)| recipe.references_name(name))
            .map(|(result, _)| result.clone())
            .collect()
    }

    /// The string-valued arguments of `name`'s recipe, in argument order.
    ///
    /// Empty when `name` has no recipe.
    pub fn sources_of(&self, name: &str) -> Vec<String> {
        self.tasks
            .get(name)
            .map(|recipe| recipe.references().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Names with a recipe that no other recipe references.
    pub fn leaves(&self) -> Vec<String> {
        let referenced: IndexSet<&str> = self
            .tasks
            .values()
            .flat_map(Recipe::references)
            .collect();

        self.names()
            .filter(|name| !referenced.contains(name))
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow:")?;
        for (name, recipe) in &self.tasks {
            writeln!(f, "{name} <- {recipe}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::recipe::Param;
    use serde_json::json;

    fn unary(name: &str) -> Function {
        Function::new(name, [Param::required("input")], |args| Ok(args[0].clone()))
    }

    fn binary() -> Function {
        Function::new(
            "add",
            [Param::required("a"), Param::required("b")],
            |args| Ok(args[0].clone()),
        )
    }

    /// raw -> blurred -> labels, raw + blurred -> combined
    fn pipeline() -> TaskGraph {
        let mut graph = TaskGraph::new();
        graph
            .set("blurred", &unary("blur"), vec![json!("raw")], IndexMap::new())
            .unwrap();
        graph
            .set("labels", &unary("label"), vec![json!("blurred")], IndexMap::new())
            .unwrap();
        graph
            .set(
                "combined",
                &binary(),
                vec![json!("raw"), json!("blurred")],
                IndexMap::new(),
            )
            .unwrap();
        graph
    }

    #[test]
    fn set_and_get_task() {
        let graph = pipeline();
        let blur = graph.get_task("blurred").unwrap();
        match blur {
            Recipe::Call { function, args } => {
                assert_eq!(function.name(), "blur");
                assert_eq!(args.as_slice(), &[json!("raw")]);
            }
            other => panic!("unexpected recipe {other:?}"),
        }
    }

    #[test]
    fn missing_task_is_not_found() {
        let graph = pipeline();
        assert!(matches!(
            graph.get_task("raw"),
            Err(GraphError::NotFound(name)) if name == "raw"
        ));
    }

    #[test]
    fn set_replaces_prior_recipe() {
        let mut graph = pipeline();
        graph.set_literal("labels", json!([0, 1]));
        assert_eq!(graph.get_task("labels").unwrap(), &Recipe::Literal(json!([0, 1])));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn queries() {
        let graph = pipeline();

        assert_eq!(graph.roots(), vec!["raw"]);
        assert_eq!(graph.followers_of("raw"), vec!["blurred", "combined"]);
        assert_eq!(graph.followers_of("blurred"), vec!["labels", "combined"]);
        assert_eq!(graph.sources_of("combined"), vec!["raw", "blurred"]);
        assert!(graph.sources_of("raw").is_empty());
        assert_eq!(graph.leaves(), vec!["labels", "combined"]);
    }

    #[test]
    fn repeated_reference_reported_per_occurrence() {
        let mut graph = TaskGraph::new();
        graph
            .set("twice", &binary(), vec![json!("x"), json!("x")], IndexMap::new())
            .unwrap();

        assert_eq!(graph.sources_of("twice"), vec!["x", "x"]);
        assert_eq!(graph.followers_of("x"), vec!["twice"]);
        assert_eq!(graph.roots(), vec!["x"]);
    }

    #[test]
    fn followers_and_sources_are_inverse() {
        let graph = pipeline();
        let mut names: Vec<String> = graph.names().map(str::to_string).collect();
        names.extend(graph.roots());

        for n in &names {
            for m in &names {
                let follows = graph.followers_of(m).contains(n);
                let sourced = graph.sources_of(n).contains(m);
                assert_eq!(follows, sourced, "{m} -> {n}");
            }
        }
    }

    #[test]
    fn removing_dependency_makes_it_a_root() {
        let mut graph = pipeline();
        let before = graph.get_task("labels").unwrap().clone();

        assert!(graph.remove("blurred").is_some());
        assert!(graph.remove("blurred").is_none());

        assert_eq!(graph.get_task("labels").unwrap(), &before);
        assert_eq!(graph.roots(), vec!["blurred", "raw"]);
        for root in graph.roots() {
            assert!(!graph.contains(&root));
        }
    }

    #[test]
    fn display_lists_recipes() {
        let mut graph = TaskGraph::new();
        graph.set_literal("raw", json!([1, 2]));
        graph
            .set("blurred", &unary("blur"), vec![json!("raw")], IndexMap::new())
            .unwrap();

        assert_eq!(
            graph.to_string(),
            "Workflow:\nraw <- [1,2]\nblurred <- blur(\"raw\")\n"
        );
    }
}
