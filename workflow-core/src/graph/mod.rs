//! Task Graph
//!
//! This module implements the named task graph that records how each derived
//! data product is produced.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are names. A name either owns a recipe (a literal value, or a
//!   function plus bound arguments) or is supplied from outside.
//! - Edges are implicit: if B's recipe has the string argument `"A"`, there
//!   is an edge from A to B.
//!
//! # Design Decisions
//!
//! 1. No edge table is stored. Followers and sources are computed by scanning
//!    recipes, so replacing or removing a recipe can never leave a stale edge
//!    behind.
//!
//! 2. Recipes are kept in insertion order, which makes query results stable.
//!
//! 3. Cycles are not rejected when recipes are recorded. Evaluation reports
//!    one when it runs into it.

mod evaluate;
mod recipe;
mod task_graph;

pub use evaluate::evaluate;
pub use recipe::{Args, Function, Param, Recipe};
pub use task_graph::TaskGraph;
