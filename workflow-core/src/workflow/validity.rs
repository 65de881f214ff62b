//! Validity Tracking
//!
//! Validity flags live on the store's records. This module flips them: a
//! node becomes valid when its owner supplies fresh data or a recompute is
//! applied, and every transitive follower of a changed node becomes invalid.
//!
//! # Propagation
//!
//! Invalidation walks `followers_of` breadth-first with a visited set, so
//! each name is handled once per call even in diamond-shaped graphs, and the
//! walk terminates even if a cycle slipped into the graph. Names without a
//! record are not flagged but are still walked through: a missing record does
//! not break the dependency chain.
//!
//! # Generations
//!
//! A tracker built [`with_generations`](ValidityTracker::with_generations)
//! also stamps every name whose flag it flips. A recompute that started
//! before a stamp was computed from inputs that are now out of date.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::store::Store;
use crate::graph::TaskGraph;

/// A session-wide clock recording when each name last changed validity.
#[derive(Debug, Default)]
pub struct Generations {
    clock: AtomicU64,
    stamps: DashMap<String, u64>,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current generation. Read it before reading any inputs.
    pub fn current(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Advance the clock and stamp `name` with the new generation.
    pub fn stamp(&self, name: &str) -> u64 {
        let generation = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.stamps.insert(name.to_string(), generation);
        generation
    }

    /// Whether `name` was stamped after `generation`.
    pub fn changed_since(&self, name: &str, generation: u64) -> bool {
        self.stamps
            .get(name)
            .is_some_and(|stamp| *stamp > generation)
    }
}

/// Flips validity flags for one graph/store pair.
pub struct ValidityTracker<'a, S: ?Sized> {
    graph: &'a TaskGraph,
    store: &'a S,
    generations: Option<&'a Generations>,
}

impl<'a, S: Store + ?Sized> ValidityTracker<'a, S> {
    pub fn new(graph: &'a TaskGraph, store: &'a S) -> Self {
        Self {
            graph,
            store,
            generations: None,
        }
    }

    /// Stamp every flipped name in `generations`.
    pub fn with_generations(mut self, generations: &'a Generations) -> Self {
        self.generations = Some(generations);
        self
    }

    /// Flag `name` as consistent with its recipe and inputs.
    ///
    /// Returns `false` if there is no record to flag.
    pub fn mark_valid(&self, name: &str) -> bool {
        let flagged = self.store.set_valid(name, true);
        if flagged {
            self.stamp(name);
        }
        flagged
    }

    /// Flag `names` and all of their transitive followers invalid.
    ///
    /// Returns the names that were flagged, in visiting order.
    pub fn invalidate<I, N>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = names.into_iter().map(Into::into).collect();
        let mut flagged = Vec::new();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }

            if self.store.set_valid(&name, false) {
                self.stamp(&name);
                flagged.push(name.clone());
            }

            queue.extend(self.graph.followers_of(&name));
        }

        if !flagged.is_empty() {
            tracing::debug!(?flagged, "invalidated");
        }
        flagged
    }

    fn stamp(&self, name: &str) {
        if let Some(generations) = self.generations {
            generations.stamp(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Function, Param};
    use crate::workflow::store::MemoryStore;
    use indexmap::IndexMap;
    use serde_json::json;

    fn echo() -> Function {
        Function::new("echo", [Param::required("x")], |args| Ok(args[0].clone()))
    }

    /// a -> b -> c -> d, with a -> e
    fn chain() -> (TaskGraph, MemoryStore) {
        let mut graph = TaskGraph::new();
        for (name, source) in [("b", "a"), ("c", "b"), ("d", "c"), ("e", "a")] {
            graph.set(name, &echo(), vec![json!(source)], IndexMap::new()).unwrap();
        }

        let store = MemoryStore::new();
        for name in ["a", "b", "c", "d", "e"] {
            store.insert(name, json!(null));
            store.set_valid(name, true);
        }
        (graph, store)
    }

    #[test]
    fn invalidates_transitive_followers() {
        let (graph, store) = chain();
        let tracker = ValidityTracker::new(&graph, &store);

        let flagged = tracker.invalidate(graph.followers_of("a"));

        assert_eq!(flagged, vec!["b", "e", "c", "d"]);
        assert_eq!(store.validity("a"), Some(true));
        for name in ["b", "c", "d", "e"] {
            assert_eq!(store.validity(name), Some(false), "{name}");
        }
    }

    #[test]
    fn walks_through_missing_records() {
        let (graph, store) = chain();
        store.remove("c");
        let tracker = ValidityTracker::new(&graph, &store);

        let flagged = tracker.invalidate(["b"]);

        assert_eq!(flagged, vec!["b", "d"]);
        assert!(!store.exists("c"));
        assert_eq!(store.validity("d"), Some(false));
    }

    #[test]
    fn invalidate_is_idempotent() {
        let (graph, store) = chain();
        let tracker = ValidityTracker::new(&graph, &store);

        tracker.invalidate(["c"]);
        let once: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| store.validity(n))
            .collect();

        tracker.invalidate(["c"]);
        let twice: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| store.validity(n))
            .collect();

        assert_eq!(once, twice);
        assert_eq!(once, vec![Some(true), Some(true), Some(false), Some(false), Some(true)]);
    }

    #[test]
    fn terminates_on_cycles() {
        let mut graph = TaskGraph::new();
        graph.set("x", &echo(), vec![json!("y")], IndexMap::new()).unwrap();
        graph.set("y", &echo(), vec![json!("x")], IndexMap::new()).unwrap();
        let store = MemoryStore::new();
        store.insert("x", json!(0));
        store.insert("y", json!(0));

        let flagged = ValidityTracker::new(&graph, &store).invalidate(["x"]);
        assert_eq!(flagged, vec!["x", "y"]);
    }

    #[test]
    fn mark_valid_needs_record() {
        let (graph, store) = chain();
        let tracker = ValidityTracker::new(&graph, &store);

        store.set_valid("b", false);
        assert!(tracker.mark_valid("b"));
        assert!(store.is_valid("b"));
        assert!(!tracker.mark_valid("ghost"));
    }

    #[test]
    fn flipped_names_are_stamped() {
        let (graph, store) = chain();
        let generations = Generations::new();
        store.remove("c");
        let before = generations.current();

        let tracker = ValidityTracker::new(&graph, &store).with_generations(&generations);
        tracker.invalidate(["b"]);

        assert!(generations.changed_since("b", before));
        assert!(generations.changed_since("d", before));
        assert!(!generations.changed_since("c", before));
        assert!(!generations.changed_since("a", before));

        let after = generations.current();
        assert!(!generations.changed_since("b", after));
        tracker.mark_valid("b");
        assert!(generations.changed_since("b", after));
        assert!(!generations.changed_since("d", after));
    }
}
