//! Graph Manager
//!
//! The manager binds a task graph to one store session. It turns store
//! events into graph and validity updates, owns the background scheduler,
//! and applies the scheduler's results on the owner's side.
//!
//! # How It Works
//!
//! 1. The owner writes a payload and reports how it was produced
//!    ([`GraphManager::update`]), or reports a direct edit
//!    ([`StoreEvent::PayloadChanged`]). The node is flagged valid and its
//!    transitive followers invalid.
//!
//! 2. The scheduler, running in the background, picks the first invalid node
//!    reachable from the roots and recomputes it.
//!
//! 3. The owner picks up the result ([`GraphManager::apply_pending`] or
//!    [`GraphManager::next_delivery`]). If the record still exists and
//!    nothing flipped its validity since the recompute started, its payload
//!    is replaced and flagged valid; otherwise the result is dropped and the
//!    node is picked up again by a later tick.
//!
//! Steps 2 and 3 repeat until nothing reachable is invalid.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard};
use serde_json::Value;
use tokio::sync::watch;

use super::config::Config;
use super::scheduler::{RecomputeScheduler, Recomputed, SchedulerHandle};
use super::store::Store;
use super::validity::{Generations, ValidityTracker};
use crate::error::Result;
use crate::graph::{self, Function, TaskGraph};

/// Changes to the store that the manager reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A record was created.
    RecordAdded(String),

    /// A record was dropped.
    RecordRemoved(String),

    /// The owner replaced a record's payload directly.
    PayloadChanged(String),
}

/// What happened to a result picked up from the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The payload was written and the node flagged valid.
    Applied(String),

    /// The record no longer existed, or the node changed while the payload
    /// was computed; the payload was dropped.
    Discarded(String),
}

/// Owns the task graph of one store session.
pub struct GraphManager<S: Store> {
    graph: Arc<RwLock<TaskGraph>>,
    store: Arc<S>,
    config: Config,
    generations: Arc<Generations>,
    scheduler: Arc<RecomputeScheduler<S>>,
    results: watch::Receiver<Option<Recomputed>>,
    handle: Option<SchedulerHandle>,
}

impl<S: Store> GraphManager<S> {
    /// Create a manager for `store`. The scheduler is not started.
    pub fn new(store: Arc<S>, config: Config) -> Self {
        let graph = Arc::new(RwLock::new(TaskGraph::new()));
        let generations = Arc::new(Generations::new());
        let (tx, results) = watch::channel(None);
        let scheduler = Arc::new(RecomputeScheduler::new(
            Arc::clone(&graph),
            Arc::clone(&store),
            Arc::clone(&generations),
            tx,
        ));

        Self {
            graph,
            store,
            config,
            generations,
            scheduler,
            results,
            handle: None,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read access to the task graph.
    pub fn graph(&self) -> RwLockReadGuard<'_, TaskGraph> {
        self.graph.read()
    }

    pub fn scheduler(&self) -> &Arc<RecomputeScheduler<S>> {
        &self.scheduler
    }

    /// Start the background loop. Does nothing if it is already running.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a Tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.handle = Some(SchedulerHandle::spawn(
            Arc::clone(&self.scheduler),
            self.config.tick_interval(),
        ));
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the background loop and wait for an in-flight tick to finish.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown().await;
        }
    }

    /// Record that `name`'s payload was produced by `function` applied to
    /// `args`/`kwargs`.
    ///
    /// The owner has already written the payload. `name` is flagged valid and
    /// its followers invalid.
    pub fn update(
        &self,
        name: &str,
        function: &Function,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Result<()> {
        let mut graph = self.graph.write();
        graph.set(name, function, args, kwargs)?;
        tracing::debug!(name, function = function.name(), "recorded task");

        self.refresh(&graph, name);
        Ok(())
    }

    /// Record a literal recipe for `name`.
    pub fn set_literal(&self, name: &str, value: Value) {
        let mut graph = self.graph.write();
        graph.set_literal(name, value);
        self.refresh(&graph, name);
    }

    /// React to a change in the store.
    pub fn handle_event(&self, event: StoreEvent) {
        match event {
            StoreEvent::RecordAdded(name) => {
                tracing::debug!(name = %name, "record added");
            }
            StoreEvent::RecordRemoved(name) => {
                tracing::debug!(name = %name, "record removed");
                self.graph.write().remove(&name);
            }
            StoreEvent::PayloadChanged(name) => {
                tracing::debug!(name = %name, "payload changed");
                let graph = self.graph.read();
                self.refresh(&graph, &name);
            }
        }
    }

    /// Flag `names` and their transitive followers invalid.
    pub fn invalidate<I, N>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let graph = self.graph.read();
        self.tracker(&graph).invalidate(names)
    }

    pub fn mark_valid(&self, name: &str) -> bool {
        let graph = self.graph.read();
        self.tracker(&graph).mark_valid(name)
    }

    /// Evaluate `name` from recipes alone, ignoring the store.
    pub fn evaluate(&self, name: &str) -> Result<Value> {
        graph::evaluate(&self.graph.read(), name)
    }

    /// Apply the pending scheduler result, if there is a new one.
    ///
    /// Never blocks.
    pub fn apply_pending(&mut self) -> Option<Delivery> {
        if !matches!(self.results.has_changed(), Ok(true)) {
            return None;
        }
        let result = self.results.borrow_and_update().clone()?;
        Some(self.apply(result))
    }

    /// Wait for the next scheduler result and apply it.
    ///
    /// Returns `None` once no more results can arrive.
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        loop {
            self.results.changed().await.ok()?;
            let result = self.results.borrow_and_update().clone();
            if let Some(result) = result {
                return Some(self.apply(result));
            }
        }
    }

    fn apply(&self, result: Recomputed) -> Delivery {
        let Recomputed {
            name,
            payload,
            generation,
        } = result;

        // Inputs changed after the recompute read them; the node is still
        // invalid and will be recomputed from the new inputs.
        if self.generations.changed_since(&name, generation) {
            tracing::debug!(name = %name, generation, "discarding stale recomputed payload");
            return Delivery::Discarded(name);
        }

        // The record may have been dropped since the scan picked it.
        if !self.store.set_payload(&name, payload) {
            tracing::warn!(name = %name, "record gone, discarding recomputed payload");
            return Delivery::Discarded(name);
        }

        self.store.set_valid(&name, true);
        tracing::debug!(name = %name, "applied recomputed payload");
        Delivery::Applied(name)
    }

    /// Flag `name` valid and its followers invalid.
    fn refresh(&self, graph: &TaskGraph, name: &str) {
        let tracker = self.tracker(graph);
        tracker.mark_valid(name);
        tracker.invalidate(graph.followers_of(name));
    }

    fn tracker<'a>(&'a self, graph: &'a TaskGraph) -> ValidityTracker<'a, S> {
        ValidityTracker::new(graph, &*self.store).with_generations(&self.generations)
    }
}
