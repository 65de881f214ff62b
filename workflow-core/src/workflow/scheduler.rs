//! Recompute Scheduler
//!
//! A single background loop per session that keeps the store consistent with
//! the task graph, one node at a time.
//!
//! # Algorithm
//!
//! Every tick:
//!
//! 1. Scan layer by layer, starting from the graph's roots, for the first
//!    node that owns a recipe, has a record, and is flagged invalid. Only
//!    nodes with a record pass the scan on to their followers.
//! 2. Resolve that node's arguments one level deep, substituting each string
//!    argument that names a record with the record's current payload.
//! 3. Call the node's function and hand `(name, payload)` to the owner
//!    through a single-slot channel.
//!
//! The scheduler never writes to the graph or the store. The owner applies
//! results, which serializes every store write on the owner's side. A node
//! stays invalid until its result is applied, so a result that is lost or
//! discarded is simply recomputed on a later tick.
//!
//! Each result carries the generation read before its inputs. If the node
//! changed validity after that generation, the owner discards the result
//! instead of flagging stale data valid.
//!
//! # Cancellation
//!
//! Shutdown is checked while sleeping between ticks. A tick that already
//! started runs to completion on the blocking pool; user functions are never
//! interrupted mid-call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::store::Store;
use super::validity::Generations;
use crate::error::{GraphError, Result};
use crate::graph::{Recipe, TaskGraph};

/// A freshly computed payload, waiting to be applied by the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Recomputed {
    pub name: String,
    pub payload: Value,
    /// Generation read before the inputs were resolved.
    pub generation: u64,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No invalid node is reachable from the roots.
    Idle,

    /// The named node was recomputed and its result handed off.
    Recomputed(String),

    /// Recomputing the named node failed; it stays invalid.
    Failed(String),
}

/// Find the first invalid node reachable from the roots of `graph`.
///
/// Closer layers win; within a layer, the first name encountered wins.
/// Names without a recipe (the roots) are never selected, even when their
/// record is flagged invalid; they only seed the scan.
pub fn find_first_invalid<S: Store + ?Sized>(graph: &TaskGraph, store: &S) -> Option<String> {
    let mut layer = graph.roots();
    let mut seen: HashSet<String> = layer.iter().cloned().collect();

    while !layer.is_empty() {
        let invalid = layer
            .iter()
            .find(|name| graph.contains(name) && store.exists(name) && !store.is_valid(name));
        if let Some(name) = invalid {
            return Some(name.clone());
        }

        let mut next = Vec::new();
        for name in layer.iter().filter(|name| store.exists(name)) {
            for follower in graph.followers_of(name) {
                if seen.insert(follower.clone()) {
                    next.push(follower);
                }
            }
        }
        layer = next;
    }

    None
}

/// Scans for invalid nodes and recomputes them in the background.
pub struct RecomputeScheduler<S> {
    graph: Arc<RwLock<TaskGraph>>,
    store: Arc<S>,
    generations: Arc<Generations>,
    results: watch::Sender<Option<Recomputed>>,
}

impl<S: Store> RecomputeScheduler<S> {
    /// Create a scheduler that publishes results into `results`.
    pub fn new(
        graph: Arc<RwLock<TaskGraph>>,
        store: Arc<S>,
        generations: Arc<Generations>,
        results: watch::Sender<Option<Recomputed>>,
    ) -> Self {
        Self {
            graph,
            store,
            generations,
            results,
        }
    }

    /// Find the first invalid node reachable from the roots.
    ///
    /// Roots are never selected.
    pub fn find_first_invalid(&self) -> Option<String> {
        let graph = self.graph.read();
        find_first_invalid(&graph, &*self.store)
    }

    /// Recompute `name` from the live payloads of its sources.
    ///
    /// Only `name`'s own function is called. Its sources are expected to be
    /// materialized in the store already; string arguments without a record
    /// are passed through as plain strings.
    pub fn recompute(&self, name: &str) -> Result<Recomputed> {
        let generation = self.generations.current();
        // Clone so the lock is not held while user code runs.
        let recipe = self.graph.read().get_task(name)?.clone();

        let payload = match recipe {
            Recipe::Literal(value) => value,
            Recipe::Call { function, args } => {
                let resolved: Vec<Value> = args
                    .iter()
                    .map(|arg| {
                        arg.as_str()
                            .and_then(|source| self.store.payload(source))
                            .unwrap_or_else(|| arg.clone())
                    })
                    .collect();

                function
                    .call(&resolved)
                    .map_err(|source| GraphError::RecomputeFailed {
                        name: name.to_string(),
                        source,
                    })?
            }
        };

        Ok(Recomputed {
            name: name.to_string(),
            payload,
            generation,
        })
    }

    /// Run one scan-and-maybe-recompute step.
    ///
    /// Failures are logged and leave the node invalid, so it is retried on
    /// the next tick.
    pub fn tick(&self) -> Tick {
        match self.find_first_invalid() {
            Some(name) => self.recompute_selected(name),
            None => Tick::Idle,
        }
    }

    /// Recompute a node picked by the scan and hand off the result.
    ///
    /// A node that vanished since the scan is no longer eligible.
    fn recompute_selected(&self, name: String) -> Tick {
        tracing::info!(name = %name, "recomputing invalid node");
        match self.recompute(&name) {
            Ok(result) => {
                self.results.send_replace(Some(result));
                tracing::info!(name = %name, "recompute done");
                Tick::Recomputed(name)
            }
            Err(GraphError::NotFound(_)) => {
                tracing::debug!(name = %name, "node vanished before recompute");
                Tick::Idle
            }
            Err(error) => {
                tracing::warn!(name = %name, %error, "recompute failed, will retry");
                Tick::Failed(name)
            }
        }
    }

    async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(?interval, "scheduler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                // Either a stop request or the handle was dropped.
                _ = shutdown.changed() => break,
            }

            let scheduler = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || scheduler.tick()).await {
                Ok(Tick::Idle) => tracing::trace!("nothing to recompute"),
                Ok(_) => {}
                Err(error) => tracing::error!(%error, "scheduler tick panicked"),
            }
        }

        tracing::debug!("scheduler stopped");
    }
}

/// Handle to a running scheduler loop.
///
/// Dropping the handle stops the loop at its next sleep.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Spawn the loop for `scheduler` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a Tokio runtime.
    pub fn spawn<S: Store>(scheduler: Arc<RecomputeScheduler<S>>, interval: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(scheduler.run(interval, rx));
        Self { shutdown, task }
    }

    /// Ask the loop to stop at its next sleep.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for an in-flight tick to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Err(error) = (&mut self.task).await {
            tracing::error!(%error, "scheduler task failed");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
