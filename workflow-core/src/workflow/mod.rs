//! Workflow Session
//!
//! This module connects a task graph to an external store and keeps the
//! store's payloads consistent with the recorded recipes.
//!
//! # Concepts
//!
//! ## Store
//!
//! The store owns the data: one record per name, holding a payload and a
//! validity flag. The graph never holds payloads.
//!
//! ## Validity
//!
//! A valid record matches its recipe given the current state of its
//! sources. Changing a node invalidates everything downstream of it.
//!
//! ## Scheduler
//!
//! A background loop that repeatedly finds the invalid node closest to the
//! roots and recomputes it from the store's live payloads. Results go back
//! to the owner through a single-slot channel.
//!
//! ## Manager
//!
//! The owner-side façade: records recipes, reacts to store events, starts
//! and stops the scheduler, and applies its results.
//!
//! # Implementation Notes
//!
//! Recomputation is polled rather than pushed. Latency is bounded by the
//! tick interval, and a broad invalidation never triggers a burst of eager
//! recomputes: at most one node is recomputed per tick.

mod config;
mod manager;
mod scheduler;
mod store;
mod validity;

pub use config::Config;
pub use manager::{Delivery, GraphManager, StoreEvent};
pub use scheduler::{find_first_invalid, RecomputeScheduler, Recomputed, SchedulerHandle, Tick};
pub use store::{MemoryStore, Store};
pub use validity::{Generations, ValidityTracker};
