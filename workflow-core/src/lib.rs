//! Workflow Core
//!
//! This crate keeps derived data products up to date. It implements:
//!
//! - A named task graph recording how each product is computed
//! - Recursive evaluation of recipes
//! - Transitive invalidation of everything downstream of a change
//! - A background loop that recomputes stale products one at a time
//!
//! The data itself lives in an external store owned by the caller; the crate
//! only holds recipes and flips validity flags.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: Recipes, the task graph and its queries, and evaluation
//! - `workflow`: The store interface, validity tracking, the recompute
//!   scheduler and the session manager
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use workflow_core::graph::{Function, Param};
//! use workflow_core::workflow::{Config, GraphManager, MemoryStore, StoreEvent};
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut manager = GraphManager::new(store.clone(), Config::default());
//! manager.start();
//!
//! let double = Function::new("double", [Param::required("image")], |args| {
//!     // ...
//! });
//!
//! store.insert("raw", raw_image);
//! store.insert("doubled", double.call(&[raw_image.clone()])?);
//! manager.update("doubled", &double, vec!["raw".into()], Default::default())?;
//!
//! // Later, the raw image is edited in place.
//! store.set_payload("raw", edited);
//! manager.handle_event(StoreEvent::PayloadChanged("raw".into()));
//!
//! // "doubled" is recomputed in the background and applied here.
//! manager.next_delivery().await;
//! ```

pub mod error;
pub mod graph;
pub mod workflow;

pub use error::{BindError, GraphError, Result};
