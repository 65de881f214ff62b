//! External Store
//!
//! The store holds the actual payload for each name together with a validity
//! flag. It belongs to whoever owns the session; the task graph only holds
//! recipes.
//!
//! # Thread Safety
//!
//! The background scheduler reads the store while the owner mutates it, so
//! every per-record operation must be atomic on its own. No operation spans
//! more than one record.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

/// Per-name payload storage with validity flags.
pub trait Store: Send + Sync + 'static {
    /// Whether a record exists for `name`.
    fn exists(&self, name: &str) -> bool;

    /// The current payload of `name`, or `None` if there is no record.
    fn payload(&self, name: &str) -> Option<Value>;

    /// Replace the payload of an existing record.
    ///
    /// Returns `false` and does nothing if there is no record.
    fn set_payload(&self, name: &str, payload: Value) -> bool;

    /// Whether `name`'s record is flagged valid.
    ///
    /// A missing record or a record without a flag reads as invalid.
    fn is_valid(&self, name: &str) -> bool;

    /// Set the validity flag of an existing record.
    ///
    /// Returns `false` and does nothing if there is no record.
    fn set_valid(&self, name: &str, valid: bool) -> bool;
}

#[derive(Debug, Clone)]
struct Record {
    payload: Value,
    valid: Option<bool>,
}

/// In-memory [`Store`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the record for `name`.
    ///
    /// A new record carries no validity flag.
    pub fn insert(&self, name: impl Into<String>, payload: Value) {
        match self.records.entry(name.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().payload = payload,
            Entry::Vacant(entry) => {
                entry.insert(Record {
                    payload,
                    valid: None,
                });
            }
        }
    }

    /// Drop the record for `name`, returning its payload.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.records.remove(name).map(|(_, record)| record.payload)
    }

    /// The raw validity flag, `None` when unset or when there is no record.
    pub fn validity(&self, name: &str) -> Option<bool> {
        self.records.get(name).and_then(|record| record.valid)
    }

    /// Names of all records, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Store for MemoryStore {
    fn exists(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    fn payload(&self, name: &str) -> Option<Value> {
        self.records.get(name).map(|record| record.payload.clone())
    }

    fn set_payload(&self, name: &str, payload: Value) -> bool {
        match self.records.get_mut(name) {
            Some(mut record) => {
                record.payload = payload;
                true
            }
            None => false,
        }
    }

    fn is_valid(&self, name: &str) -> bool {
        self.validity(name).unwrap_or(false)
    }

    fn set_valid(&self, name: &str, valid: bool) -> bool {
        match self.records.get_mut(name) {
            Some(mut record) => {
                record.valid = Some(valid);
                true
            }
            None => false,
        }
    }
}
