//! Shared pairing state.
//!
//! # Data Flow
//! ```text
//! Coordinator::new
//!     → Mailboxes::new / IdRegistry::new (empty)
//!     → handles cloned into the route state
//!     → pairing handlers insert / look up / remove by key
//! ```
//!
//! # Design Decisions
//! - Each registry is a cheap clonable handle around `Arc<DashMap>`
//! - DashMap shards its own locks; callers never wrap it in another lock
//! - Lifetime equals the coordinator's; nothing is torn down explicitly

pub mod ids;
pub mod mailbox;

pub use ids::{IdRegistry, PairingSession};
pub use mailbox::{Mailbox, Mailboxes};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// A concurrency-safe map keyed by short strings.
#[derive(Debug)]
pub struct Registry<V> {
    inner: Arc<DashMap<String, V>>,
}

impl<V> Clone for Registry<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Registry<V> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.inner.insert(key.into(), value)
    }

    /// Insert only if the key is free. Returns whether the value was stored.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: V) -> bool {
        match self.inner.entry(key.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.remove(key).map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V: Clone> Registry<V> {
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }
}
