//! Lock-protected shared graph.
//!
//! One coarse reader/writer lock guards the entity store and the relation
//! index together. A writer closure runs to completion under the write guard,
//! so readers never observe a half-applied notification.

use std::sync::RwLock;

use crate::storage::memory::InMemoryGraph;
use crate::storage::traits::StorageError;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Thread-safe owner of the entity graph.
#[derive(Debug, Default)]
pub struct Database {
    graph: RwLock<InMemoryGraph>,
}

impl Database {
    /// Create a new empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` under the read guard.
    ///
    /// Any number of readers may run concurrently; they serialize against writers.
    pub fn read<R>(&self, f: impl FnOnce(&InMemoryGraph) -> R) -> Result<R, StorageError> {
        let guard = self.graph.read().map_err(|_| lock_err("graph.read"))?;
        Ok(f(&guard))
    }

    /// Run `f` under the write guard as one indivisible update.
    ///
    /// `f` must validate before mutating: an error returned after a partial
    /// mutation would leave that mutation visible.
    pub fn write<R>(&self, f: impl FnOnce(&mut InMemoryGraph) -> R) -> Result<R, StorageError> {
        let mut guard = self.graph.write().map_err(|_| lock_err("graph.write"))?;
        Ok(f(&mut guard))
    }

    /// Clone of the whole graph taken under one read guard.
    pub fn snapshot(&self) -> Result<InMemoryGraph, StorageError> {
        self.read(InMemoryGraph::clone)
    }
}
