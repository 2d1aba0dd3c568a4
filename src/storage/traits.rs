//! Abstract storage traits for ddsgraph.
//!
//! The entity store and the relation index are two views over one shared
//! structure guarded by a single lock (see [`crate::storage::Database`]), so
//! the traits take `&self` / `&mut self` and leave locking to the caller.
//! Query and lifecycle code is written against these traits only.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::entity::{Entity, EntityAttributes, EntityId, EntityKind, Guid};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No identifiers left to hand out.
    #[error("Entity id space exhausted")]
    IdSpaceExhausted,

    /// A mutation would break a graph invariant.
    #[error("Inconsistent graph mutation: {reason}")]
    Inconsistent {
        /// What went wrong.
        reason: String,
    },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

impl StorageError {
    pub(crate) fn inconsistent(reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            reason: reason.into(),
        }
    }

    /// Invariant violations, id exhaustion and poisoned locks cannot be recovered from.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::EntityNotFound(_))
    }
}

/// Storage trait for entities.
///
/// Entities are never removed except through [`EntityStore::remove`], which is
/// reserved for clearing a whole monitored domain.
pub trait EntityStore {
    /// Create a new active entity and return its identifier.
    ///
    /// # Errors
    /// - `IdSpaceExhausted`: no identifiers left (fatal).
    fn create(
        &mut self,
        kind: EntityKind,
        name: &str,
        attributes: EntityAttributes,
    ) -> Result<EntityId, StorageError>;

    /// Get an entity by ID.
    fn get(&self, id: EntityId) -> Result<&Entity, StorageError>;

    /// Returns true if the id names an existing entity.
    fn contains(&self, id: EntityId) -> bool;

    /// All entities ever created of a kind, active or not.
    fn entities_of_kind(&self, kind: EntityKind) -> &BTreeSet<EntityId>;

    /// Entities of `kind` whose name is exactly `name`.
    fn entities_named(&self, kind: EntityKind, name: &str) -> &BTreeSet<EntityId>;

    /// Participants and endpoints carrying `guid`.
    fn entities_with_guid(&self, guid: Guid) -> &BTreeSet<EntityId>;

    /// Active flag of an entity.
    fn is_active(&self, id: EntityId) -> Result<bool, StorageError> {
        self.get(id).map(|e| e.active)
    }

    /// Set the active flag. Returns true if the flag changed.
    fn set_active(&mut self, id: EntityId, active: bool) -> Result<bool, StorageError>;

    /// Physically remove an entity together with all its relations.
    fn remove(&mut self, id: EntityId) -> Result<Entity, StorageError>;
}

/// Storage trait for relations between entities.
///
/// Edges are recorded in both directions so ancestor and descendant walks are
/// one lookup per hop.
pub trait RelationIndex {
    /// Add the edge between `a` and `b`. Returns false if it already existed.
    ///
    /// # Errors
    /// - `EntityNotFound`: either endpoint is unknown
    /// - `Inconsistent`: the kind pair is not a legal edge, or the child already
    ///   has a different parent of that kind
    fn bind(&mut self, a: EntityId, b: EntityId) -> Result<bool, StorageError>;

    /// Remove the edge between `a` and `b`. Returns false if it did not exist.
    ///
    /// # Errors
    /// - `Inconsistent`: the edge is immutable (only locator bindings can be removed)
    fn unbind(&mut self, a: EntityId, b: EntityId) -> Result<bool, StorageError>;

    /// Direct neighbors of `id` with the given kind; empty if none.
    fn neighbors(&self, id: EntityId, kind: EntityKind) -> &BTreeSet<EntityId>;
}
