//! Query execution.
//!
//! Answers "entities of kind K reachable from entity E" by looking up the
//! strategy for `(E.kind, K)` and expanding its route level by level through
//! the relation index. Frontiers are sets, so nothing is counted twice.

use std::collections::BTreeSet;

use crate::entity::{EntityId, EntityKind};
use crate::error::{GraphResult, ValidationError};
use crate::storage::{EntityStore, RelationIndex};

use super::rules::{strategy_for, Route, Strategy};
use super::ActivityFilter;

/// Read-only query engine over any store implementing both storage traits.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> QueryEngine<'a, S>
where
    S: EntityStore + RelationIndex + ?Sized,
{
    /// Wrap a store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// All entities of `kind` related to `origin`.
    ///
    /// # Errors
    /// `BadParameter` (validation) if `origin` does not exist or `kind` is invalid.
    pub fn get_entities(&self, kind: EntityKind, origin: EntityId) -> GraphResult<BTreeSet<EntityId>> {
        if !origin.is_all() && !self.store.contains(origin) {
            return Err(ValidationError::UnknownOrigin { id: origin }.into());
        }
        if !kind.is_valid() {
            return Err(ValidationError::InvalidKind { kind }.into());
        }

        if origin.is_all() {
            return Ok(self.store.entities_of_kind(kind).clone());
        }

        let origin_kind = self.store.get(origin)?.kind;
        Ok(match strategy_for(origin_kind, kind) {
            Strategy::Reflexive => BTreeSet::from([origin]),
            Strategy::Unrelated => BTreeSet::new(),
            strategy => strategy
                .route()
                .map_or_else(BTreeSet::new, |route| self.expand(origin, route)),
        })
    }

    /// Same as [`QueryEngine::get_entities`], keeping only entities accepted by `filter`.
    ///
    /// # Errors
    /// Same as [`QueryEngine::get_entities`].
    pub fn get_entities_filtered(
        &self,
        kind: EntityKind,
        origin: EntityId,
        filter: ActivityFilter,
    ) -> GraphResult<BTreeSet<EntityId>> {
        let mut ids = self.get_entities(kind, origin)?;
        if filter != ActivityFilter::All {
            ids.retain(|id| {
                self.store
                    .get(*id)
                    .is_ok_and(|entity| filter.accepts(entity.active))
            });
        }
        Ok(ids)
    }

    fn expand(&self, origin: EntityId, route: Route) -> BTreeSet<EntityId> {
        let mut frontier = BTreeSet::from([origin]);
        for hop in route {
            let mut next = BTreeSet::new();
            for &id in &frontier {
                for &kind in *hop {
                    next.extend(self.store.neighbors(id, kind).iter().copied());
                }
            }
            if next.is_empty() {
                return next;
            }
            frontier = next;
        }
        frontier
    }
}
