//! Active/inactive lifecycle of entities.
//!
//! Entities start active. Discovery notifications move them between active
//! and inactive; stopping a domain deactivates it and everything below it.
//! Relations are never touched here, except by [`StateMachine::clear_domain`]
//! which physically removes a domain and what it owns.
//!
//! Activity is kept consistent along derived edges:
//! - an active participant, endpoint, topic or locator keeps its containment
//!   ancestors active (a stopped domain is never reactivated);
//! - a host, user, process, locator, or a topic with endpoints, is inactive
//!   once all of its children are inactive;
//! - a participant going away takes its endpoints with it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::GraphResult;
use crate::query::QueryEngine;
use crate::storage::{EntityStore, RelationIndex, StorageError};

/// Lifecycle transition requested by discovery or by monitor control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Transition {
    /// The entity was (re)discovered.
    DiscoveryAppeared(EntityId),
    /// Discovery reported the entity gone.
    DiscoveryDisappeared(EntityId),
    /// The monitor of the domain was stopped.
    DomainStopped(EntityId),
}

/// One effective change of an entity's active flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Entity whose flag changed.
    pub id: EntityId,
    /// Its kind.
    pub kind: EntityKind,
    /// The new value of the flag.
    pub active: bool,
}

impl StateChange {
    /// `+1` for an activation, `-1` for a deactivation.
    #[must_use]
    pub const fn count_delta(&self) -> i64 {
        if self.active {
            1
        } else {
            -1
        }
    }
}

const ENDPOINT_KINDS: &[EntityKind] = &[EntityKind::DataWriter, EntityKind::DataReader];

/// Kinds whose activity `kind` keeps alive.
const fn activation_targets(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::Participant => &[EntityKind::Process],
        EntityKind::Process => &[EntityKind::User],
        EntityKind::User => &[EntityKind::Host],
        EntityKind::DataWriter | EntityKind::DataReader => {
            &[EntityKind::Participant, EntityKind::Topic, EntityKind::Locator]
        }
        _ => &[],
    }
}

/// Parents whose activity is derived from children of `kind`.
const fn dependents(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::Participant => &[EntityKind::Process],
        EntityKind::Process => &[EntityKind::User],
        EntityKind::User => &[EntityKind::Host],
        EntityKind::DataWriter | EntityKind::DataReader => &[EntityKind::Topic, EntityKind::Locator],
        _ => &[],
    }
}

/// Child kinds a derived entity of `kind` looks at.
const fn derived_from(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::Host => &[EntityKind::User],
        EntityKind::User => &[EntityKind::Process],
        EntityKind::Process => &[EntityKind::Participant],
        EntityKind::Topic | EntityKind::Locator => ENDPOINT_KINDS,
        _ => &[],
    }
}

/// Applies lifecycle transitions to a store, collecting effective changes.
#[derive(Debug)]
pub struct StateMachine<'a, S: ?Sized> {
    store: &'a mut S,
    changes: Vec<StateChange>,
}

impl<'a, S> StateMachine<'a, S>
where
    S: EntityStore + RelationIndex + ?Sized,
{
    /// Wrap a store.
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            changes: Vec::new(),
        }
    }

    /// Apply a transition and return every flag that actually changed,
    /// including propagated ones. Applying the same transition twice yields
    /// no changes the second time.
    ///
    /// # Errors
    /// - `EntityNotFound` if the entity is unknown
    /// - `Inconsistent` if a domain is targeted by a discovery transition, or a
    ///   non-domain by `DomainStopped`
    pub fn apply(mut self, transition: Transition) -> GraphResult<Vec<StateChange>> {
        match transition {
            Transition::DiscoveryAppeared(id) => {
                self.expect_not_domain(id)?;
                self.activate(id)?;
            }
            Transition::DiscoveryDisappeared(id) => {
                self.expect_not_domain(id)?;
                self.deactivate(id)?;
            }
            Transition::DomainStopped(domain) => self.stop_domain(domain)?,
        }
        Ok(self.changes)
    }

    /// Recompute the flag of locators whose bindings just changed: a locator
    /// is active iff one of its bound endpoints is.
    ///
    /// # Errors
    /// `EntityNotFound` if a locator is unknown.
    pub fn rederive_locators(mut self, locators: &BTreeSet<EntityId>) -> Result<Vec<StateChange>, StorageError> {
        for &locator in locators {
            let active = self.has_active_child(locator, EntityKind::Locator)?;
            self.set(locator, active)?;
        }
        Ok(self.changes)
    }

    /// Physically remove a domain, its participants, topics and endpoints, and
    /// the locators, processes, users and hosts left without any remaining child.
    ///
    /// # Errors
    /// - `EntityNotFound` / `Inconsistent` if `domain` is not a domain
    pub fn clear_domain(self, domain: EntityId) -> GraphResult<Vec<Entity>> {
        self.expect_domain(domain)?;

        let (owned, orphans) = {
            let q = QueryEngine::new(&*self.store);
            let mut owned = BTreeSet::from([domain]);
            for kind in [
                EntityKind::Participant,
                EntityKind::Topic,
                EntityKind::DataWriter,
                EntityKind::DataReader,
            ] {
                owned.extend(q.get_entities(kind, domain)?);
            }

            // Children-first so a parent sees its children's verdict.
            let mut orphans = BTreeSet::new();
            for kind in [
                EntityKind::Locator,
                EntityKind::Process,
                EntityKind::User,
                EntityKind::Host,
            ] {
                for candidate in q.get_entities(kind, domain)? {
                    let all_children_gone = derived_from(kind).iter().all(|child_kind| {
                        self.store
                            .neighbors(candidate, *child_kind)
                            .iter()
                            .all(|c| owned.contains(c) || orphans.contains(c))
                    });
                    if all_children_gone {
                        orphans.insert(candidate);
                    }
                }
            }
            (owned, orphans)
        };

        let mut removed = Vec::with_capacity(owned.len() + orphans.len());
        for id in owned.into_iter().chain(orphans) {
            removed.push(self.store.remove(id)?);
        }
        info!(%domain, removed = removed.len(), "domain cleared");
        Ok(removed)
    }

    fn expect_domain(&self, id: EntityId) -> Result<(), StorageError> {
        let kind = self.store.get(id)?.kind;
        if kind == EntityKind::Domain {
            Ok(())
        } else {
            Err(StorageError::inconsistent(format!(
                "entity {id} is a {kind}, not a domain"
            )))
        }
    }

    fn expect_not_domain(&self, id: EntityId) -> Result<(), StorageError> {
        if self.store.get(id)?.kind == EntityKind::Domain {
            return Err(StorageError::inconsistent(format!(
                "domain {id} is not driven by discovery"
            )));
        }
        Ok(())
    }

    fn set(&mut self, id: EntityId, active: bool) -> Result<bool, StorageError> {
        let changed = self.store.set_active(id, active)?;
        if changed {
            let kind = self.store.get(id)?.kind;
            debug!(%id, %kind, active, "activity changed");
            self.changes.push(StateChange { id, kind, active });
        }
        Ok(changed)
    }

    fn activate(&mut self, id: EntityId) -> Result<(), StorageError> {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let kind = self.store.get(current)?.kind;
            if kind == EntityKind::Domain {
                continue;
            }
            self.set(current, true)?;
            for &target in activation_targets(kind) {
                for &parent in self.store.neighbors(current, target) {
                    if !self.store.is_active(parent)? {
                        pending.push(parent);
                    }
                }
            }
        }
        Ok(())
    }

    fn deactivate(&mut self, id: EntityId) -> Result<(), StorageError> {
        let kind = self.store.get(id)?.kind;
        if !self.set(id, false)? {
            return Ok(());
        }

        if kind == EntityKind::Participant {
            let endpoints: Vec<EntityId> = ENDPOINT_KINDS
                .iter()
                .flat_map(|k| self.store.neighbors(id, *k).iter().copied())
                .collect();
            for endpoint in endpoints {
                self.deactivate(endpoint)?;
            }
        }

        self.refresh_dependents(id, kind)
    }

    fn refresh_dependents(&mut self, id: EntityId, kind: EntityKind) -> Result<(), StorageError> {
        for &parent_kind in dependents(kind) {
            let parents: Vec<EntityId> = self.store.neighbors(id, parent_kind).iter().copied().collect();
            for parent in parents {
                if self.store.is_active(parent)? && !self.has_active_child(parent, parent_kind)? {
                    self.deactivate(parent)?;
                }
            }
        }
        Ok(())
    }

    fn has_active_child(&self, id: EntityId, kind: EntityKind) -> Result<bool, StorageError> {
        for &child_kind in derived_from(kind) {
            for &child in self.store.neighbors(id, child_kind) {
                if self.store.is_active(child)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn stop_domain(&mut self, domain: EntityId) -> GraphResult<()> {
        self.expect_domain(domain)?;

        let mut participants = BTreeSet::new();
        let mut owned = BTreeSet::new();
        {
            let q = QueryEngine::new(&*self.store);
            participants.extend(q.get_entities(EntityKind::Participant, domain)?);
            for kind in [
                EntityKind::Topic,
                EntityKind::DataWriter,
                EntityKind::DataReader,
                EntityKind::Locator,
            ] {
                owned.extend(q.get_entities(kind, domain)?);
            }
        }

        self.set(domain, false)?;
        for &id in participants.iter().chain(&owned) {
            self.set(id, false)?;
        }
        for participant in participants {
            self.refresh_dependents(participant, EntityKind::Participant)?;
        }
        info!(%domain, changes = self.changes.len(), "domain stopped");
        Ok(())
    }
}
