//! Applies discovery notifications to the graph.
//!
//! A notification is handled in two phases over the same write guard:
//! validation against the current graph (nothing is mutated, any problem
//! rejects the whole notification), then resolve-or-create of the entity and
//! its ancestors, locator refresh, and the lifecycle transition.
//!
//! Identity keys: hosts by name, users by (host, name), processes by
//! (user, name), participants and endpoints by GUID, topics by
//! (domain, name, data type), locators by address.

use std::collections::BTreeSet;

use crate::entity::{EntityAttributes, EntityId, EntityKind, Guid};
use crate::error::{GraphResult, ValidationError};
use crate::lifecycle::{StateChange, StateMachine, Transition};
use crate::storage::{EntityStore, RelationIndex, StorageError};

use super::notification::{
    DiscoveredEntity, DiscoveryNotification, DiscoveryStatus, EndpointInfo, ParticipantInfo, TopicInfo,
};

const ENDPOINT_KINDS: [EntityKind; 2] = [EntityKind::DataWriter, EntityKind::DataReader];

fn reject(reason: impl Into<String>) -> ValidationError {
    ValidationError::RejectedNotification {
        reason: reason.into(),
    }
}

/// Applies one notification and reports every state change it caused.
///
/// Creation of an entity counts as its activation.
#[derive(Debug)]
pub struct Ingestor<'a, S: ?Sized> {
    store: &'a mut S,
    changes: Vec<StateChange>,
}

impl<'a, S> Ingestor<'a, S>
where
    S: EntityStore + RelationIndex + ?Sized,
{
    /// Wrap a store. Callers hold the write guard for the whole call.
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            changes: Vec::new(),
        }
    }

    /// Validate and apply `notification`.
    ///
    /// # Errors
    /// - `UnknownDomain` if the addressed domain does not exist
    /// - `RejectedNotification` if the notification contradicts the graph
    ///   (GUID reused across kinds, participant moved, removal of an unknown entity)
    /// - storage errors only on id exhaustion
    pub fn ingest(mut self, notification: &DiscoveryNotification) -> GraphResult<Vec<StateChange>> {
        let domain = notification.domain;
        self.check_domain(domain)?;

        let existing = match &notification.entity {
            DiscoveredEntity::Participant(info) => self.validate_participant(domain, info)?,
            DiscoveredEntity::Topic(info) => {
                validate_name("topic", &info.name)?;
                self.find_topic(domain, info)
            }
            DiscoveredEntity::Reader(info) => self.validate_endpoint(domain, EntityKind::DataReader, info)?,
            DiscoveredEntity::Writer(info) => self.validate_endpoint(domain, EntityKind::DataWriter, info)?,
        };

        if notification.status == DiscoveryStatus::Removed {
            let id = existing.ok_or_else(|| {
                reject(format!(
                    "{} '{}' was never discovered",
                    notification.entity.kind(),
                    notification.entity.name()
                ))
            })?;
            self.transition(Transition::DiscoveryDisappeared(id))?;
            return Ok(self.changes);
        }

        let (id, created) = match existing {
            Some(id) => (id, false),
            None => (self.create_announced(domain, &notification.entity)?, true),
        };

        let touched = match &notification.entity {
            DiscoveredEntity::Reader(info) | DiscoveredEntity::Writer(info) => {
                self.refresh_locators(id, &info.locators)?
            }
            _ => BTreeSet::new(),
        };

        if created || notification.status == DiscoveryStatus::Discovered {
            self.transition(Transition::DiscoveryAppeared(id))?;
        }
        if !touched.is_empty() {
            let changes = StateMachine::new(&mut *self.store).rederive_locators(&touched)?;
            self.changes.extend(changes);
        }
        Ok(self.changes)
    }

    fn transition(&mut self, transition: Transition) -> GraphResult<()> {
        let changes = StateMachine::new(&mut *self.store).apply(transition)?;
        self.changes.extend(changes);
        Ok(())
    }

    fn check_domain(&self, domain: EntityId) -> Result<(), ValidationError> {
        match self.store.get(domain) {
            Ok(entity) if entity.kind == EntityKind::Domain => Ok(()),
            _ => Err(ValidationError::UnknownDomain { id: domain }),
        }
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    fn find_named(&self, candidates: &BTreeSet<EntityId>, name: &str) -> Option<EntityId> {
        candidates
            .iter()
            .copied()
            .find(|id| self.store.get(*id).is_ok_and(|e| e.name == name))
    }

    fn find_by_guid(&self, kinds: &[EntityKind], guid: Guid) -> Option<(EntityId, EntityKind)> {
        self.store.entities_with_guid(guid).iter().find_map(|id| {
            let kind = self.store.get(*id).ok()?.kind;
            kinds.contains(&kind).then_some((*id, kind))
        })
    }

    fn find_global(&self, kind: EntityKind, name: &str) -> Option<EntityId> {
        self.store.entities_named(kind, name).iter().next().copied()
    }

    fn find_topic(&self, domain: EntityId, info: &TopicInfo) -> Option<EntityId> {
        self.store
            .entities_named(EntityKind::Topic, &info.name)
            .iter()
            .copied()
            .find(|id| {
                self.store.neighbors(*id, EntityKind::Domain).contains(&domain)
                    && self.store.get(*id).is_ok_and(|e| {
                        matches!(&e.attributes, EntityAttributes::Topic { data_type } if *data_type == info.data_type)
                    })
            })
    }

    fn parent(&self, id: EntityId, kind: EntityKind) -> Option<EntityId> {
        self.store.neighbors(id, kind).iter().next().copied()
    }

    fn name_of(&self, id: Option<EntityId>) -> Option<&str> {
        id.and_then(|id| self.store.get(id).ok()).map(|e| e.name.as_str())
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    fn validate_participant(
        &self,
        domain: EntityId,
        info: &ParticipantInfo,
    ) -> Result<Option<EntityId>, ValidationError> {
        for (what, name) in [("host", &info.host), ("user", &info.user), ("process", &info.process)] {
            validate_name(what, name)?;
        }
        let Some((id, _)) = self.find_by_guid(&[EntityKind::Participant], info.guid) else {
            return Ok(None);
        };

        if self.parent(id, EntityKind::Domain) != Some(domain) {
            return Err(reject(format!(
                "participant {} already belongs to another domain",
                info.guid
            )));
        }

        let process = self.parent(id, EntityKind::Process);
        let user = process.and_then(|p| self.parent(p, EntityKind::User));
        let host = user.and_then(|u| self.parent(u, EntityKind::Host));
        let current = (self.name_of(host), self.name_of(user), self.name_of(process));
        let announced = (
            Some(info.host.as_str()),
            Some(info.user.as_str()),
            Some(info.process.as_str()),
        );
        if current != announced {
            return Err(reject(format!(
                "participant {} cannot move to {}/{}/{}",
                info.guid, info.host, info.user, info.process
            )));
        }
        Ok(Some(id))
    }

    fn validate_endpoint(
        &self,
        domain: EntityId,
        kind: EntityKind,
        info: &EndpointInfo,
    ) -> Result<Option<EntityId>, ValidationError> {
        validate_name("topic", &info.topic.name)?;
        if info.locators.iter().any(|l| l.trim().is_empty()) {
            return Err(reject(format!("{kind} {} announces an empty locator", info.guid)));
        }
        let participant = self.validate_participant(domain, &info.participant)?;

        let Some((id, found_kind)) = self.find_by_guid(&ENDPOINT_KINDS, info.guid) else {
            return Ok(None);
        };
        if found_kind != kind {
            return Err(reject(format!(
                "guid {} already names a {found_kind}, not a {kind}",
                info.guid
            )));
        }
        if participant.is_none() || self.parent(id, EntityKind::Participant) != participant {
            return Err(reject(format!(
                "{kind} {} cannot move to participant {}",
                info.guid, info.participant.guid
            )));
        }
        if self.parent(id, EntityKind::Topic) != self.find_topic(domain, &info.topic) {
            return Err(reject(format!(
                "{kind} {} cannot move to topic '{}'",
                info.guid, info.topic.name
            )));
        }
        Ok(Some(id))
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    fn create(&mut self, kind: EntityKind, name: &str, attributes: EntityAttributes) -> Result<EntityId, StorageError> {
        let id = self.store.create(kind, name, attributes)?;
        self.changes.push(StateChange { id, kind, active: true });
        Ok(id)
    }

    fn resolve_child(
        &mut self,
        parent: EntityId,
        kind: EntityKind,
        name: &str,
        attributes: EntityAttributes,
    ) -> Result<EntityId, StorageError> {
        if let Some(id) = self.find_named(self.store.neighbors(parent, kind), name) {
            return Ok(id);
        }
        let id = self.create(kind, name, attributes)?;
        self.store.bind(parent, id)?;
        Ok(id)
    }

    fn resolve_participant(&mut self, domain: EntityId, info: &ParticipantInfo) -> Result<EntityId, StorageError> {
        if let Some((id, _)) = self.find_by_guid(&[EntityKind::Participant], info.guid) {
            return Ok(id);
        }

        let host = match self.find_global(EntityKind::Host, &info.host) {
            Some(id) => id,
            None => self.create(EntityKind::Host, &info.host, EntityAttributes::None)?,
        };
        let user = self.resolve_child(host, EntityKind::User, &info.user, EntityAttributes::None)?;
        let process = self.resolve_child(
            user,
            EntityKind::Process,
            &info.process,
            EntityAttributes::Process {
                pid: info.pid.clone().unwrap_or_default(),
            },
        )?;

        let id = self.create(
            EntityKind::Participant,
            &info.name,
            EntityAttributes::Participant { guid: info.guid },
        )?;
        self.store.bind(process, id)?;
        self.store.bind(domain, id)?;
        Ok(id)
    }

    fn resolve_topic(&mut self, domain: EntityId, info: &TopicInfo) -> Result<EntityId, StorageError> {
        if let Some(id) = self.find_topic(domain, info) {
            return Ok(id);
        }
        let id = self.create(
            EntityKind::Topic,
            &info.name,
            EntityAttributes::Topic {
                data_type: info.data_type.clone(),
            },
        )?;
        self.store.bind(domain, id)?;
        Ok(id)
    }

    fn create_announced(&mut self, domain: EntityId, entity: &DiscoveredEntity) -> Result<EntityId, StorageError> {
        match entity {
            DiscoveredEntity::Participant(info) => self.resolve_participant(domain, info),
            DiscoveredEntity::Topic(info) => self.resolve_topic(domain, info),
            DiscoveredEntity::Reader(info) => self.create_endpoint(domain, EntityKind::DataReader, info),
            DiscoveredEntity::Writer(info) => self.create_endpoint(domain, EntityKind::DataWriter, info),
        }
    }

    fn create_endpoint(
        &mut self,
        domain: EntityId,
        kind: EntityKind,
        info: &EndpointInfo,
    ) -> Result<EntityId, StorageError> {
        let participant = self.resolve_participant(domain, &info.participant)?;
        let topic = self.resolve_topic(domain, &info.topic)?;
        let id = self.create(kind, &info.name, EntityAttributes::Endpoint { guid: info.guid })?;
        self.store.bind(participant, id)?;
        self.store.bind(topic, id)?;
        Ok(id)
    }

    /// Make the endpoint's locator bindings match `addresses`. Returns the
    /// locators whose bindings changed.
    fn refresh_locators(&mut self, endpoint: EntityId, addresses: &[String]) -> Result<BTreeSet<EntityId>, StorageError> {
        let mut wanted = BTreeSet::new();
        for address in addresses {
            let locator = match self.find_global(EntityKind::Locator, address) {
                Some(id) => id,
                None => self.create(EntityKind::Locator, address, EntityAttributes::None)?,
            };
            wanted.insert(locator);
        }

        let current = self.store.neighbors(endpoint, EntityKind::Locator).clone();
        let mut touched = BTreeSet::new();
        for &stale in current.difference(&wanted) {
            self.store.unbind(endpoint, stale)?;
            touched.insert(stale);
        }
        for &fresh in wanted.difference(&current) {
            self.store.bind(endpoint, fresh)?;
            touched.insert(fresh);
        }
        Ok(touched)
    }
}

fn validate_name(what: &str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(reject(format!("{what} name must not be empty")));
    }
    Ok(())
}
