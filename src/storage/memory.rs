//! In-memory storage backend.
//!
//! [`InMemoryGraph`] implements both [`EntityStore`] and [`RelationIndex`] over
//! one arena of entities indexed by id, plus a per-entity adjacency map keyed
//! by neighbor kind. Secondary indexes by kind, name and GUID are maintained on
//! create and remove. It is not synchronized; [`crate::storage::Database`]
//! puts it behind a single lock.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::entity::{Entity, EntityAttributes, EntityId, EntityKind, Guid};
use crate::storage::relation::edge_rule;
use crate::storage::traits::{EntityStore, RelationIndex, StorageError};

static EMPTY: BTreeSet<EntityId> = BTreeSet::new();

type Adjacency = HashMap<EntityKind, BTreeSet<EntityId>>;

/// Arena + adjacency index holding the whole entity graph.
#[derive(Debug, Clone)]
pub struct InMemoryGraph {
    entities: HashMap<EntityId, Entity>,
    by_kind: HashMap<EntityKind, BTreeSet<EntityId>>,
    by_name: HashMap<EntityKind, HashMap<String, BTreeSet<EntityId>>>,
    by_guid: HashMap<Guid, BTreeSet<EntityId>>,
    relations: HashMap<EntityId, Adjacency>,
    last_id: EntityId,
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            by_kind: HashMap::new(),
            by_name: HashMap::new(),
            by_guid: HashMap::new(),
            relations: HashMap::new(),
            last_id: EntityId::all(),
        }
    }
}

impl InMemoryGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the graph holds no entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over every stored entity in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, StorageError> {
        self.entities
            .get_mut(&id)
            .ok_or(StorageError::EntityNotFound(id))
    }

    fn kind_of(&self, id: EntityId) -> Result<EntityKind, StorageError> {
        self.get(id).map(|e| e.kind)
    }

    fn link(&mut self, from: EntityId, to: EntityId, to_kind: EntityKind) -> bool {
        self.relations
            .entry(from)
            .or_default()
            .entry(to_kind)
            .or_default()
            .insert(to)
    }

    fn unlink(&mut self, from: EntityId, to: EntityId, to_kind: EntityKind) -> bool {
        let Some(adj) = self.relations.get_mut(&from) else {
            return false;
        };
        let Some(set) = adj.get_mut(&to_kind) else {
            return false;
        };
        let removed = set.remove(&to);
        if set.is_empty() {
            adj.remove(&to_kind);
        }
        removed
    }
}

impl EntityStore for InMemoryGraph {
    fn create(
        &mut self,
        kind: EntityKind,
        name: &str,
        attributes: EntityAttributes,
    ) -> Result<EntityId, StorageError> {
        if !kind.is_valid() {
            return Err(StorageError::inconsistent(format!(
                "cannot create an entity of kind '{kind}'"
            )));
        }
        let id = self
            .last_id
            .successor()
            .ok_or(StorageError::IdSpaceExhausted)?;
        self.last_id = id;

        let entity = Entity::new(id, kind, name, attributes);
        if let Some(guid) = entity.guid() {
            self.by_guid.entry(guid).or_default().insert(id);
        }
        self.by_kind.entry(kind).or_default().insert(id);
        self.by_name
            .entry(kind)
            .or_default()
            .entry(name.to_string())
            .or_default()
            .insert(id);
        self.entities.insert(id, entity);
        debug!(%id, %kind, name, "entity created");
        Ok(id)
    }

    fn get(&self, id: EntityId) -> Result<&Entity, StorageError> {
        self.entities.get(&id).ok_or(StorageError::EntityNotFound(id))
    }

    fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn entities_of_kind(&self, kind: EntityKind) -> &BTreeSet<EntityId> {
        self.by_kind.get(&kind).unwrap_or(&EMPTY)
    }

    fn entities_named(&self, kind: EntityKind, name: &str) -> &BTreeSet<EntityId> {
        self.by_name
            .get(&kind)
            .and_then(|names| names.get(name))
            .unwrap_or(&EMPTY)
    }

    fn entities_with_guid(&self, guid: Guid) -> &BTreeSet<EntityId> {
        self.by_guid.get(&guid).unwrap_or(&EMPTY)
    }

    fn set_active(&mut self, id: EntityId, active: bool) -> Result<bool, StorageError> {
        Ok(self.entity_mut(id)?.set_active(active))
    }

    fn remove(&mut self, id: EntityId) -> Result<Entity, StorageError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(StorageError::EntityNotFound(id))?;

        if let Some(set) = self.by_kind.get_mut(&entity.kind) {
            set.remove(&id);
            if set.is_empty() {
                self.by_kind.remove(&entity.kind);
            }
        }

        if let Some(names) = self.by_name.get_mut(&entity.kind) {
            if let Some(set) = names.get_mut(&entity.name) {
                set.remove(&id);
                if set.is_empty() {
                    names.remove(&entity.name);
                }
            }
        }
        if let Some(guid) = entity.guid() {
            if let Some(set) = self.by_guid.get_mut(&guid) {
                set.remove(&id);
                if set.is_empty() {
                    self.by_guid.remove(&guid);
                }
            }
        }

        if let Some(adj) = self.relations.remove(&id) {
            for neighbor in adj.into_values().flatten() {
                self.unlink(neighbor, id, entity.kind);
            }
        }

        debug!(%id, kind = %entity.kind, "entity removed");
        Ok(entity)
    }
}

impl RelationIndex for InMemoryGraph {
    fn bind(&mut self, a: EntityId, b: EntityId) -> Result<bool, StorageError> {
        let a_kind = self.kind_of(a)?;
        let b_kind = self.kind_of(b)?;
        let (rule, a_is_parent) = edge_rule(a_kind, b_kind).ok_or_else(|| {
            StorageError::inconsistent(format!("no relation between {a_kind} and {b_kind}"))
        })?;
        let (parent, child) = if a_is_parent { (a, b) } else { (b, a) };

        if self.neighbors(child, rule.parent).contains(&parent) {
            return Ok(false);
        }

        if rule.kind.is_single_parent() {
            if let Some(existing) = self.neighbors(child, rule.parent).iter().next() {
                return Err(StorageError::inconsistent(format!(
                    "{} {child} already belongs to {} {existing}, refusing {parent}",
                    rule.child, rule.parent
                )));
            }
        }

        self.link(parent, child, rule.child);
        self.link(child, parent, rule.parent);
        debug!(%parent, %child, edge = ?rule.kind, "relation bound");
        Ok(true)
    }

    fn unbind(&mut self, a: EntityId, b: EntityId) -> Result<bool, StorageError> {
        let a_kind = self.kind_of(a)?;
        let b_kind = self.kind_of(b)?;
        let (rule, _) = edge_rule(a_kind, b_kind).ok_or_else(|| {
            StorageError::inconsistent(format!("no relation between {a_kind} and {b_kind}"))
        })?;
        if !rule.kind.is_removable() {
            return Err(StorageError::inconsistent(format!(
                "{:?} edges between {} and {} are immutable",
                rule.kind, rule.parent, rule.child
            )));
        }

        let removed = self.unlink(a, b, b_kind);
        self.unlink(b, a, a_kind);
        if removed {
            debug!(%a, %b, edge = ?rule.kind, "relation unbound");
        }
        Ok(removed)
    }

    fn neighbors(&self, id: EntityId, kind: EntityKind) -> &BTreeSet<EntityId> {
        self.relations
            .get(&id)
            .and_then(|adj| adj.get(&kind))
            .unwrap_or(&EMPTY)
    }
}
