//! Monitor backend facade.
//!
//! [`MonitorBackend`] owns the graph, the discovery worker and the discovery
//! counter. Monitors are started per domain number; each one gets a domain
//! entity that discovery notifications address.
//!
//! Lock order is monitors, then graph, then counter. The count moves under the
//! same write guard as the mutation that caused it, so waiters only ever see
//! counts of a serialized graph. Listener callbacks run after the graph guard
//! is released.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::discovery::queue::{DiscoveryQueue, NotificationSink};
use crate::discovery::{
    CancellationToken, DiscoveryCounter, DiscoveryEvent, DiscoveryListener, DiscoveryNotification, Ingestor,
};
use crate::entity::{Entity, EntityAttributes, EntityId, EntityKind};
use crate::error::{GraphError, GraphResult, ValidationError};
use crate::lifecycle::{StateChange, StateMachine, Transition};
use crate::query::{ActivityFilter, QueryEngine};
use crate::storage::{Database, EntityStore, InMemoryGraph};

fn lock_err(context: &'static str) -> GraphError {
    GraphError::internal(format!("poisoned lock: {context}"))
}

struct MonitorEntry {
    domain_number: u32,
    listener: Option<Arc<dyn DiscoveryListener>>,
}

#[derive(Default)]
struct BackendCore {
    db: Database,
    counter: DiscoveryCounter,
    monitors: RwLock<HashMap<EntityId, MonitorEntry>>,
}

impl BackendCore {
    fn listener(&self, domain: EntityId) -> GraphResult<Option<Arc<dyn DiscoveryListener>>> {
        let monitors = self.monitors.read().map_err(|_| lock_err("monitors.read"))?;
        Ok(monitors.get(&domain).and_then(|m| m.listener.clone()))
    }

    /// Turn state changes into counted events and add their delta to the
    /// counter. Callers hold the graph write guard.
    fn count(&self, domain: EntityId, changes: &[StateChange]) -> GraphResult<Vec<DiscoveryEvent>> {
        let events: Vec<DiscoveryEvent> = changes
            .iter()
            .filter(|c| c.kind.is_discoverable())
            .map(|c| DiscoveryEvent {
                domain,
                entity: c.id,
                kind: c.kind,
                count_delta: c.count_delta(),
            })
            .collect();

        let delta = events.iter().map(|e| e.count_delta).sum();
        self.counter.add(delta)?;
        Ok(events)
    }

    fn apply_notification(&self, notification: &DiscoveryNotification) -> GraphResult<Vec<DiscoveryEvent>> {
        let domain = notification.domain;
        let events = self.db.write(|g| -> GraphResult<Vec<DiscoveryEvent>> {
            let changes = Ingestor::new(g).ingest(notification)?;
            self.count(domain, &changes)
        })??;
        debug!(
            %domain,
            kind = %notification.entity.kind(),
            status = ?notification.status,
            counted = events.len(),
            "notification applied"
        );
        let listener = self.listener(domain)?;
        dispatch(listener.as_ref(), &events);
        Ok(events)
    }
}

fn dispatch(listener: Option<&Arc<dyn DiscoveryListener>>, events: &[DiscoveryEvent]) {
    if let Some(listener) = listener {
        for event in events {
            listener.on_discovery(event);
        }
    }
}

impl NotificationSink for BackendCore {
    fn apply(&self, notification: DiscoveryNotification) -> GraphResult<()> {
        self.apply_notification(&notification).map(|_| ())
    }
}

/// Discovery-driven entity graph with monitor control and queries.
///
/// # Examples
///
/// ```
/// use ddsgraph::{EntityId, EntityKind, MonitorBackend};
///
/// let backend = MonitorBackend::with_default_config().unwrap();
/// let domain = backend.start_monitor(0, None).unwrap();
/// let domains = backend.get_entity_ids(EntityKind::Domain, EntityId::all()).unwrap();
/// assert!(domains.contains(&domain));
/// assert!(backend.is_active(domain).unwrap());
/// ```
pub struct MonitorBackend {
    core: Arc<BackendCore>,
    queue: DiscoveryQueue,
    config: BackendConfig,
}

impl fmt::Debug for MonitorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorBackend")
            .field("config", &self.config)
            .field("rejected_notifications", &self.queue.rejected())
            .finish_non_exhaustive()
    }
}

impl MonitorBackend {
    /// Create a backend and start its discovery worker.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` does not validate; internal error if the
    /// worker thread cannot be spawned.
    pub fn new(config: BackendConfig) -> GraphResult<Self> {
        config.validate()?;
        let core = Arc::new(BackendCore::default());
        let queue = DiscoveryQueue::start(&config, Arc::clone(&core) as Arc<dyn NotificationSink>)?;
        info!(
            queue_capacity = queue.capacity(),
            worker = %config.worker_thread_name,
            "monitor backend started"
        );
        Ok(Self { core, queue, config })
    }

    /// Create a backend with [`BackendConfig::default`].
    ///
    /// # Errors
    /// Same as [`MonitorBackend::new`].
    pub fn with_default_config() -> GraphResult<Self> {
        Self::new(BackendConfig::default())
    }

    /// The configuration this backend runs with.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Monitor control
    // ---------------------------------------------------------------------

    /// Start monitoring `domain_number` and return the new domain entity.
    ///
    /// A stopped monitor for the same number does not block a restart; the
    /// restart gets a fresh domain entity.
    ///
    /// # Errors
    /// `MonitorAlreadyRunning` if a running monitor exists for the number.
    pub fn start_monitor(
        &self,
        domain_number: u32,
        listener: Option<Arc<dyn DiscoveryListener>>,
    ) -> GraphResult<EntityId> {
        let mut monitors = self
            .core
            .monitors
            .write()
            .map_err(|_| lock_err("monitors.write"))?;

        let id = self.core.db.write(|g| -> GraphResult<EntityId> {
            for (&id, entry) in monitors.iter() {
                if entry.domain_number == domain_number && g.is_active(id)? {
                    return Err(ValidationError::MonitorAlreadyRunning { domain_number, id }.into());
                }
            }
            Ok(g.create(
                EntityKind::Domain,
                &domain_number.to_string(),
                EntityAttributes::Domain { domain_number },
            )?)
        })??;

        monitors.insert(
            id,
            MonitorEntry {
                domain_number,
                listener,
            },
        );
        info!(%id, domain_number, "monitor started");
        Ok(id)
    }

    /// Stop the monitor of `domain`: the domain and everything it owns become
    /// inactive. Relations are kept; stopping twice is a no-op.
    ///
    /// # Errors
    /// `UnknownDomain` if `domain` is not a started monitor.
    pub fn stop_monitor(&self, domain: EntityId) -> GraphResult<()> {
        let listener = {
            let monitors = self.core.monitors.read().map_err(|_| lock_err("monitors.read"))?;
            let entry = monitors
                .get(&domain)
                .ok_or(ValidationError::UnknownDomain { id: domain })?;
            entry.listener.clone()
        };

        let (deactivated, events) = self.core.db.write(|g| -> GraphResult<_> {
            let changes = StateMachine::new(g).apply(Transition::DomainStopped(domain))?;
            Ok((changes.len(), self.core.count(domain, &changes)?))
        })??;
        dispatch(listener.as_ref(), &events);
        info!(%domain, deactivated, counted = events.len(), "monitor stopped");
        Ok(())
    }

    /// Remove `domain` and everything it owns from the graph. Physical
    /// entities and locators still used by another domain are kept.
    ///
    /// # Errors
    /// `UnknownDomain` if `domain` is not a started monitor.
    pub fn clear_monitor(&self, domain: EntityId) -> GraphResult<()> {
        let mut monitors = self
            .core
            .monitors
            .write()
            .map_err(|_| lock_err("monitors.write"))?;
        if !monitors.contains_key(&domain) {
            return Err(ValidationError::UnknownDomain { id: domain }.into());
        }

        let (removed, events) = self.core.db.write(|g| -> GraphResult<_> {
            let removed = StateMachine::new(g).clear_domain(domain)?;
            // Entities still active when removed leave the count.
            let changes: Vec<StateChange> = removed
                .iter()
                .filter(|e| e.active)
                .map(|e| StateChange {
                    id: e.id,
                    kind: e.kind,
                    active: false,
                })
                .collect();
            Ok((removed.len(), self.core.count(domain, &changes)?))
        })??;
        let entry = monitors.remove(&domain);
        drop(monitors);

        let listener = entry.and_then(|e| e.listener);
        dispatch(listener.as_ref(), &events);
        info!(%domain, removed, "monitor cleared");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Discovery
    // ---------------------------------------------------------------------

    /// Hand a notification to the discovery worker, blocking while the queue
    /// is full. Rejections are logged by the worker and counted in
    /// [`MonitorBackend::rejected_notifications`].
    ///
    /// # Errors
    /// `Disconnected` if the worker is gone.
    pub fn submit(&self, notification: DiscoveryNotification) -> GraphResult<()> {
        self.queue.submit(notification)
    }

    /// Like [`MonitorBackend::submit`] without blocking.
    ///
    /// # Errors
    /// `QueueFull` under back-pressure; `Disconnected` if the worker is gone.
    pub fn try_submit(&self, notification: DiscoveryNotification) -> GraphResult<()> {
        self.queue.try_submit(notification)
    }

    /// Wait until every notification submitted before this call is applied.
    ///
    /// # Errors
    /// `Disconnected` if the worker is gone.
    pub fn flush(&self) -> GraphResult<()> {
        self.queue.flush()
    }

    /// Apply a notification on the calling thread and return the counted
    /// events it produced.
    ///
    /// # Errors
    /// `UnknownDomain` / `RejectedNotification` if the notification is
    /// rejected; the graph is then unchanged.
    pub fn apply(&self, notification: &DiscoveryNotification) -> GraphResult<Vec<DiscoveryEvent>> {
        self.core.apply_notification(notification)
    }

    /// Notifications the worker rejected so far.
    #[must_use]
    pub fn rejected_notifications(&self) -> u64 {
        self.queue.rejected()
    }

    /// Current discovery count.
    ///
    /// # Errors
    /// Internal error if the counter lock is poisoned.
    pub fn discovery_count(&self) -> GraphResult<i64> {
        self.core.counter.get()
    }

    /// Shared handle on the discovery count.
    #[must_use]
    pub fn counter(&self) -> DiscoveryCounter {
        self.core.counter.clone()
    }

    /// Block until the discovery count satisfies `predicate`.
    ///
    /// # Errors
    /// `Cancelled` or `Timeout`, see [`DiscoveryCounter::wait_until`].
    pub fn wait_for_count<F>(&self, predicate: F, cancel: &CancellationToken, timeout: Option<Duration>) -> GraphResult<i64>
    where
        F: FnMut(i64) -> bool,
    {
        self.core.counter.wait_until(predicate, cancel, timeout)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Entities of `kind` related to `origin`, in id order.
    ///
    /// # Errors
    /// `BadParameter` if `origin` does not exist or `kind` is `Invalid`.
    pub fn get_entities(&self, kind: EntityKind, origin: EntityId) -> GraphResult<Vec<Entity>> {
        self.core.db.read(|g| -> GraphResult<Vec<Entity>> {
            let ids = QueryEngine::new(g).get_entities(kind, origin)?;
            ids.into_iter()
                .map(|id| g.get(id).cloned().map_err(GraphError::from))
                .collect()
        })?
    }

    /// Identifiers of the entities of `kind` related to `origin`.
    ///
    /// # Errors
    /// Same as [`MonitorBackend::get_entities`].
    pub fn get_entity_ids(&self, kind: EntityKind, origin: EntityId) -> GraphResult<BTreeSet<EntityId>> {
        self.core
            .db
            .read(|g| QueryEngine::new(g).get_entities(kind, origin))?
    }

    /// Same as [`MonitorBackend::get_entity_ids`], restricted by activity.
    ///
    /// # Errors
    /// Same as [`MonitorBackend::get_entities`].
    pub fn get_entity_ids_filtered(
        &self,
        kind: EntityKind,
        origin: EntityId,
        filter: ActivityFilter,
    ) -> GraphResult<BTreeSet<EntityId>> {
        self.core
            .db
            .read(|g| QueryEngine::new(g).get_entities_filtered(kind, origin, filter))?
    }

    /// Active flag of an entity.
    ///
    /// # Errors
    /// `NotFound` if `id` names no entity.
    pub fn is_active(&self, id: EntityId) -> GraphResult<bool> {
        Ok(self.core.db.read(|g| g.is_active(id))??)
    }

    /// A copy of an entity.
    ///
    /// # Errors
    /// `NotFound` if `id` names no entity.
    pub fn get_entity(&self, id: EntityId) -> GraphResult<Entity> {
        Ok(self.core.db.read(|g| g.get(id).cloned())??)
    }

    /// JSON description of an entity and the number of related entities of
    /// every other kind. For [`EntityId::all`], the number of entities per
    /// kind and the discovery count.
    ///
    /// # Errors
    /// `NotFound` if `id` names no entity.
    pub fn get_info(&self, id: EntityId) -> GraphResult<Value> {
        if id.is_all() {
            let mut entities = Map::new();
            self.core.db.read(|g| {
                for kind in EntityKind::VALID {
                    entities.insert(kind.as_str().to_string(), json!(g.entities_of_kind(kind).len()));
                }
            })?;
            return Ok(json!({
                "entities": entities,
                "discovery_count": self.discovery_count()?,
            }));
        }

        self.core.db.read(|g| -> GraphResult<Value> {
            let entity = g.get(id)?;
            let mut info = serde_json::to_value(entity)
                .map_err(|e| GraphError::internal(format!("cannot serialize entity {id}: {e}")))?;

            let q = QueryEngine::new(g);
            let mut related = Map::new();
            for kind in EntityKind::VALID {
                if kind == entity.kind {
                    continue;
                }
                let n = q.get_entities(kind, id)?.len();
                if n > 0 {
                    related.insert(kind.as_str().to_string(), json!(n));
                }
            }
            if let Value::Object(map) = &mut info {
                map.insert("related".to_string(), Value::Object(related));
            }
            Ok(info)
        })?
    }

    /// Consistent copy of the whole graph.
    ///
    /// # Errors
    /// Storage error if the graph lock is poisoned.
    pub fn snapshot(&self) -> GraphResult<InMemoryGraph> {
        Ok(self.core.db.snapshot()?)
    }
}
