//! Per-monitor discovery callbacks.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind};

/// A counted state change, delivered after the graph lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    /// Monitored domain the change belongs to.
    pub domain: EntityId,
    /// Entity whose state changed.
    pub entity: EntityId,
    /// Kind of that entity (participant, topic or endpoint).
    pub kind: EntityKind,
    /// `+1` when it became active, `-1` when it became inactive.
    pub count_delta: i64,
}

/// Receives the discovery events of one monitored domain.
///
/// Callbacks run on the discovery worker (or on the caller of a synchronous
/// apply) and must not block for long.
pub trait DiscoveryListener: Send + Sync {
    /// Called once per counted state change.
    fn on_discovery(&self, event: &DiscoveryEvent);
}

impl<F> DiscoveryListener for F
where
    F: Fn(&DiscoveryEvent) + Send + Sync,
{
    fn on_discovery(&self, event: &DiscoveryEvent) {
        self(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    // Compile-time test: ensure the listener trait is object-safe
    fn _assert_listener_object_safe(_: &dyn DiscoveryListener) {}

    #[test]
    fn closures_are_listeners() {
        let seen = Mutex::new(Vec::new());
        let listener = |e: &DiscoveryEvent| seen.lock().unwrap().push(e.entity);
        listener.on_discovery(&DiscoveryEvent {
            domain: EntityId::from(1),
            entity: EntityId::from(2),
            kind: EntityKind::Topic,
            count_delta: 1,
        });
        assert_eq!(*seen.lock().unwrap(), vec![EntityId::from(2)]);
    }
}
