//! Legal edges of the entity graph.
//!
//! Every edge the relation index accepts is listed in [`EDGE_RULES`] with the
//! parent side, the child side and its semantics. Pairs not listed are not
//! edges at all; the writer↔reader match is derived through the topic and is
//! never stored.

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;

/// Semantics of a stored edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `HOST → USER → PROCESS → PARTICIPANT` strict tree.
    Containment,
    /// Participant or topic belonging to a domain.
    DomainMembership,
    /// Endpoint owned by a participant.
    Ownership,
    /// Endpoint referencing its topic.
    TopicBinding,
    /// Endpoint bound to a locator (many-to-many).
    LocatorBinding,
}

impl EdgeKind {
    /// Whether a child may have at most one parent through this edge.
    #[must_use]
    pub const fn is_single_parent(&self) -> bool {
        !matches!(self, Self::LocatorBinding)
    }

    /// Whether the edge may be removed once set.
    #[must_use]
    pub const fn is_removable(&self) -> bool {
        matches!(self, Self::LocatorBinding)
    }
}

/// One legal edge: `parent` kind, `child` kind and the edge semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRule {
    /// Owning side.
    pub parent: EntityKind,
    /// Owned side.
    pub child: EntityKind,
    /// Edge semantics.
    pub kind: EdgeKind,
}

const fn rule(parent: EntityKind, child: EntityKind, kind: EdgeKind) -> EdgeRule {
    EdgeRule {
        parent,
        child,
        kind,
    }
}

/// All legal edges.
pub const EDGE_RULES: [EdgeRule; 11] = [
    rule(EntityKind::Host, EntityKind::User, EdgeKind::Containment),
    rule(EntityKind::User, EntityKind::Process, EdgeKind::Containment),
    rule(EntityKind::Process, EntityKind::Participant, EdgeKind::Containment),
    rule(EntityKind::Domain, EntityKind::Participant, EdgeKind::DomainMembership),
    rule(EntityKind::Domain, EntityKind::Topic, EdgeKind::DomainMembership),
    rule(EntityKind::Participant, EntityKind::DataWriter, EdgeKind::Ownership),
    rule(EntityKind::Participant, EntityKind::DataReader, EdgeKind::Ownership),
    rule(EntityKind::Topic, EntityKind::DataWriter, EdgeKind::TopicBinding),
    rule(EntityKind::Topic, EntityKind::DataReader, EdgeKind::TopicBinding),
    rule(EntityKind::DataWriter, EntityKind::Locator, EdgeKind::LocatorBinding),
    rule(EntityKind::DataReader, EntityKind::Locator, EdgeKind::LocatorBinding),
];

/// Finds the rule for an unordered kind pair.
///
/// Returns the rule and whether `a` is the parent side.
#[must_use]
pub fn edge_rule(a: EntityKind, b: EntityKind) -> Option<(EdgeRule, bool)> {
    EDGE_RULES.iter().find_map(|r| {
        if r.parent == a && r.child == b {
            Some((*r, true))
        } else if r.parent == b && r.child == a {
            Some((*r, false))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_rule_is_symmetric() {
        let (r, a_is_parent) = edge_rule(EntityKind::Host, EntityKind::User).unwrap();
        assert_eq!(r.kind, EdgeKind::Containment);
        assert!(a_is_parent);

        let (r, a_is_parent) = edge_rule(EntityKind::Locator, EntityKind::DataReader).unwrap();
        assert_eq!(r.kind, EdgeKind::LocatorBinding);
        assert!(!a_is_parent);
    }

    #[test]
    fn test_match_is_not_a_stored_edge() {
        assert!(edge_rule(EntityKind::DataWriter, EntityKind::DataReader).is_none());
        assert!(edge_rule(EntityKind::Host, EntityKind::Participant).is_none());
        assert!(edge_rule(EntityKind::Host, EntityKind::Host).is_none());
    }

    #[test]
    fn test_only_locator_bindings_are_removable() {
        for r in EDGE_RULES {
            assert_eq!(r.kind.is_removable(), r.kind == EdgeKind::LocatorBinding);
            assert_eq!(r.kind.is_single_parent(), !r.kind.is_removable());
        }
    }

    #[test]
    fn test_each_pair_listed_once() {
        for (i, a) in EDGE_RULES.iter().enumerate() {
            for b in &EDGE_RULES[i + 1..] {
                let same = (a.parent == b.parent && a.child == b.child)
                    || (a.parent == b.child && a.child == b.parent);
                assert!(!same, "duplicate edge rule {a:?} / {b:?}");
            }
        }
    }
}
