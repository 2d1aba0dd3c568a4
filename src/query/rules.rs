//! Per kind-pair resolution rules.
//!
//! Every `(origin kind, target kind)` pair maps to a [`Strategy`]. Strategies
//! other than `Reflexive` and `Unrelated` carry a static route: a sequence of
//! hops, each hop being the set of kinds to expand the current frontier into
//! through the relation index. The last hop always ends on the target kind.

use serde::Serialize;

use crate::entity::EntityKind;

/// Set of kinds reached in one expansion step.
pub type Hop = &'static [EntityKind];

/// Sequence of expansion steps from the origin to the target kind.
pub type Route = &'static [Hop];

/// How a query for one kind pair is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "route", rename_all = "snake_case")]
pub enum Strategy {
    /// Same kind: the origin itself.
    Reflexive,
    /// Walk up the containment chain or to the owning domain/topic.
    Ancestor(Route),
    /// Breadth-first walk down containment and ownership edges.
    Descendant(Route),
    /// Direct endpoint↔locator neighbors, never expanded further.
    Adjacent(Route),
    /// Endpoints of the other kind sharing a topic with the origin.
    TopicMatch(Route),
    /// Cross-branch walk, down to a common relative and back up.
    Lateral(Route),
    /// No relation between the kinds.
    Unrelated,
}

impl Strategy {
    /// The route to expand, if the strategy has one.
    #[must_use]
    pub const fn route(&self) -> Option<Route> {
        match self {
            Self::Ancestor(r)
            | Self::Descendant(r)
            | Self::Adjacent(r)
            | Self::TopicMatch(r)
            | Self::Lateral(r) => Some(*r),
            Self::Reflexive | Self::Unrelated => None,
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRule {
    /// Kind of the origin entity.
    pub origin: EntityKind,
    /// Kind being asked for.
    pub target: EntityKind,
    /// How to answer.
    pub strategy: Strategy,
}

const HOST: Hop = &[EntityKind::Host];
const USER: Hop = &[EntityKind::User];
const PROCESS: Hop = &[EntityKind::Process];
const DOMAIN: Hop = &[EntityKind::Domain];
const PARTICIPANT: Hop = &[EntityKind::Participant];
const TOPIC: Hop = &[EntityKind::Topic];
const WRITER: Hop = &[EntityKind::DataWriter];
const READER: Hop = &[EntityKind::DataReader];
const ENDPOINTS: Hop = &[EntityKind::DataWriter, EntityKind::DataReader];
const LOCATOR: Hop = &[EntityKind::Locator];

const fn row(origin: EntityKind, target: EntityKind, strategy: Strategy) -> QueryRule {
    QueryRule {
        origin,
        target,
        strategy,
    }
}

use EntityKind as K;
use Strategy::{Adjacent, Ancestor, Descendant, Lateral, TopicMatch};

/// The complete rule table for distinct kind pairs.
pub static QUERY_RULES: &[QueryRule] = &[
    // Host
    row(K::Host, K::User, Descendant(&[USER])),
    row(K::Host, K::Process, Descendant(&[USER, PROCESS])),
    row(K::Host, K::Domain, Lateral(&[USER, PROCESS, PARTICIPANT, DOMAIN])),
    row(K::Host, K::Participant, Descendant(&[USER, PROCESS, PARTICIPANT])),
    row(K::Host, K::Topic, Lateral(&[USER, PROCESS, PARTICIPANT, ENDPOINTS, TOPIC])),
    row(K::Host, K::DataWriter, Descendant(&[USER, PROCESS, PARTICIPANT, WRITER])),
    row(K::Host, K::DataReader, Descendant(&[USER, PROCESS, PARTICIPANT, READER])),
    row(K::Host, K::Locator, Descendant(&[USER, PROCESS, PARTICIPANT, ENDPOINTS, LOCATOR])),
    // User
    row(K::User, K::Host, Ancestor(&[HOST])),
    row(K::User, K::Process, Descendant(&[PROCESS])),
    row(K::User, K::Domain, Lateral(&[PROCESS, PARTICIPANT, DOMAIN])),
    row(K::User, K::Participant, Descendant(&[PROCESS, PARTICIPANT])),
    row(K::User, K::Topic, Lateral(&[PROCESS, PARTICIPANT, ENDPOINTS, TOPIC])),
    row(K::User, K::DataWriter, Descendant(&[PROCESS, PARTICIPANT, WRITER])),
    row(K::User, K::DataReader, Descendant(&[PROCESS, PARTICIPANT, READER])),
    row(K::User, K::Locator, Descendant(&[PROCESS, PARTICIPANT, ENDPOINTS, LOCATOR])),
    // Process
    row(K::Process, K::Host, Ancestor(&[USER, HOST])),
    row(K::Process, K::User, Ancestor(&[USER])),
    row(K::Process, K::Domain, Lateral(&[PARTICIPANT, DOMAIN])),
    row(K::Process, K::Participant, Descendant(&[PARTICIPANT])),
    row(K::Process, K::Topic, Lateral(&[PARTICIPANT, ENDPOINTS, TOPIC])),
    row(K::Process, K::DataWriter, Descendant(&[PARTICIPANT, WRITER])),
    row(K::Process, K::DataReader, Descendant(&[PARTICIPANT, READER])),
    row(K::Process, K::Locator, Descendant(&[PARTICIPANT, ENDPOINTS, LOCATOR])),
    // Domain
    row(K::Domain, K::Host, Lateral(&[PARTICIPANT, PROCESS, USER, HOST])),
    row(K::Domain, K::User, Lateral(&[PARTICIPANT, PROCESS, USER])),
    row(K::Domain, K::Process, Lateral(&[PARTICIPANT, PROCESS])),
    row(K::Domain, K::Participant, Descendant(&[PARTICIPANT])),
    row(K::Domain, K::Topic, Descendant(&[TOPIC])),
    row(K::Domain, K::DataWriter, Descendant(&[PARTICIPANT, WRITER])),
    row(K::Domain, K::DataReader, Descendant(&[PARTICIPANT, READER])),
    row(K::Domain, K::Locator, Descendant(&[PARTICIPANT, ENDPOINTS, LOCATOR])),
    // Participant
    row(K::Participant, K::Host, Ancestor(&[PROCESS, USER, HOST])),
    row(K::Participant, K::User, Ancestor(&[PROCESS, USER])),
    row(K::Participant, K::Process, Ancestor(&[PROCESS])),
    row(K::Participant, K::Domain, Ancestor(&[DOMAIN])),
    row(K::Participant, K::Topic, Lateral(&[ENDPOINTS, TOPIC])),
    row(K::Participant, K::DataWriter, Descendant(&[WRITER])),
    row(K::Participant, K::DataReader, Descendant(&[READER])),
    row(K::Participant, K::Locator, Descendant(&[ENDPOINTS, LOCATOR])),
    // Topic
    row(K::Topic, K::Host, Lateral(&[ENDPOINTS, PARTICIPANT, PROCESS, USER, HOST])),
    row(K::Topic, K::User, Lateral(&[ENDPOINTS, PARTICIPANT, PROCESS, USER])),
    row(K::Topic, K::Process, Lateral(&[ENDPOINTS, PARTICIPANT, PROCESS])),
    row(K::Topic, K::Domain, Ancestor(&[DOMAIN])),
    row(K::Topic, K::Participant, Lateral(&[ENDPOINTS, PARTICIPANT])),
    row(K::Topic, K::DataWriter, Descendant(&[WRITER])),
    row(K::Topic, K::DataReader, Descendant(&[READER])),
    row(K::Topic, K::Locator, Descendant(&[ENDPOINTS, LOCATOR])),
    // DataWriter
    row(K::DataWriter, K::Host, Ancestor(&[PARTICIPANT, PROCESS, USER, HOST])),
    row(K::DataWriter, K::User, Ancestor(&[PARTICIPANT, PROCESS, USER])),
    row(K::DataWriter, K::Process, Ancestor(&[PARTICIPANT, PROCESS])),
    row(K::DataWriter, K::Domain, Ancestor(&[PARTICIPANT, DOMAIN])),
    row(K::DataWriter, K::Participant, Ancestor(&[PARTICIPANT])),
    row(K::DataWriter, K::Topic, Ancestor(&[TOPIC])),
    row(K::DataWriter, K::DataReader, TopicMatch(&[TOPIC, READER])),
    row(K::DataWriter, K::Locator, Adjacent(&[LOCATOR])),
    // DataReader
    row(K::DataReader, K::Host, Ancestor(&[PARTICIPANT, PROCESS, USER, HOST])),
    row(K::DataReader, K::User, Ancestor(&[PARTICIPANT, PROCESS, USER])),
    row(K::DataReader, K::Process, Ancestor(&[PARTICIPANT, PROCESS])),
    row(K::DataReader, K::Domain, Ancestor(&[PARTICIPANT, DOMAIN])),
    row(K::DataReader, K::Participant, Ancestor(&[PARTICIPANT])),
    row(K::DataReader, K::Topic, Ancestor(&[TOPIC])),
    row(K::DataReader, K::DataWriter, TopicMatch(&[TOPIC, WRITER])),
    row(K::DataReader, K::Locator, Adjacent(&[LOCATOR])),
    // Locator
    row(K::Locator, K::Host, Lateral(&[ENDPOINTS, PARTICIPANT, PROCESS, USER, HOST])),
    row(K::Locator, K::User, Lateral(&[ENDPOINTS, PARTICIPANT, PROCESS, USER])),
    row(K::Locator, K::Process, Lateral(&[ENDPOINTS, PARTICIPANT, PROCESS])),
    row(K::Locator, K::Domain, Lateral(&[ENDPOINTS, PARTICIPANT, DOMAIN])),
    row(K::Locator, K::Participant, Lateral(&[ENDPOINTS, PARTICIPANT])),
    row(K::Locator, K::Topic, Lateral(&[ENDPOINTS, TOPIC])),
    row(K::Locator, K::DataWriter, Adjacent(&[WRITER])),
    row(K::Locator, K::DataReader, Adjacent(&[READER])),
];

/// Looks up the strategy for a kind pair.
///
/// Same kinds are reflexive; pairs without a row are unrelated.
#[must_use]
pub fn strategy_for(origin: EntityKind, target: EntityKind) -> Strategy {
    if origin == target {
        return Strategy::Reflexive;
    }
    QUERY_RULES
        .iter()
        .find(|r| r.origin == origin && r.target == target)
        .map_or(Strategy::Unrelated, |r| r.strategy)
}
