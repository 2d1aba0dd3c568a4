//! Typed discovery notifications.
//!
//! The discovery protocol itself lives outside this crate; it hands over one
//! [`DiscoveryNotification`] per participant, topic or endpoint it sees appear,
//! change or disappear, carrying enough context to build missing ancestors.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind, Guid};

/// What happened to the announced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    /// First seen, or seen again after a removal.
    Discovered,
    /// Already known; attributes (locators) may have changed.
    Updated,
    /// Gone from the network.
    Removed,
}

impl DiscoveryStatus {
    /// Nominal contribution of the status to the discovery count.
    #[must_use]
    pub const fn count_delta(&self) -> i64 {
        match self {
            Self::Discovered => 1,
            Self::Updated => 0,
            Self::Removed => -1,
        }
    }
}

/// A participant and the physical context it runs in.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub guid: Guid,
    pub name: String,
    pub host: String,
    pub user: String,
    pub process: String,
    /// Operating system process id, when announced.
    #[serde(default)]
    pub pid: Option<String>,
}

/// A topic, identified within its domain by name and data type.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicInfo {
    pub name: String,
    pub data_type: String,
}

/// A data writer or data reader.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub guid: Guid,
    pub name: String,
    /// Owning participant, created on demand if unknown.
    pub participant: ParticipantInfo,
    pub topic: TopicInfo,
    /// Full current locator list. Ignored on removal.
    #[serde(default)]
    pub locators: Vec<String>,
}

/// The announced entity.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "info", rename_all = "snake_case")]
pub enum DiscoveredEntity {
    Participant(ParticipantInfo),
    Topic(TopicInfo),
    Reader(EndpointInfo),
    Writer(EndpointInfo),
}

impl DiscoveredEntity {
    /// Kind of the entity this notification is about.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Participant(_) => EntityKind::Participant,
            Self::Topic(_) => EntityKind::Topic,
            Self::Reader(_) => EntityKind::DataReader,
            Self::Writer(_) => EntityKind::DataWriter,
        }
    }

    /// Display name of the announced entity.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Participant(info) => &info.name,
            Self::Topic(info) => &info.name,
            Self::Reader(info) | Self::Writer(info) => &info.name,
        }
    }
}

/// One discovery callback, addressed to a monitored domain.
///
/// # Examples
///
/// ```
/// use ddsgraph::{DiscoveryNotification, DiscoveryStatus, EntityId, EntityKind, TopicInfo};
///
/// let n = DiscoveryNotification::topic(
///     EntityId::from(1),
///     DiscoveryStatus::Discovered,
///     TopicInfo { name: "chatter".into(), data_type: "std_msgs::String".into() },
/// );
/// assert_eq!(n.entity.kind(), EntityKind::Topic);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNotification {
    /// Domain entity returned by `start_monitor`.
    pub domain: EntityId,
    /// Appeared, changed or disappeared.
    pub status: DiscoveryStatus,
    /// The announced entity.
    pub entity: DiscoveredEntity,
}

#[allow(missing_docs)]
impl DiscoveryNotification {
    #[must_use]
    pub const fn participant(domain: EntityId, status: DiscoveryStatus, info: ParticipantInfo) -> Self {
        Self {
            domain,
            status,
            entity: DiscoveredEntity::Participant(info),
        }
    }

    #[must_use]
    pub const fn topic(domain: EntityId, status: DiscoveryStatus, info: TopicInfo) -> Self {
        Self {
            domain,
            status,
            entity: DiscoveredEntity::Topic(info),
        }
    }

    #[must_use]
    pub const fn reader(domain: EntityId, status: DiscoveryStatus, info: EndpointInfo) -> Self {
        Self {
            domain,
            status,
            entity: DiscoveredEntity::Reader(info),
        }
    }

    #[must_use]
    pub const fn writer(domain: EntityId, status: DiscoveryStatus, info: EndpointInfo) -> Self {
        Self {
            domain,
            status,
            entity: DiscoveredEntity::Writer(info),
        }
    }
}
