//! Entity types and identity management.
//!
//! Every monitored object (host, user, process, domain, participant, topic,
//! endpoint, locator) is an [`Entity`] owned by the entity store. Everything
//! else refers to entities through their [`EntityId`], never by reference, so
//! relations can be extended after creation without invalidating holders.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-unique, monotonically assigned entity identifier.
///
/// Two values are reserved: [`EntityId::all`] is the universal root used to
/// request every entity of a kind, and [`EntityId::invalid`] never names an
/// entity. Identifiers handed out by the store start at 1.
///
/// # Examples
///
/// ```
/// use ddsgraph::EntityId;
///
/// assert!(EntityId::all().is_all());
/// assert!(!EntityId::invalid().is_valid());
/// assert!(EntityId::from(7).is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    const ALL: u64 = 0;
    const INVALID: u64 = u64::MAX;

    /// The universal root: "no origin restriction".
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::ALL)
    }

    /// An identifier that never names an entity.
    #[must_use]
    pub const fn invalid() -> Self {
        Self(Self::INVALID)
    }

    /// Returns true for the universal root.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        self.0 == Self::ALL
    }

    /// Returns true unless this is [`EntityId::invalid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 != Self::INVALID
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The identifier following this one, or `None` once the id space is spent.
    #[must_use]
    pub(crate) const fn successor(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) if next != Self::INVALID => Some(Self(next)),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "all")
        } else if !self.is_valid() {
            write!(f, "invalid")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Closed classification of monitored entities.
///
/// The kind is only used for dispatch; no ordering between kinds is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Physical machine.
    Host,
    /// Operating system user on a host.
    User,
    /// Operating system process run by a user.
    Process,
    /// Monitored domain, the root created by starting a monitor.
    Domain,
    /// Domain participant.
    Participant,
    /// Topic within a domain.
    Topic,
    /// Data writer endpoint.
    DataWriter,
    /// Data reader endpoint.
    DataReader,
    /// Network address an endpoint is bound to.
    Locator,
    /// Placeholder accepted by the API only to be rejected.
    Invalid,
}

impl EntityKind {
    /// Every kind an entity can actually have.
    pub const VALID: [Self; 9] = [
        Self::Host,
        Self::User,
        Self::Process,
        Self::Domain,
        Self::Participant,
        Self::Topic,
        Self::DataWriter,
        Self::DataReader,
        Self::Locator,
    ];

    /// Returns false only for [`EntityKind::Invalid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Data writers and data readers.
    #[must_use]
    pub const fn is_endpoint(&self) -> bool {
        matches!(self, Self::DataWriter | Self::DataReader)
    }

    /// Host, user and process: the physical context of a participant.
    #[must_use]
    pub const fn is_physical(&self) -> bool {
        matches!(self, Self::Host | Self::User | Self::Process)
    }

    /// Kinds whose state changes are reported to discovery listeners and
    /// accounted in the discovery count.
    #[must_use]
    pub const fn is_discoverable(&self) -> bool {
        matches!(
            self,
            Self::Participant | Self::Topic | Self::DataWriter | Self::DataReader
        )
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::User => "user",
            Self::Process => "process",
            Self::Domain => "domain",
            Self::Participant => "participant",
            Self::Topic => "topic",
            Self::DataWriter => "datawriter",
            Self::DataReader => "datareader",
            Self::Locator => "locator",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 16-byte globally unique identifier of a participant or endpoint, as
/// announced by the discovery protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// Builds a GUID from its wire bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Creates a random GUID, mostly useful for tests and simulations.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wire bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.as_bytes();
        for (idx, byte) in bytes.iter().enumerate() {
            if idx > 0 && idx % 4 == 0 {
                f.write_str(".")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Kind-specific attributes captured when the entity is created.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityAttributes {
    /// No attributes beyond the display name.
    None,
    /// Monitored domain number.
    Domain { domain_number: u32 },
    /// Operating system process id, as reported.
    Process { pid: String },
    /// Participant GUID.
    Participant { guid: Guid },
    /// Topic data type name.
    Topic { data_type: String },
    /// Endpoint GUID.
    Endpoint { guid: Guid },
}

/// A monitored entity.
///
/// Identity and kind never change. `active` and the timestamps are the only
/// mutable fields; relation memberships live in the relation index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Store-assigned identifier.
    pub id: EntityId,

    /// Entity kind.
    pub kind: EntityKind,

    /// Display name.
    pub name: String,

    /// Whether the entity is currently alive.
    pub active: bool,

    /// When the entity was first observed.
    pub discovered_at: DateTime<Utc>,

    /// When `active` last changed (creation counts as a change).
    pub last_change: DateTime<Utc>,

    /// Kind-specific attributes.
    pub attributes: EntityAttributes,
}

impl Entity {
    /// Creates an active entity.
    #[must_use]
    pub fn new(
        id: EntityId,
        kind: EntityKind,
        name: impl Into<String>,
        attributes: EntityAttributes,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            name: name.into(),
            active: true,
            discovered_at: now,
            last_change: now,
            attributes,
        }
    }

    /// Sets the active flag. Returns true if the flag actually changed.
    pub fn set_active(&mut self, active: bool) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        self.last_change = Utc::now();
        true
    }

    /// GUID of a participant or endpoint.
    #[must_use]
    pub fn guid(&self) -> Option<Guid> {
        match &self.attributes {
            EntityAttributes::Participant { guid } | EntityAttributes::Endpoint { guid } => {
                Some(*guid)
            }
            _ => None,
        }
    }
}
