//! # ddsgraph - discovery-driven entity graph for pub/sub monitoring
//!
//! ddsgraph is the model behind a publish/subscribe monitoring backend. It
//! ingests discovery notifications (participants, topics and endpoints
//! appearing or disappearing on a network) and keeps a queryable graph of how
//! those entities relate to each other and to the host, user and process they
//! run in.
//!
//! ## Core Concepts
//!
//! - **Entity**: any monitored object, addressed by a process-unique [`EntityId`]
//! - **Relation**: containment, domain membership and locator bindings between entities
//! - **Query**: "entities of kind K related to entity E", resolved from a per-kind-pair rule table
//! - **Lifecycle**: entities are never forgotten, only marked inactive, until their domain is cleared
//!
//! ## Usage
//!
//! ```
//! use ddsgraph::{
//!     DiscoveryNotification, DiscoveryStatus, EndpointInfo, EntityKind, Guid, MonitorBackend,
//!     ParticipantInfo, TopicInfo,
//! };
//!
//! let backend = MonitorBackend::with_default_config().unwrap();
//! let domain = backend.start_monitor(0, None).unwrap();
//!
//! let participant = ParticipantInfo {
//!     guid: Guid::random(),
//!     name: "talker".into(),
//!     host: "robot-1".into(),
//!     user: "ros".into(),
//!     process: "talker_node".into(),
//!     pid: Some("4242".into()),
//! };
//! let writer = EndpointInfo {
//!     guid: Guid::random(),
//!     name: "chatter_writer".into(),
//!     participant,
//!     topic: TopicInfo { name: "chatter".into(), data_type: "std_msgs::String".into() },
//!     locators: vec!["UDPv4:[10.0.0.7]:7411".into()],
//! };
//! backend
//!     .apply(&DiscoveryNotification::writer(domain, DiscoveryStatus::Discovered, writer))
//!     .unwrap();
//!
//! let hosts = backend.get_entities(EntityKind::Host, domain).unwrap();
//! assert_eq!(hosts[0].name, "robot-1");
//! assert_eq!(backend.get_entity_ids(EntityKind::Locator, domain).unwrap().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod entity;
pub mod error;

// Graph storage and traversal
pub mod lifecycle;
pub mod query;
pub mod storage;

// Discovery and monitor control
pub mod backend;
pub mod config;
pub mod discovery;

// Re-export primary types at crate root for convenience
pub use backend::MonitorBackend;
pub use config::BackendConfig;
pub use discovery::{
    CancellationToken, DiscoveredEntity, DiscoveryCounter, DiscoveryEvent, DiscoveryListener,
    DiscoveryNotification, DiscoveryStatus, EndpointInfo, ParticipantInfo, TopicInfo,
};
pub use entity::{Entity, EntityAttributes, EntityId, EntityKind, Guid};
pub use error::{ExecutionError, GraphError, GraphResult, ValidationError};
pub use lifecycle::{StateChange, StateMachine, Transition};
pub use query::{ActivityFilter, QueryEngine, Strategy};
pub use storage::{Database, EntityStore, InMemoryGraph, RelationIndex, StorageError};
