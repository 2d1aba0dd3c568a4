//! Discovery ingestion.
//!
//! Notifications arrive from middleware threads, go through the bounded
//! [`queue`] to a single worker, and are turned into graph mutations by the
//! [`Ingestor`]. The effective state changes feed the [`DiscoveryCounter`] and
//! the per-monitor [`DiscoveryListener`].

/// Aggregate discovery count and cancellable waits.
pub mod counter;
/// Notification validation and application.
pub mod ingestor;
/// Per-monitor callbacks.
pub mod listener;
/// Typed discovery notifications.
pub mod notification;
pub(crate) mod queue;

pub use counter::{CancellationToken, DiscoveryCounter};
pub use ingestor::Ingestor;
pub use listener::{DiscoveryEvent, DiscoveryListener};
pub use notification::{
    DiscoveredEntity, DiscoveryNotification, DiscoveryStatus, EndpointInfo, ParticipantInfo, TopicInfo,
};
