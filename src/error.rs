//! Error types for ddsgraph.
//!
//! Errors are strongly typed using thiserror and grouped the way callers react
//! to them: bad parameters, execution failures (waits, the discovery queue),
//! and storage failures. Storage invariant violations are fatal: they mean the
//! ingestor fed a sequence that would have broken the graph.

use thiserror::Error;

use crate::entity::{EntityId, EntityKind};
use crate::storage::StorageError;

/// Argument validation errors. These map to the `BadParameter` category.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A query asked for the `Invalid` kind.
    #[error("Entity kind '{kind}' cannot be queried")]
    InvalidKind {
        /// Requested kind.
        kind: EntityKind,
    },

    /// The query origin names no entity.
    #[error("Origin entity {id} does not exist")]
    UnknownOrigin {
        /// Requested origin.
        id: EntityId,
    },

    /// The id is not a domain created by a started monitor.
    #[error("Entity {id} is not a monitored domain")]
    UnknownDomain {
        /// Addressed domain.
        id: EntityId,
    },

    /// A running monitor already covers the domain number.
    #[error("A monitor for domain {domain_number} is already running as entity {id}")]
    MonitorAlreadyRunning {
        /// Domain number passed to `start_monitor`.
        domain_number: u32,
        /// Domain entity of the running monitor.
        id: EntityId,
    },

    /// The notification contradicts the graph and was not applied.
    #[error("Notification rejected: {reason}")]
    RejectedNotification {
        /// What the notification contradicts.
        reason: String,
    },

    /// Configuration failed to parse or validate.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Parser or validation message.
        reason: String,
    },
}

/// Execution errors raised while waiting or handing work to the discovery worker.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A bounded wait ran out of time.
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        /// Configured timeout.
        duration_ms: u64,
    },

    /// The wait's cancellation token was raised.
    #[error("Wait cancelled")]
    Cancelled,

    /// A non-blocking submit found the queue full.
    #[error("Queue '{path}' is full (capacity {capacity})")]
    QueueFull {
        /// Queue name.
        path: String,
        /// Queue capacity.
        capacity: usize,
    },

    /// The queue's worker is gone.
    #[error("Queue '{path}' is disconnected")]
    Disconnected {
        /// Queue name.
        path: String,
    },
}

/// Top-level error type for ddsgraph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Bad parameter.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Wait or queue failure.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Lookup miss or graph invariant violation.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Unexpected failure such as a poisoned lock.
    #[error("Internal error: {message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl GraphError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for argument errors (unknown origin, invalid kind, unknown domain, ...).
    #[must_use]
    pub const fn is_bad_parameter(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if a direct lookup missed.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::EntityNotFound(_)))
    }

    /// Returns true for invariant violations and other unrecoverable failures.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_fatal(),
            Self::Internal { .. } => true,
            Self::Validation(_) | Self::Execution(_) => false,
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. } | ExecutionError::QueueFull { .. }
            ),
            Self::Validation(_) | Self::Storage(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for ddsgraph operations.
pub type GraphResult<T> = Result<T, GraphError>;
