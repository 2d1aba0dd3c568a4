//! Backend configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GraphResult, ValidationError};

/// Runtime configuration of a [`crate::MonitorBackend`].
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use ddsgraph::BackendConfig;
///
/// let cfg = BackendConfig::from_json_str(r#"{ "discovery_queue_capacity": 64 }"#).unwrap();
/// assert_eq!(cfg.discovery_queue_capacity, 64);
/// assert_eq!(cfg.worker_thread_name, BackendConfig::default().worker_thread_name);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Max queued discovery notifications before `submit` blocks.
    pub discovery_queue_capacity: usize,
    /// Name of the discovery worker thread.
    pub worker_thread_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            discovery_queue_capacity: 1024,
            worker_thread_name: "ddsgraph-discovery".to_string(),
        }
    }
}

impl BackendConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// `InvalidConfig` on malformed JSON, unknown fields or invalid values.
    pub fn from_json_str(json: &str) -> GraphResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// `InvalidConfig` if the queue capacity is zero or the thread name is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.discovery_queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "discovery_queue_capacity must be at least 1".to_string(),
            });
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "worker_thread_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
