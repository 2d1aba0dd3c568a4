//! Kind-aware traversal of the entity graph.
//!
//! The rule table in [`rules`] maps each `(origin kind, target kind)` pair to a
//! resolution strategy; [`QueryEngine`] executes it against the store.

mod engine;
pub mod rules;

use serde::{Deserialize, Serialize};

pub use engine::QueryEngine;
pub use rules::{strategy_for, QueryRule, Strategy, QUERY_RULES};

/// Restricts query results by activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityFilter {
    /// Active and inactive entities alike.
    #[default]
    All,
    /// Only active entities.
    Active,
    /// Only inactive entities.
    Inactive,
}

impl ActivityFilter {
    /// Whether an entity with the given active flag passes the filter.
    #[must_use]
    pub const fn accepts(&self, active: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => active,
            Self::Inactive => !active,
        }
    }
}
