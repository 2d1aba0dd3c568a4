//! Entity store and relation index.
//!
//! The traits in [`traits`] define the store and index contracts;
//! [`InMemoryGraph`] implements both, and [`Database`] shares it between
//! threads under one lock.

mod database;
mod memory;
pub mod relation;
mod traits;

pub use database::Database;
pub use memory::InMemoryGraph;
pub use relation::{EdgeKind, EdgeRule, EDGE_RULES};
pub use traits::{EntityStore, RelationIndex, StorageError};
