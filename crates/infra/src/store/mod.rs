//! Persistence boundary for flushed row changes.
//!
//! The store is opaque to the commit pipeline: it receives one batch of row
//! changes per commit and either applies all of them or none.

pub mod in_memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use travel_core::EntityKey;

pub use in_memory::InMemoryStore;

/// One row-level change produced by the change tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    Insert { key: EntityKey, row: JsonValue },
    Update { key: EntityKey, row: JsonValue },
    Delete { key: EntityKey },
}

/// Store operation error.
///
/// - **Conflict**: a constraint rejected the batch (e.g. duplicate key)
/// - **NotFound**: an update/delete targeted a row that does not exist
/// - **Serialization**: a row could not be encoded or decoded
/// - **Unavailable**: connectivity or timeout; the batch was not applied
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("row not found: {0}")]
    NotFound(EntityKey),

    #[error("row serialization failed: {0}")]
    Serialization(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Atomic row store.
///
/// Implementations must apply a `flush` batch atomically (all or nothing)
/// and report the number of rows affected.
#[async_trait]
pub trait Store: Send + Sync {
    async fn flush(&self, changes: Vec<Change>) -> Result<u64, StoreError>;

    async fn find(&self, key: &EntityKey) -> Result<Option<JsonValue>, StoreError>;

    /// All rows of one entity type, ordered by id.
    async fn rows_of_type(&self, entity_type: &str) -> Result<Vec<JsonValue>, StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn flush(&self, changes: Vec<Change>) -> Result<u64, StoreError> {
        (**self).flush(changes).await
    }

    async fn find(&self, key: &EntityKey) -> Result<Option<JsonValue>, StoreError> {
        (**self).find(key).await
    }

    async fn rows_of_type(&self, entity_type: &str) -> Result<Vec<JsonValue>, StoreError> {
        (**self).rows_of_type(entity_type).await
    }
}
