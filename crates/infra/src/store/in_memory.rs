use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::instrument;

use travel_core::EntityKey;

use super::{Change, Store, StoreError};

/// In-memory row store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<EntityKey, JsonValue>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> Result<usize, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.len())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    #[instrument(skip(self, changes), fields(change_count = changes.len()), err)]
    async fn flush(&self, changes: Vec<Change>) -> Result<u64, StoreError> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;

        // Validate the whole batch before touching anything (all or nothing).
        for change in &changes {
            match change {
                Change::Insert { key, .. } if rows.contains_key(key) => {
                    return Err(StoreError::Conflict(format!("duplicate key {key}")));
                }
                Change::Update { key, .. } | Change::Delete { key } if !rows.contains_key(key) => {
                    return Err(StoreError::NotFound(*key));
                }
                _ => {}
            }
        }

        let affected = changes.len() as u64;
        for change in changes {
            match change {
                Change::Insert { key, row } | Change::Update { key, row } => {
                    rows.insert(key, row);
                }
                Change::Delete { key } => {
                    rows.remove(&key);
                }
            }
        }

        Ok(affected)
    }

    async fn find(&self, key: &EntityKey) -> Result<Option<JsonValue>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(key).cloned())
    }

    async fn rows_of_type(&self, entity_type: &str) -> Result<Vec<JsonValue>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        let mut matching: Vec<_> = rows
            .iter()
            .filter(|(key, _)| key.entity_type == entity_type)
            .collect();
        matching.sort_by_key(|(key, _)| key.id);
        Ok(matching.into_iter().map(|(_, row)| row.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn key(n: u128) -> EntityKey {
        EntityKey::new("stops", Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn flush_applies_inserts_updates_and_deletes() {
        let store = InMemoryStore::new();
        store
            .flush(vec![
                Change::Insert { key: key(1), row: json!({ "name": "a" }) },
                Change::Insert { key: key(2), row: json!({ "name": "b" }) },
            ])
            .await
            .unwrap();

        let affected = store
            .flush(vec![
                Change::Update { key: key(1), row: json!({ "name": "a2" }) },
                Change::Delete { key: key(2) },
            ])
            .await
            .unwrap();

        assert_eq!(affected, 2);
        assert_eq!(store.find(&key(1)).await.unwrap(), Some(json!({ "name": "a2" })));
        assert_eq!(store.find(&key(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_batch_applies_nothing() {
        let store = InMemoryStore::new();
        store
            .flush(vec![Change::Insert { key: key(1), row: json!({}) }])
            .await
            .unwrap();

        let err = store
            .flush(vec![
                Change::Insert { key: key(2), row: json!({}) },
                Change::Update { key: key(3), row: json!({}) },
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(k) if k == key(3)));
        assert_eq!(store.row_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let store = InMemoryStore::new();
        store
            .flush(vec![Change::Insert { key: key(1), row: json!({}) }])
            .await
            .unwrap();

        let err = store
            .flush(vec![Change::Insert { key: key(1), row: json!({}) }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn rows_of_type_filters_and_orders_by_id() {
        let store = InMemoryStore::new();
        store
            .flush(vec![
                Change::Insert { key: key(2), row: json!({ "n": 2 }) },
                Change::Insert { key: EntityKey::new("itineraries", Uuid::from_u128(9)), row: json!({}) },
                Change::Insert { key: key(1), row: json!({ "n": 1 }) },
            ])
            .await
            .unwrap();

        let rows = store.rows_of_type("stops").await.unwrap();
        assert_eq!(rows, vec![json!({ "n": 1 }), json!({ "n": 2 })]);
    }
}
