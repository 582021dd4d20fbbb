//! Process-local backend.

use super::{PersistenceBackend, StoredDocument};
use crate::BackendError;
use async_trait::async_trait;
use practice_types::{PersistedId, TargetIdentity};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub target: TargetIdentity,
    pub body: Value,
    /// Number of successful writes, including the create.
    pub revision: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    records: BTreeMap<PersistedId, MemoryRecord>,
}

/// Keeps documents in a map keyed by persisted id. Ids are assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing document, as if it had been created earlier.
    ///
    /// # Arguments
    ///
    /// * `target` - The target the document belongs to; [`PersistenceBackend::fetch`] finds it
    ///   by this.
    /// * `body` - Stored as-is.
    ///
    /// # Returns
    ///
    /// The next sequential id. The record starts at revision 1.
    pub fn insert(&self, target: TargetIdentity, body: Value) -> PersistedId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = PersistedId::from(state.next_id);
        state.records.insert(
            id.clone(),
            MemoryRecord {
                target,
                body,
                revision: 1,
            },
        );
        id
    }

    /// A copy of the record stored under `id`, or `None` if nothing was created with it.
    pub fn get(&self, id: &PersistedId) -> Option<MemoryRecord> {
        self.lock().records.get(id).cloned()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn create(
        &self,
        target: &TargetIdentity,
        payload: &Value,
    ) -> Result<PersistedId, BackendError> {
        Ok(self.insert(target.clone(), payload.clone()))
    }

    async fn update(&self, id: &PersistedId, payload: &Value) -> Result<(), BackendError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        record.body = payload.clone();
        record.revision += 1;
        Ok(())
    }

    async fn fetch(&self, target: &TargetIdentity) -> Result<Option<StoredDocument>, BackendError> {
        let state = self.lock();
        Ok(state
            .records
            .iter()
            .find(|(_, record)| &record.target == target)
            .map(|(id, record)| StoredDocument {
                id: id.clone(),
                body: record.body.clone(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(id: &str) -> TargetIdentity {
        TargetIdentity::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let backend = MemoryBackend::new();
        let first = backend.create(&target("a"), &json!({})).await.unwrap();
        let second = backend.create(&target("b"), &json!({})).await.unwrap();

        assert_eq!(first, PersistedId::from(1));
        assert_eq!(second, PersistedId::from(2));
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_update_overwrites_body_and_bumps_revision() {
        let backend = MemoryBackend::new();
        let id = backend
            .create(&target("a"), &json!({"name": "A"}))
            .await
            .unwrap();
        backend.update(&id, &json!({"name": "AB"})).await.unwrap();

        let record = backend.get(&id).unwrap();
        assert_eq!(record.body, json!({"name": "AB"}));
        assert_eq!(record.revision, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update(&PersistedId::from(9), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_by_target() {
        let backend = MemoryBackend::new();
        let id = backend.insert(target("a"), json!({"name": "A"}));

        let found = backend.fetch(&target("a")).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.body, json!({"name": "A"}));
        assert!(backend.fetch(&target("b")).await.unwrap().is_none());
    }
}
