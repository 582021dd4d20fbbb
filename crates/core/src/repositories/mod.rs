//! Persistence backends.
//!
//! The autosave core never talks to a transport directly. It consumes a
//! [`PersistenceBackend`], and this module provides two implementations:
//!
//! - [`memory::MemoryBackend`]: process-local map, sequential numeric ids
//! - [`files::FileStore`]: JSON documents in a sharded directory tree

pub mod files;
pub mod memory;

use crate::BackendError;
use async_trait::async_trait;
use practice_types::{PersistedId, TargetIdentity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document as returned by [`PersistenceBackend::fetch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: PersistedId,
    pub body: Value,
}

/// Storage for the documents edited by one kind of form.
///
/// Retries are always user-initiated (another edit or a manual save), so both write
/// operations must tolerate being repeated with the same payload.
///
/// Implementations must be `Send + Sync + 'static` so sessions can call them from spawned
/// timer tasks.
#[async_trait]
pub trait PersistenceBackend: Send + Sync + 'static {
    /// Store a new document for `target` and return the id assigned to it.
    async fn create(
        &self,
        target: &TargetIdentity,
        payload: &Value,
    ) -> Result<PersistedId, BackendError>;

    /// Overwrite the document previously returned by `create`.
    async fn update(&self, id: &PersistedId, payload: &Value) -> Result<(), BackendError>;

    /// Load the existing document for `target`, if there is one.
    async fn fetch(&self, target: &TargetIdentity) -> Result<Option<StoredDocument>, BackendError>;
}
