//! File-backed document storage.
//!
//! Each created document gets a fresh canonical UUID and lives in its own sharded directory:
//!
//! ```text
//! <data_dir>/<form>/
//!   <s1>/
//!     <s2>/
//!       <uuid>/
//!         document.json
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the UUID. Writes go to a
//! temporary file that is then renamed over `document.json`, so a reader never observes a
//! half-written document.
//!
//! Filesystem work runs on Tokio's blocking pool.

use super::{PersistenceBackend, StoredDocument};
use crate::constants::{DOCUMENT_JSON_FILENAME, MAX_ALLOCATION_ATTEMPTS};
use crate::forms::FormKind;
use crate::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use practice_types::{PersistedId, TargetIdentity};
use practice_uuid::DocumentUuid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// The on-disk representation of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: PersistedId,
    pub target: TargetIdentity,
    pub form: FormKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: Value,
}

/// Stores the documents of one form under `<data_dir>/<form>/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    form_dir: PathBuf,
    form: FormKind,
}

impl FileStore {
    /// Creates a store rooted at `<data_dir>/<form>/`.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Root directory shared by all forms.
    /// * `form` - The form whose documents this store reads and writes.
    ///
    /// # Returns
    ///
    /// A store that touches the filesystem lazily; the directory is created on the first
    /// [`PersistenceBackend::create`] and a missing directory lists as empty.
    pub fn new(data_dir: &Path, form: FormKind) -> Self {
        Self {
            form_dir: data_dir.join(form.dir_name()),
            form,
        }
    }

    /// Every readable document of this form.
    ///
    /// # Returns
    ///
    /// The stored records, oldest first. Files that cannot be read or parsed are logged and
    /// skipped; directories whose names are not canonical UUIDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] only if the blocking task itself fails.
    pub async fn list(&self) -> Result<Vec<StoredRecord>, BackendError> {
        let form_dir = self.form_dir.clone();
        blocking(move || Ok(scan_records(&form_dir))).await
    }

    /// Read one document by id.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidId`] if `id` is not a canonical document UUID and
    /// [`BackendError::NotFound`] if no document exists for it.
    pub async fn read(&self, id: &PersistedId) -> Result<StoredRecord, BackendError> {
        let path = document_path(&self.form_dir, id)?;
        let id = id.clone();
        blocking(move || read_record(&path, &id)).await
    }
}

#[async_trait]
impl PersistenceBackend for FileStore {
    async fn create(
        &self,
        target: &TargetIdentity,
        payload: &Value,
    ) -> Result<PersistedId, BackendError> {
        let form_dir = self.form_dir.clone();
        let target = target.clone();
        let payload = payload.clone();
        let form = self.form;

        blocking(move || {
            let (uuid, dir) = allocate_document_dir(&form_dir, DocumentUuid::new)?;
            let id = PersistedId::new(uuid.to_string())
                .map_err(|e| BackendError::InvalidId(e.to_string()))?;
            let now = Utc::now();
            let record = StoredRecord {
                id: id.clone(),
                target,
                form,
                created_at: now,
                updated_at: now,
                body: payload,
            };

            if let Err(e) = write_record(&dir.join(DOCUMENT_JSON_FILENAME), &record) {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::warn!(
                        "failed to clean up {} after write error: {}",
                        dir.display(),
                        cleanup
                    );
                }
                return Err(e);
            }

            Ok(id)
        })
        .await
    }

    async fn update(&self, id: &PersistedId, payload: &Value) -> Result<(), BackendError> {
        let path = document_path(&self.form_dir, id)?;
        let id = id.clone();
        let payload = payload.clone();

        blocking(move || {
            let mut record = read_record(&path, &id)?;
            record.body = payload;
            record.updated_at = Utc::now();
            write_record(&path, &record)
        })
        .await
    }

    async fn fetch(&self, target: &TargetIdentity) -> Result<Option<StoredDocument>, BackendError> {
        let records = self.list().await?;
        Ok(records
            .into_iter()
            .filter(|record| &record.target == target)
            .max_by_key(|record| record.updated_at)
            .map(|record| StoredDocument {
                id: record.id,
                body: record.body,
            }))
    }
}

async fn blocking<T, F>(work: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BackendError::Unavailable(format!("storage task failed: {e}")))?
}

fn document_path(form_dir: &Path, id: &PersistedId) -> Result<PathBuf, BackendError> {
    let uuid =
        DocumentUuid::parse(id.as_str()).map_err(|e| BackendError::InvalidId(e.to_string()))?;
    Ok(uuid.sharded_dir(form_dir).join(DOCUMENT_JSON_FILENAME))
}

/// Allocate a fresh sharded directory for a new document.
///
/// Guards against UUID collisions (or directories left behind by external interference) by
/// retrying with a new UUID a bounded number of times.
fn allocate_document_dir(
    form_dir: &Path,
    mut uuid_source: impl FnMut() -> DocumentUuid,
) -> Result<(DocumentUuid, PathBuf), BackendError> {
    for _attempt in 0..MAX_ALLOCATION_ATTEMPTS {
        let uuid = uuid_source();
        let candidate = uuid.sharded_dir(form_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(BackendError::Storage(e)),
        }
    }

    Err(BackendError::Storage(io::Error::new(
        ErrorKind::AlreadyExists,
        format!(
            "failed to allocate a unique document directory after {} attempts",
            MAX_ALLOCATION_ATTEMPTS
        ),
    )))
}

fn write_record(path: &Path, record: &StoredRecord) -> Result<(), BackendError> {
    let json = serde_json::to_vec_pretty(record)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_record(path: &Path, id: &PersistedId) -> Result<StoredRecord, BackendError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(BackendError::NotFound(id.to_string()))
        }
        Err(e) => return Err(BackendError::Storage(e)),
    };
    Ok(serde_json::from_str(&contents)?)
}

/// Walk `<form_dir>/<s1>/<s2>/<uuid>/document.json`.
fn scan_records(form_dir: &Path) -> Vec<StoredRecord> {
    let mut records = Vec::new();

    let Ok(s1_iter) = fs::read_dir(form_dir) else {
        return records;
    };

    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }

        let Ok(s2_iter) = fs::read_dir(&s1_path) else {
            continue;
        };

        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }

            let Ok(id_iter) = fs::read_dir(&s2_path) else {
                continue;
            };

            for id_ent in id_iter.flatten() {
                let id_path = id_ent.path();
                let is_document_dir = id_path
                    .file_name()
                    .and_then(|os| os.to_str())
                    .is_some_and(DocumentUuid::is_canonical);
                if !id_path.is_dir() || !is_document_dir {
                    continue;
                }

                let document_path = id_path.join(DOCUMENT_JSON_FILENAME);
                if !document_path.is_file() {
                    continue;
                }

                match fs::read_to_string(&document_path)
                    .map_err(BackendError::from)
                    .and_then(|contents| Ok(serde_json::from_str::<StoredRecord>(&contents)?))
                {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(
                            "failed to read document: {} - {}",
                            document_path.display(),
                            e
                        );
                    }
                }
            }
        }
    }

    records.sort_by_key(|record| record.created_at);
    records
}
