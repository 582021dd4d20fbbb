//! # Practice Core
//!
//! Autosave for the long-form clinical editors of a therapy practice.
//!
//! This crate contains the editing-session logic and document storage:
//! - Debounced, create-once autosave sessions ([`Autosave`])
//! - The field catalogue of each form and its draft/payload conversions ([`FormKind`])
//! - Persistence backends: in-memory and sharded JSON files under `PRACTICE_DATA_DIR`
//!
//! **No transport concerns**: HTTP clients, authentication and rendering belong to the caller,
//! which supplies a [`PersistenceBackend`].

pub mod autosave;
pub mod binding;
pub mod config;
pub mod constants;
pub mod draft;
pub mod error;
pub mod forms;
pub mod precondition;
pub mod repositories;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use autosave::{Autosave, AutosaveBuilder, SaveReceipt};
pub use binding::BindingTag;
pub use config::AutosaveConfig;
pub use draft::DraftState;
pub use error::{AutosaveError, AutosaveResult, BackendError};
pub use forms::{FieldKind, FieldSpec, FormKind, FormSchema};
pub use precondition::Precondition;
pub use repositories::files::{FileStore, StoredRecord};
pub use repositories::memory::{MemoryBackend, MemoryRecord};
pub use repositories::{PersistenceBackend, StoredDocument};
pub use status::SaveStatus;

pub use practice_types::{IdentityError, PersistedId, TargetIdentity};
