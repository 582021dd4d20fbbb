use practice_types::IdentityError;

/// Failures reported by a [`crate::PersistenceBackend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected the document: {0}")]
    Rejected(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("failed to access document storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("failed to (de)serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by an autosave session.
///
/// `CreateFailed` and `UpdateFailed` are both shown to the user as a failed save; the draft is
/// never discarded, so every variant is recoverable by editing again or saving manually.
#[derive(Debug, thiserror::Error)]
pub enum AutosaveError {
    #[error("failed to create document: {0}")]
    CreateFailed(#[source] BackendError),
    #[error("failed to update document: {0}")]
    UpdateFailed(#[source] BackendError),
    #[error("required fields are missing; the document cannot be created yet")]
    PreconditionUnmet,
    #[error("a manual save is already in progress")]
    SaveInProgress,
    #[error("no target is bound to this editing session")]
    Unbound,
    #[error("the editing session switched targets before the operation completed")]
    Superseded,
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("field is not a list: {0}")]
    NotAList(String),
    #[error("list index {index} out of range for field {field}")]
    IndexOutOfRange { field: String, index: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

pub type AutosaveResult<T> = std::result::Result<T, AutosaveError>;
