//! Document identifiers and sharded storage paths.
//!
//! The file-backed store allocates a fresh identifier for every created document and keeps
//! it in *canonical* form: **32 lowercase hexadecimal characters** (no hyphens), the value
//! produced by `Uuid::new_v4().simple().to_string()`.
//!
//! Documents live under sharded directories derived from that identifier:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `practice_data/case_history/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! Sharding keeps any single directory from growing to hold every document of a form.

mod service;

pub use service::{DocumentUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
