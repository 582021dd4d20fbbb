//! Constants used throughout the practice core crate.

/// Quiescence window before an autosave fires.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// How long the "Auto-saved" status stays visible before reverting to idle.
pub const DEFAULT_SAVED_DISPLAY_MS: u64 = 3_000;

/// How long the "Auto-save failed" status stays visible before reverting to idle.
pub const DEFAULT_FAILED_DISPLAY_MS: u64 = 5_000;

/// Default directory for stored documents when no explicit directory is configured.
pub const DEFAULT_PRACTICE_DATA_DIR: &str = "practice_data";

/// Filename of the JSON document inside each sharded document directory.
pub const DOCUMENT_JSON_FILENAME: &str = "document.json";

/// Attempts made to allocate an unused document directory before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;
