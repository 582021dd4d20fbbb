//! Canonical document UUID wrapper.

use crate::{UuidError, UuidResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// A document identifier guaranteed to be in canonical form once constructed.
///
/// - [`DocumentUuid::new`] allocates a fresh identifier for a newly created document.
/// - [`DocumentUuid::parse`] validates an identifier read back from storage or supplied on
///   the command line. Hyphenated or uppercase forms are rejected, not normalised.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentUuid(Uuid);

impl Default for DocumentUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentUuid {
    /// Generates a new random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not 32 lowercase hex characters.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "document id must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(e.to_string()))
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// This is a purely syntactic check and is cheap enough to use as a directory filter.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/` where `s1`/`s2` are the first two pairs of hex
    /// characters of this identifier.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for DocumentUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for DocumentUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentUuid::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_id() {
        let id = DocumentUuid::new();
        let canonical = id.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(DocumentUuid::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_accepts_canonical() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let id = DocumentUuid::parse(canonical).expect("canonical id should parse");
        assert_eq!(id.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated() {
        let result = DocumentUuid::parse("550e8400-e29b-41d4-a716-446655440000");
        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_is_canonical_invalid() {
        assert!(!DocumentUuid::is_canonical(
            "550E8400E29B41D4A716446655440000"
        ));
        assert!(!DocumentUuid::is_canonical(
            "550e8400e29b41d4a71644665544000"
        ));
        assert!(!DocumentUuid::is_canonical(
            "550e8400e29b41d4a716446655440zzz"
        ));
        assert!(!DocumentUuid::is_canonical(""));
    }

    #[test]
    fn test_sharded_dir_structure() {
        let id = DocumentUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let parent = Path::new("/practice_data/case_history");

        assert_eq!(
            id.sharded_dir(parent),
            PathBuf::from(
                "/practice_data/case_history/55/0e/550e8400e29b41d4a716446655440000"
            )
        );
    }

    #[test]
    fn test_from_str_round_trips_display() {
        let id = DocumentUuid::new();
        let parsed: DocumentUuid = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
