//! Identity types shared across the practice crates.
//!
//! An editing session acts on exactly one [`TargetIdentity`] (for example a client id) and,
//! once the backend has created the document, on one [`PersistedId`]. Both wrap a trimmed,
//! non-empty string so that downstream code never has to re-check emptiness.

/// Errors that can occur when constructing identity types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The target identity was empty or contained only whitespace
    #[error("target identity cannot be empty")]
    EmptyTarget,
    /// The persisted id was empty or contained only whitespace
    #[error("persisted id cannot be empty")]
    EmptyPersistedId,
}

fn trimmed(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// The external key selecting which document an editing session acts upon.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetIdentity(String);

impl TargetIdentity {
    /// Creates a new `TargetIdentity`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyTarget`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, IdentityError> {
        trimmed(input.as_ref())
            .map(Self)
            .ok_or(IdentityError::EmptyTarget)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TargetIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TargetIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Backend-assigned identifier of a document that has been created at least once.
///
/// Backends are free to choose the representation (sequential numbers, UUIDs); the core only
/// ever compares and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersistedId(String);

impl PersistedId {
    /// Creates a new `PersistedId`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyPersistedId`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, IdentityError> {
        trimmed(input.as_ref())
            .map(Self)
            .ok_or(IdentityError::EmptyPersistedId)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for PersistedId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for PersistedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PersistedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PersistedId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                <$ty>::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(TargetIdentity);
string_serde!(PersistedId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_identity_trims_input() {
        let target = TargetIdentity::new("  client-7 ").unwrap();
        assert_eq!(target.as_str(), "client-7");
        assert_eq!(target.to_string(), "client-7");
    }

    #[test]
    fn test_target_identity_rejects_blank() {
        assert_eq!(TargetIdentity::new("   "), Err(IdentityError::EmptyTarget));
        assert_eq!(TargetIdentity::new(""), Err(IdentityError::EmptyTarget));
    }

    #[test]
    fn test_persisted_id_from_number() {
        let id = PersistedId::from(42);
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_persisted_id_rejects_blank() {
        assert_eq!(
            "\t".parse::<PersistedId>(),
            Err(IdentityError::EmptyPersistedId)
        );
    }

    #[test]
    fn test_serde_is_a_plain_string() {
        let target = TargetIdentity::new("u1").unwrap();
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, "\"u1\"");

        let back: TargetIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_deserialize_rejects_blank() {
        let result = serde_json::from_str::<PersistedId>("\"  \"");
        assert!(result.is_err());
    }
}
