//! Save-worthiness predicates.
//!
//! A document that has never been created is only sent to the backend once its precondition
//! holds; otherwise every keystroke in an empty form would create a blank record. Once the
//! backend has assigned a persisted id the precondition is no longer consulted.

use crate::DraftState;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Check = dyn Fn(&DraftState) -> bool + Send + Sync;

/// A named predicate over the current draft.
#[derive(Clone)]
pub struct Precondition {
    name: String,
    check: Arc<Check>,
}

impl Precondition {
    /// Any draft may be created, including an all-default one.
    pub fn always() -> Self {
        Self::custom("always", |_| true)
    }

    /// The named field must hold a filled value (see [`is_filled`]).
    pub fn field_non_empty(field: impl Into<String>) -> Self {
        let field = field.into();
        let name = format!("field `{field}` non-empty");
        Self::custom(name, move |draft| draft.get(&field).is_some_and(is_filled))
    }

    /// At least one field must hold a filled value.
    pub fn any_field_non_empty() -> Self {
        Self::custom("any field non-empty", |draft| {
            draft.fields().values().any(is_filled)
        })
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&DraftState) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_met(&self, draft: &DraftState) -> bool {
        (self.check)(draft)
    }
}

impl fmt::Debug for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Precondition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Whether a value counts as user-entered content.
///
/// Whitespace-only text, empty lists, `false` and `null` are unfilled; numbers always count.
/// Objects count when any of their members does.
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => members.values().any(is_filled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> DraftState {
        match value {
            Value::Object(map) => DraftState::from(map),
            _ => panic!("test drafts must be objects"),
        }
    }

    #[test]
    fn test_field_non_empty_ignores_whitespace() {
        let pre = Precondition::field_non_empty("name");
        assert!(!pre.is_met(&draft(json!({"name": "   "}))));
        assert!(!pre.is_met(&draft(json!({"other": "x"}))));
        assert!(pre.is_met(&draft(json!({"name": "A"}))));
    }

    #[test]
    fn test_any_field_non_empty() {
        let pre = Precondition::any_field_non_empty();
        assert!(!pre.is_met(&draft(json!({"a": "", "b": [], "c": false, "d": null}))));
        assert!(pre.is_met(&draft(json!({"a": "", "b": ["item"]}))));
        assert!(pre.is_met(&draft(json!({"age": 0}))));
    }

    #[test]
    fn test_always_accepts_empty_draft() {
        assert!(Precondition::always().is_met(&DraftState::new()));
    }

    #[test]
    fn test_nested_objects_count_when_any_member_is_filled() {
        assert!(!is_filled(&json!({"name": "", "age": null})));
        assert!(is_filled(&json!({"name": "", "age": 61})));
    }

    #[test]
    fn test_debug_shows_name() {
        let pre = Precondition::field_non_empty("name");
        assert!(format!("{pre:?}").contains("field `name` non-empty"));
    }
}
