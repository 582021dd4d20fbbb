//! In-memory field values of one open editing session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping from field name to its current value.
///
/// Pure data: the latest value always wins and no history is kept. Sessions keep it fully
/// defined by starting from [`crate::FormSchema::defaults`] and only writing known fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftState(Map<String, Value>);

impl DraftState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Replace every value at once (used on hydration).
    pub fn replace(&mut self, other: DraftState) {
        *self = other;
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mutable access to a list-valued field, or `None` if the field is absent or not a list.
    pub fn list_mut(&mut self, field: &str) -> Option<&mut Vec<Value>> {
        self.0.get_mut(field).and_then(Value::as_array_mut)
    }
}

impl From<Map<String, Value>> for DraftState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for DraftState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_value_wins() {
        let mut draft = DraftState::new();
        draft.set("name", json!("A"));
        draft.set("name", json!("AB"));

        assert_eq!(draft.get("name"), Some(&json!("AB")));
        assert_eq!(draft.len(), 1);
    }

    #[test]
    fn test_replace_discards_previous_values() {
        let mut draft = DraftState::new();
        draft.set("stale", json!(1));

        let mut loaded = DraftState::new();
        loaded.set("name", json!("Loaded"));
        draft.replace(loaded.clone());

        assert_eq!(draft, loaded);
        assert!(draft.get("stale").is_none());
    }

    #[test]
    fn test_list_mut_only_for_arrays() {
        let mut draft = DraftState::new();
        draft.set("items", json!([]));
        draft.set("name", json!(""));

        draft.list_mut("items").unwrap().push(json!("first"));
        assert_eq!(draft.get("items"), Some(&json!(["first"])));
        assert!(draft.list_mut("name").is_none());
        assert!(draft.list_mut("missing").is_none());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut draft = DraftState::new();
        draft.set("name", json!("A"));
        assert_eq!(serde_json::to_value(&draft).unwrap(), json!({"name": "A"}));
    }
}
