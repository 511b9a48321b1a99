use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::EntityKey;

/// A partial update: the key of the entity to change plus the changed
/// fields as a JSON object. Fields not present in `changes` are untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub key: EntityKey,
    pub changes: Value,
}

impl EntityUpdate {
    pub fn new(key: impl Into<EntityKey>, changes: Value) -> Self {
        EntityUpdate {
            key: key.into(),
            changes,
        }
    }
}

/// What came back from a save-update call: the submitted key, the merged
/// changes, and whether the server reported any change beyond what was
/// submitted. `changed: false` lets an optimistic caller skip reapplying an
/// update it already holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub key: EntityKey,
    pub changes: Value,
    pub changed: bool,
}

impl UpdateResponse {
    pub fn new(key: impl Into<EntityKey>, changes: Value, changed: bool) -> Self {
        UpdateResponse {
            key: key.into(),
            changes,
            changed,
        }
    }
}

/// Shallow-merge `changes` over `base`.
///
/// When both are JSON objects, fields from `changes` replace fields of
/// `base` and the rest of `base` survives. Otherwise `changes` wins
/// outright.
pub fn merge_changes(base: &Value, changes: &Value) -> Value {
    match (base, changes) {
        (Value::Object(base), Value::Object(changes)) => {
            let mut merged = base.clone();
            for (field, value) in changes {
                merged.insert(field.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => changes.clone(),
    }
}
