use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityKey;

/// What kind of unsaved local change an entity carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// Added locally; the server has never seen it.
    Added,
    /// Deleted locally; `original_value` is the last known server state.
    Deleted,
    /// Updated locally; `original_value` is the pre-edit value.
    Updated,
}

/// One pending local change. Absence of an entry means "no pending change".
///
/// An `Added` entry never carries an original value; `Deleted` and
/// `Updated` entries always do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<Value>,
}

impl ChangeEntry {
    pub fn added() -> Self {
        ChangeEntry {
            change_type: ChangeType::Added,
            original_value: None,
        }
    }

    pub fn deleted(original_value: Value) -> Self {
        ChangeEntry {
            change_type: ChangeType::Deleted,
            original_value: Some(original_value),
        }
    }

    pub fn updated(original_value: Value) -> Self {
        ChangeEntry {
            change_type: ChangeType::Updated,
            original_value: Some(original_value),
        }
    }
}

/// The change-state map of a collection: one entry per entity key with a
/// pending local change.
pub type ChangeState = BTreeMap<EntityKey, ChangeEntry>;

/// How an incoming server entity combines with a pending local change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Take the server value and skip all change-state bookkeeping; the
    /// pending entry (and its original value) stays exactly as it was.
    IgnoreChanges,
    /// Keep the pending local value as current; the server value becomes
    /// the entry's `original_value`, so a later undo reverts to the latest
    /// known server state.
    PreserveChanges,
    /// The server value wins outright and the pending entry is cleared.
    OverwriteChanges,
}

impl MergeStrategy {
    /// Default for query-result merges.
    pub fn query_default() -> Self {
        MergeStrategy::PreserveChanges
    }

    /// Default for save-result merges.
    pub fn save_default() -> Self {
        MergeStrategy::OverwriteChanges
    }
}
