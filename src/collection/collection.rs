use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::changes::{ChangeEntry, ChangeState};
use crate::entity::EntityKey;

/// One collection of cached entities of a single type.
///
/// The normalized map is a `BTreeMap`, so iterating it yields entities in
/// native key sort order; there is no separate ordered key list to keep in
/// sync. A collection value is an immutable snapshot: transitions build a
/// wholly new snapshot when anything changes, and hand back the identical
/// `Arc` when nothing does, so observers can detect no-ops by pointer
/// equality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityCollection {
    pub(crate) entity_name: String,
    #[serde(with = "crate::entity::keyed_map")]
    pub(crate) entities: BTreeMap<EntityKey, Value>,
    pub(crate) loading: bool,
    pub(crate) loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) filter: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        with = "crate::entity::keyed_map"
    )]
    pub(crate) change_state: ChangeState,
}

impl EntityCollection {
    /// An empty, not-yet-loaded collection.
    pub fn new(entity_name: impl Into<String>) -> Self {
        EntityCollection {
            entity_name: entity_name.into(),
            entities: BTreeMap::new(),
            loading: false,
            loaded: false,
            filter: None,
            change_state: ChangeState::new(),
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// The normalized key → entity map.
    pub fn entities(&self) -> &BTreeMap<EntityKey, Value> {
        &self.entities
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Value> {
        self.entities.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Keys in native sort order.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// True while a query or save for this collection is in flight.
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// True once a full query has succeeded.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Pending local changes, one entry per affected key.
    pub fn change_state(&self) -> &ChangeState {
        &self.change_state
    }

    pub fn change_for(&self, key: &EntityKey) -> Option<&ChangeEntry> {
        self.change_state.get(key)
    }

    pub fn has_changes(&self) -> bool {
        !self.change_state.is_empty()
    }
}
