use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collection::EntityCollection;

/// The whole client-side cache: one collection snapshot per entity name.
///
/// Cloning is cheap (collection snapshots are shared `Arc`s), so every
/// transition hands out a new cache value holding mostly the same
/// snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCache {
    collections: BTreeMap<String, Arc<EntityCollection>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, entity_name: &str) -> Option<&Arc<EntityCollection>> {
        self.collections.get(entity_name)
    }

    pub fn collections(&self) -> impl Iterator<Item = (&str, &Arc<EntityCollection>)> {
        self.collections
            .iter()
            .map(|(name, collection)| (name.as_str(), collection))
    }

    pub fn names(&self) -> Vec<&str> {
        self.collections.keys().map(|name| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub(crate) fn set_collection(
        &mut self,
        entity_name: impl Into<String>,
        collection: Arc<EntityCollection>,
    ) {
        self.collections.insert(entity_name.into(), collection);
    }

    /// Cheap identity check: true when both caches hold the identical
    /// snapshot for every collection. The observer-facing analogue of the
    /// per-collection pointer-equality no-op contract.
    pub fn same_as(&self, other: &EntityCache) -> bool {
        self.collections.len() == other.collections.len()
            && self.collections.iter().all(|(name, collection)| {
                other
                    .collections
                    .get(name)
                    .is_some_and(|theirs| Arc::ptr_eq(collection, theirs))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_as_tracks_snapshot_identity() {
        let mut cache = EntityCache::new();
        cache.set_collection("Hero", Arc::new(EntityCollection::new("Hero")));
        let copy = cache.clone();
        assert!(cache.same_as(&copy));

        let mut replaced = cache.clone();
        replaced.set_collection("Hero", Arc::new(EntityCollection::new("Hero")));
        // Equal by value, but not the identical snapshot.
        assert_eq!(cache, replaced);
        assert!(!cache.same_as(&replaced));
    }

    #[test]
    fn serde_round_trip() {
        let mut cache = EntityCache::new();
        cache.set_collection("Hero", Arc::new(EntityCollection::new("Hero")));
        let text = serde_json::to_string(&cache).unwrap();
        let back: EntityCache = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cache);
    }
}
