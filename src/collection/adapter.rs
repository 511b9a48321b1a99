use std::sync::Arc;

use serde_json::Value;

use crate::entity::{merge_changes, EntityDefinition, EntityKey, EntityUpdate, KeyError};

use super::collection::EntityCollection;

/// Structural operations on a collection's normalized map.
///
/// Every operation is pure: it returns a new snapshot when the map changed
/// and the identical `Arc` when it did not. Change-state bookkeeping is not
/// done here; that is the tracker's job, sequenced around the same command
/// by the reducer.
#[derive(Clone, Debug)]
pub struct CollectionAdapter {
    definition: Arc<EntityDefinition>,
}

impl CollectionAdapter {
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        CollectionAdapter { definition }
    }

    fn key_of(&self, entity: &Value, operation: &'static str) -> Result<EntityKey, KeyError> {
        self.definition
            .key_of(entity)
            .ok_or_else(|| KeyError::new(self.definition.entity_name(), operation))
    }

    /// Insert entities that are not yet present. Existing keys are left
    /// untouched; an add does not replace.
    pub fn add_many(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        if entities.is_empty() {
            return Ok(Arc::clone(collection));
        }
        let mut map = collection.entities.clone();
        let mut changed = false;
        for entity in entities {
            let key = self.key_of(entity, "add")?;
            if !map.contains_key(&key) {
                map.insert(key, entity.clone());
                changed = true;
            }
        }
        if !changed {
            return Ok(Arc::clone(collection));
        }
        Ok(Arc::new(EntityCollection {
            entities: map,
            ..(**collection).clone()
        }))
    }

    pub fn add_one(
        &self,
        entity: &Value,
        collection: &Arc<EntityCollection>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.add_many(std::slice::from_ref(entity), collection)
    }

    /// Replace the whole map with the given entities.
    pub fn set_all(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        let mut map = std::collections::BTreeMap::new();
        for entity in entities {
            let key = self.key_of(entity, "set-all")?;
            map.insert(key, entity.clone());
        }
        Ok(Arc::new(EntityCollection {
            entities: map,
            ..(**collection).clone()
        }))
    }

    /// Apply partial updates to entities already present. Updates for
    /// absent keys are skipped. A merged entity whose resolvable key
    /// differs from the update's key moves to the new key.
    pub fn update_many(
        &self,
        updates: &[EntityUpdate],
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        if updates.is_empty() {
            return Arc::clone(collection);
        }
        let mut map = collection.entities.clone();
        let mut changed = false;
        for update in updates {
            let Some(current) = map.get(&update.key) else {
                continue;
            };
            let merged = merge_changes(current, &update.changes);
            if merged == *current {
                continue;
            }
            let new_key = self.definition.key_of(&merged).unwrap_or(update.key.clone());
            if new_key != update.key {
                map.remove(&update.key);
            }
            map.insert(new_key, merged);
            changed = true;
        }
        if !changed {
            return Arc::clone(collection);
        }
        Arc::new(EntityCollection {
            entities: map,
            ..(**collection).clone()
        })
    }

    pub fn update_one(
        &self,
        update: &EntityUpdate,
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        self.update_many(std::slice::from_ref(update), collection)
    }

    /// Insert new entities and shallow-merge onto existing ones.
    pub fn upsert_many(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        if entities.is_empty() {
            return Ok(Arc::clone(collection));
        }
        let mut map = collection.entities.clone();
        let mut changed = false;
        for entity in entities {
            let key = self.key_of(entity, "upsert")?;
            match map.get(&key) {
                Some(current) => {
                    let merged = merge_changes(current, entity);
                    if merged != *current {
                        map.insert(key, merged);
                        changed = true;
                    }
                }
                None => {
                    map.insert(key, entity.clone());
                    changed = true;
                }
            }
        }
        if !changed {
            return Ok(Arc::clone(collection));
        }
        Ok(Arc::new(EntityCollection {
            entities: map,
            ..(**collection).clone()
        }))
    }

    pub fn upsert_one(
        &self,
        entity: &Value,
        collection: &Arc<EntityCollection>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.upsert_many(std::slice::from_ref(entity), collection)
    }

    /// Insert or replace at an explicit key, bypassing key selection.
    /// Used to restore original values whose key is already known.
    pub(crate) fn restore_many(
        &self,
        restores: &[(EntityKey, Value)],
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        if restores.is_empty() {
            return Arc::clone(collection);
        }
        let mut map = collection.entities.clone();
        let mut changed = false;
        for (key, value) in restores {
            if map.get(key) != Some(value) {
                map.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if !changed {
            return Arc::clone(collection);
        }
        Arc::new(EntityCollection {
            entities: map,
            ..(**collection).clone()
        })
    }

    pub fn remove_many(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        if keys.is_empty() {
            return Arc::clone(collection);
        }
        let mut map = collection.entities.clone();
        let mut changed = false;
        for key in keys {
            changed |= map.remove(key).is_some();
        }
        if !changed {
            return Arc::clone(collection);
        }
        Arc::new(EntityCollection {
            entities: map,
            ..(**collection).clone()
        })
    }

    pub fn remove_one(
        &self,
        key: &EntityKey,
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        self.remove_many(std::slice::from_ref(key), collection)
    }

    pub fn remove_all(&self, collection: &Arc<EntityCollection>) -> Arc<EntityCollection> {
        if collection.entities.is_empty() {
            return Arc::clone(collection);
        }
        Arc::new(EntityCollection {
            entities: std::collections::BTreeMap::new(),
            ..(**collection).clone()
        })
    }
}
