use std::sync::Arc;

use serde_json::Value;

use crate::collection::{CollectionAdapter, EntityCollection};
use crate::entity::{
    merge_changes, EntityDefinition, EntityKey, EntityUpdate, KeyError, UpdateResponse,
};

use super::state::{ChangeEntry, ChangeState, ChangeType, MergeStrategy};

/// Records, commits, undoes, and reconciles per-entity change state.
///
/// Every operation is pure: the input snapshot is never mutated, a new
/// snapshot comes back when anything changed, and the identical `Arc`
/// comes back when nothing did. Track operations record intent only; the
/// normalized map itself is mutated by the adapter, sequenced around the
/// same command by the reducer.
#[derive(Clone, Debug)]
pub struct ChangeTracker {
    definition: Arc<EntityDefinition>,
    adapter: CollectionAdapter,
}

impl ChangeTracker {
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        ChangeTracker {
            adapter: CollectionAdapter::new(Arc::clone(&definition)),
            definition,
        }
    }

    fn key_of(&self, entity: &Value, operation: &'static str) -> Result<EntityKey, KeyError> {
        self.definition
            .key_of(entity)
            .ok_or_else(|| KeyError::new(self.definition.entity_name(), operation))
    }

    fn with_change_state(
        &self,
        collection: &Arc<EntityCollection>,
        change_state: ChangeState,
    ) -> Arc<EntityCollection> {
        Arc::new(EntityCollection {
            change_state,
            ..(**collection).clone()
        })
    }

    // ------------------------------------------------------------------
    // Track
    // ------------------------------------------------------------------

    /// Record the intent to add entities.
    ///
    /// An entity already tracked as Deleted is reclassified as Updated,
    /// keeping the deleted entry's original value: delete-then-re-add nets
    /// out to an update of the server's copy.
    pub fn track_add_many(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        if entities.is_empty() || merge_strategy == Some(MergeStrategy::IgnoreChanges) {
            return Ok(Arc::clone(collection));
        }
        let mut change_state = collection.change_state.clone();
        let mut mutated = false;
        for entity in entities {
            let key = self.key_of(entity, "track-add")?;
            match change_state.get(&key) {
                None => {
                    change_state.insert(key, ChangeEntry::added());
                    mutated = true;
                }
                Some(entry) if entry.change_type == ChangeType::Deleted => {
                    let original = entry.original_value.clone();
                    change_state.insert(
                        key,
                        ChangeEntry {
                            change_type: ChangeType::Updated,
                            original_value: original,
                        },
                    );
                    mutated = true;
                }
                Some(_) => {}
            }
        }
        if !mutated {
            return Ok(Arc::clone(collection));
        }
        Ok(self.with_change_state(collection, change_state))
    }

    pub fn track_add_one(
        &self,
        entity: &Value,
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.track_add_many(std::slice::from_ref(entity), collection, merge_strategy)
    }

    /// Record the intent to delete entities by key.
    ///
    /// A key tracked as Added loses its tracking entirely: the entity
    /// never reached the server, so there is nothing to delete there. A
    /// key tracked as Updated is reclassified as Deleted, preserving the
    /// pre-edit original.
    pub fn track_delete_many(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Arc<EntityCollection> {
        if keys.is_empty() || merge_strategy == Some(MergeStrategy::IgnoreChanges) {
            return Arc::clone(collection);
        }
        let mut change_state = collection.change_state.clone();
        let mut mutated = false;
        for key in keys {
            match change_state.get(key) {
                Some(entry) => match entry.change_type {
                    ChangeType::Added => {
                        change_state.remove(key);
                        mutated = true;
                    }
                    ChangeType::Updated => {
                        let original = entry.original_value.clone();
                        change_state.insert(
                            key.clone(),
                            ChangeEntry {
                                change_type: ChangeType::Deleted,
                                original_value: original,
                            },
                        );
                        mutated = true;
                    }
                    ChangeType::Deleted => {}
                },
                None => {
                    if let Some(entity) = collection.get(key) {
                        change_state.insert(key.clone(), ChangeEntry::deleted(entity.clone()));
                        mutated = true;
                    }
                }
            }
        }
        if !mutated {
            return Arc::clone(collection);
        }
        self.with_change_state(collection, change_state)
    }

    pub fn track_delete_one(
        &self,
        key: &EntityKey,
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Arc<EntityCollection> {
        self.track_delete_many(std::slice::from_ref(key), collection, merge_strategy)
    }

    /// Record the intent to update entities.
    ///
    /// Only entities present in the collection are tracked; absent keys
    /// are silently skipped. An existing entry keeps its first original.
    pub fn track_update_many(
        &self,
        updates: &[EntityUpdate],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Arc<EntityCollection> {
        if updates.is_empty() || merge_strategy == Some(MergeStrategy::IgnoreChanges) {
            return Arc::clone(collection);
        }
        let mut change_state = collection.change_state.clone();
        let mut mutated = false;
        for update in updates {
            if let Some(current) = collection.get(&update.key) {
                if !change_state.contains_key(&update.key) {
                    change_state.insert(update.key.clone(), ChangeEntry::updated(current.clone()));
                    mutated = true;
                }
            }
        }
        if !mutated {
            return Arc::clone(collection);
        }
        self.with_change_state(collection, change_state)
    }

    pub fn track_update_one(
        &self,
        update: &EntityUpdate,
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Arc<EntityCollection> {
        self.track_update_many(std::slice::from_ref(update), collection, merge_strategy)
    }

    /// Record the intent to upsert entities: Added when absent from the
    /// collection, Updated when present, reclassified from Deleted like a
    /// re-add.
    pub fn track_upsert_many(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        if entities.is_empty() || merge_strategy == Some(MergeStrategy::IgnoreChanges) {
            return Ok(Arc::clone(collection));
        }
        let mut change_state = collection.change_state.clone();
        let mut mutated = false;
        for entity in entities {
            let key = self.key_of(entity, "track-upsert")?;
            match change_state.get(&key) {
                None => {
                    let entry = match collection.get(&key) {
                        Some(current) => ChangeEntry::updated(current.clone()),
                        None => ChangeEntry::added(),
                    };
                    change_state.insert(key, entry);
                    mutated = true;
                }
                Some(entry) if entry.change_type == ChangeType::Deleted => {
                    let original = entry.original_value.clone();
                    change_state.insert(
                        key,
                        ChangeEntry {
                            change_type: ChangeType::Updated,
                            original_value: original,
                        },
                    );
                    mutated = true;
                }
                Some(_) => {}
            }
        }
        if !mutated {
            return Ok(Arc::clone(collection));
        }
        Ok(self.with_change_state(collection, change_state))
    }

    pub fn track_upsert_one(
        &self,
        entity: &Value,
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.track_upsert_many(std::slice::from_ref(entity), collection, merge_strategy)
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Clear the change entries for the given keys unconditionally.
    pub fn commit_many(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        if keys.is_empty() || collection.change_state.is_empty() {
            return Arc::clone(collection);
        }
        let mut change_state = collection.change_state.clone();
        let mut mutated = false;
        for key in keys {
            mutated |= change_state.remove(key).is_some();
        }
        if !mutated {
            return Arc::clone(collection);
        }
        self.with_change_state(collection, change_state)
    }

    pub fn commit_one(
        &self,
        key: &EntityKey,
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        self.commit_many(std::slice::from_ref(key), collection)
    }

    /// Clear every change entry.
    pub fn commit_all(&self, collection: &Arc<EntityCollection>) -> Arc<EntityCollection> {
        if collection.change_state.is_empty() {
            return Arc::clone(collection);
        }
        self.with_change_state(collection, ChangeState::new())
    }

    // ------------------------------------------------------------------
    // Undo
    // ------------------------------------------------------------------

    /// Discard the pending changes for the given keys: Added entities are
    /// removed from the collection, Deleted and Updated entities revert to
    /// their original values. Applied as one remove pass then one restore
    /// pass; untracked keys are ignored.
    pub fn undo_many(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        if keys.is_empty() || collection.change_state.is_empty() {
            return Arc::clone(collection);
        }
        let mut change_state = collection.change_state.clone();
        let mut removes = Vec::new();
        let mut restores = Vec::new();
        for key in keys {
            let Some(entry) = change_state.remove(key) else {
                continue;
            };
            match entry.change_type {
                ChangeType::Added => removes.push(key.clone()),
                ChangeType::Deleted | ChangeType::Updated => {
                    if let Some(original) = entry.original_value {
                        let restore_key =
                            self.definition.key_of(&original).unwrap_or_else(|| key.clone());
                        restores.push((restore_key, original));
                    }
                }
            }
        }
        if removes.is_empty() && restores.is_empty() && change_state == collection.change_state {
            return Arc::clone(collection);
        }
        let collection = self.adapter.remove_many(&removes, collection);
        let collection = self.adapter.restore_many(&restores, &collection);
        self.with_change_state(&collection, change_state)
    }

    pub fn undo_one(
        &self,
        key: &EntityKey,
        collection: &Arc<EntityCollection>,
    ) -> Arc<EntityCollection> {
        self.undo_many(std::slice::from_ref(key), collection)
    }

    /// Discard every pending change.
    pub fn undo_all(&self, collection: &Arc<EntityCollection>) -> Arc<EntityCollection> {
        let keys: Vec<EntityKey> = collection.change_state.keys().cloned().collect();
        self.undo_many(&keys, collection)
    }

    // ------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------

    /// Fold query results into the collection. Defaults to
    /// PreserveChanges: pending local edits stay current, the fresh server
    /// value becomes each pending entry's original.
    pub fn merge_query_results(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.merge_server_upserts(
            entities,
            collection,
            merge_strategy.unwrap_or_else(MergeStrategy::query_default),
        )
    }

    /// Fold save-add results into the collection (OverwriteChanges
    /// default; server-assigned fields must win).
    pub fn merge_save_adds(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.merge_server_upserts(
            entities,
            collection,
            merge_strategy.unwrap_or_else(MergeStrategy::save_default),
        )
    }

    /// Fold save-upsert results into the collection (OverwriteChanges
    /// default).
    pub fn merge_save_upserts(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        self.merge_server_upserts(
            entities,
            collection,
            merge_strategy.unwrap_or_else(MergeStrategy::save_default),
        )
    }

    /// Fold confirmed deletes into the collection. The entities always
    /// leave the normalized map; whether their change entries are cleared
    /// honors the merge strategy (IgnoreChanges skips the commit).
    pub fn merge_save_deletes(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
    ) -> Arc<EntityCollection> {
        if keys.is_empty() {
            return Arc::clone(collection);
        }
        let merge_strategy = merge_strategy.unwrap_or_else(MergeStrategy::save_default);
        let collection = if merge_strategy == MergeStrategy::IgnoreChanges {
            Arc::clone(collection)
        } else {
            self.commit_many(keys, collection)
        };
        self.adapter.remove_many(keys, &collection)
    }

    /// Fold save-update responses into the collection (OverwriteChanges
    /// default). With `skip_unchanged`, responses whose `changed` flag is
    /// false are not reapplied to the map (the optimistic edit already
    /// holds), though their change-state bookkeeping still runs.
    pub fn merge_save_updates(
        &self,
        responses: &[UpdateResponse],
        collection: &Arc<EntityCollection>,
        merge_strategy: Option<MergeStrategy>,
        skip_unchanged: bool,
    ) -> Arc<EntityCollection> {
        if responses.is_empty() {
            return Arc::clone(collection);
        }
        let merge_strategy = merge_strategy.unwrap_or_else(MergeStrategy::save_default);
        match merge_strategy {
            MergeStrategy::IgnoreChanges => {
                let updates = filter_changed(responses, skip_unchanged);
                self.adapter.update_many(&updates, collection)
            }
            MergeStrategy::OverwriteChanges => {
                let keys: Vec<EntityKey> =
                    responses.iter().map(|response| response.key.clone()).collect();
                let collection = self.commit_many(&keys, collection);
                let updates = filter_changed(responses, skip_unchanged);
                self.adapter.update_many(&updates, &collection)
            }
            MergeStrategy::PreserveChanges => {
                let mut change_state = collection.change_state.clone();
                let mut mutated = false;
                let mut updateable = Vec::new();
                for response in responses {
                    match change_state.remove(&response.key) {
                        Some(entry) => {
                            mutated = true;
                            let new_key = self
                                .definition
                                .key_of(&response.changes)
                                .unwrap_or_else(|| response.key.clone());
                            let base = entry.original_value.unwrap_or(Value::Null);
                            let original = merge_changes(&base, &response.changes);
                            change_state.insert(
                                new_key,
                                ChangeEntry {
                                    change_type: entry.change_type,
                                    original_value: Some(original),
                                },
                            );
                        }
                        None => updateable.push(response.clone()),
                    }
                }
                let collection = if mutated {
                    self.with_change_state(collection, change_state)
                } else {
                    Arc::clone(collection)
                };
                let updates = filter_changed(&updateable, skip_unchanged);
                self.adapter.update_many(&updates, &collection)
            }
        }
    }

    fn merge_server_upserts(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        merge_strategy: MergeStrategy,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        if entities.is_empty() {
            return Ok(Arc::clone(collection));
        }
        match merge_strategy {
            MergeStrategy::IgnoreChanges => self.adapter.upsert_many(entities, collection),
            MergeStrategy::OverwriteChanges => {
                let mut keys = Vec::with_capacity(entities.len());
                for entity in entities {
                    keys.push(self.key_of(entity, "merge")?);
                }
                let collection = self.adapter.upsert_many(entities, collection)?;
                Ok(self.commit_many(&keys, &collection))
            }
            MergeStrategy::PreserveChanges => {
                let mut change_state = collection.change_state.clone();
                let mut mutated = false;
                let mut upserts = Vec::new();
                for entity in entities {
                    let key = self.key_of(entity, "merge")?;
                    match change_state.get_mut(&key) {
                        Some(entry) => {
                            entry.original_value = Some(entity.clone());
                            mutated = true;
                        }
                        None => upserts.push(entity.clone()),
                    }
                }
                let collection = self.adapter.upsert_many(&upserts, collection)?;
                if !mutated {
                    return Ok(collection);
                }
                Ok(self.with_change_state(&collection, change_state))
            }
        }
    }
}

fn filter_changed(responses: &[UpdateResponse], skip_unchanged: bool) -> Vec<EntityUpdate> {
    responses
        .iter()
        .filter(|response| !skip_unchanged || response.changed)
        .map(|response| EntityUpdate::new(response.key.clone(), response.changes.clone()))
        .collect()
}
