use std::sync::Arc;

use serde_json::Value;

use crate::action::{EntityAction, EntityOp};
use crate::changes::{ChangeState, ChangeTracker, ChangeType};
use crate::entity::{EntityDefinition, EntityKey, KeyError, UpdateResponse};

use super::adapter::CollectionAdapter;
use super::collection::EntityCollection;

/// Result of reducing one action against one collection.
#[derive(Clone, Debug)]
pub struct ReducedCollection {
    pub collection: Arc<EntityCollection>,
    /// True when the reducer determined the command needs no network
    /// execution: deleting an entity that was only ever Added locally.
    /// The persistence orchestrator honors this by synthesizing success.
    pub skip: bool,
}

/// The per-collection state machine: a total function from (collection,
/// operation) to the next snapshot.
///
/// Key-resolution failures are programmer errors and surface as `Err`;
/// they are never converted into outcomes.
#[derive(Clone, Debug)]
pub struct EntityCollectionReducer {
    definition: Arc<EntityDefinition>,
    adapter: CollectionAdapter,
    tracker: ChangeTracker,
}

impl EntityCollectionReducer {
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        EntityCollectionReducer {
            adapter: CollectionAdapter::new(Arc::clone(&definition)),
            tracker: ChangeTracker::new(Arc::clone(&definition)),
            definition,
        }
    }

    pub fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    /// The empty initial snapshot for this entity type.
    pub fn create_collection(&self) -> Arc<EntityCollection> {
        Arc::new(EntityCollection::new(self.definition.entity_name()))
    }

    pub fn reduce(
        &self,
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Result<ReducedCollection, KeyError> {
        use EntityOp::*;

        let strategy = action.merge_strategy;
        let defaults = self.definition.save_defaults();

        let reduced = match &action.op {
            // ----------------------------------------------------------
            // Query lifecycle
            // ----------------------------------------------------------
            QueryAll | QueryLoad | QueryMany { .. } | QueryByKey { .. } => {
                self.set_loading(collection, true)
            }
            QueryAllError { .. }
            | QueryLoadError { .. }
            | QueryManyError { .. }
            | QueryByKeyError { .. } => self.set_loading(collection, false),
            QueryAllSuccess { entities } => {
                let collection = self.tracker.merge_query_results(entities, collection, strategy)?;
                self.settle_loaded(&collection)
            }
            QueryLoadSuccess { entities } => {
                let collection = self.adapter.set_all(entities, collection)?;
                Arc::new(EntityCollection {
                    loading: false,
                    loaded: true,
                    change_state: ChangeState::new(),
                    ..(*collection).clone()
                })
            }
            QueryManySuccess { entities } => {
                let collection = self.tracker.merge_query_results(entities, collection, strategy)?;
                self.set_loading(&collection, false)
            }
            QueryByKeySuccess { entity } => {
                let collection = if entity.is_null() {
                    Arc::clone(collection)
                } else {
                    self.tracker.merge_query_results(
                        std::slice::from_ref(entity),
                        collection,
                        strategy,
                    )?
                };
                self.set_loading(&collection, false)
            }

            // ----------------------------------------------------------
            // Save: add
            // ----------------------------------------------------------
            SaveAddOne { entity } => {
                self.save_add_start(std::slice::from_ref(entity), collection, action)?
            }
            SaveAddMany { entities } => self.save_add_start(entities, collection, action)?,
            SaveAddOneSuccess { entity } => {
                self.save_add_success(std::slice::from_ref(entity), collection, action)?
            }
            SaveAddManySuccess { entities } => {
                self.save_add_success(entities, collection, action)?
            }

            // ----------------------------------------------------------
            // Save: delete
            // ----------------------------------------------------------
            SaveDeleteOne { key } => {
                return self.save_delete_start(std::slice::from_ref(key), collection, action);
            }
            SaveDeleteMany { keys } => {
                return self.save_delete_start(keys, collection, action);
            }
            SaveDeleteOneSuccess { key } => {
                self.save_delete_success(std::slice::from_ref(key), collection, action)
            }
            SaveDeleteManySuccess { keys } => {
                self.save_delete_success(keys, collection, action)
            }

            // ----------------------------------------------------------
            // Save: update
            // ----------------------------------------------------------
            SaveUpdateOne { update } => {
                let optimistic = action.is_optimistic.unwrap_or(defaults.optimistic_update);
                let collection = if optimistic {
                    let collection =
                        self.tracker.track_update_one(update, collection, strategy);
                    self.adapter.update_one(update, &collection)
                } else {
                    Arc::clone(collection)
                };
                self.set_loading(&collection, true)
            }
            SaveUpdateMany { updates } => {
                let optimistic = action.is_optimistic.unwrap_or(defaults.optimistic_update);
                let collection = if optimistic {
                    let collection =
                        self.tracker.track_update_many(updates, collection, strategy);
                    self.adapter.update_many(updates, &collection)
                } else {
                    Arc::clone(collection)
                };
                self.set_loading(&collection, true)
            }
            SaveUpdateOneSuccess { response } => {
                self.save_update_success(std::slice::from_ref(response), collection, action)
            }
            SaveUpdateManySuccess { responses } => {
                self.save_update_success(responses, collection, action)
            }

            // ----------------------------------------------------------
            // Save: upsert
            // ----------------------------------------------------------
            SaveUpsertOne { entity } => {
                self.save_upsert_start(std::slice::from_ref(entity), collection, action)?
            }
            SaveUpsertMany { entities } => self.save_upsert_start(entities, collection, action)?,
            SaveUpsertOneSuccess { entity } => {
                let collection = self.tracker.merge_save_upserts(
                    std::slice::from_ref(entity),
                    collection,
                    strategy,
                )?;
                self.set_loading(&collection, false)
            }
            SaveUpsertManySuccess { entities } => {
                let collection = self.tracker.merge_save_upserts(entities, collection, strategy)?;
                self.set_loading(&collection, false)
            }

            // ----------------------------------------------------------
            // Save: errors only reset the loading flag. An optimistic
            // mutation stays in place; compensation is the caller's call,
            // via undo if tracking was on.
            // ----------------------------------------------------------
            SaveAddOneError { .. }
            | SaveAddManyError { .. }
            | SaveDeleteOneError { .. }
            | SaveDeleteManyError { .. }
            | SaveUpdateOneError { .. }
            | SaveUpdateManyError { .. }
            | SaveUpsertOneError { .. }
            | SaveUpsertManyError { .. } => self.set_loading(collection, false),

            // ----------------------------------------------------------
            // Cache-only
            // ----------------------------------------------------------
            AddAll { entities } => {
                let collection = self.adapter.set_all(entities, collection)?;
                Arc::new(EntityCollection {
                    loading: false,
                    loaded: true,
                    change_state: ChangeState::new(),
                    ..(*collection).clone()
                })
            }
            AddMany { entities } => {
                let collection = self.tracker.track_add_many(entities, collection, strategy)?;
                self.adapter.add_many(entities, &collection)?
            }
            AddOne { entity } => {
                let collection = self.tracker.track_add_one(entity, collection, strategy)?;
                self.adapter.add_one(entity, &collection)?
            }
            RemoveAll => Arc::new(EntityCollection {
                entities: Default::default(),
                loading: false,
                loaded: false,
                change_state: ChangeState::new(),
                ..(**collection).clone()
            }),
            RemoveMany { keys } => {
                let collection = self.tracker.track_delete_many(keys, collection, strategy);
                self.adapter.remove_many(keys, &collection)
            }
            RemoveOne { key } => {
                let collection = self.tracker.track_delete_one(key, collection, strategy);
                self.adapter.remove_one(key, &collection)
            }
            UpdateMany { updates } => {
                let collection = self.tracker.track_update_many(updates, collection, strategy);
                self.adapter.update_many(updates, &collection)
            }
            UpdateOne { update } => {
                let collection = self.tracker.track_update_one(update, collection, strategy);
                self.adapter.update_one(update, &collection)
            }
            UpsertMany { entities } => {
                let collection = self.tracker.track_upsert_many(entities, collection, strategy)?;
                self.adapter.upsert_many(entities, &collection)?
            }
            UpsertOne { entity } => {
                let collection = self.tracker.track_upsert_one(entity, collection, strategy)?;
                self.adapter.upsert_one(entity, &collection)?
            }
            CommitAll => self.tracker.commit_all(collection),
            CommitMany { keys } => self.tracker.commit_many(keys, collection),
            CommitOne { key } => self.tracker.commit_one(key, collection),
            UndoAll => self.tracker.undo_all(collection),
            UndoMany { keys } => self.tracker.undo_many(keys, collection),
            UndoOne { key } => self.tracker.undo_one(key, collection),
            SetFilter { pattern } => {
                if collection.filter == *pattern {
                    Arc::clone(collection)
                } else {
                    Arc::new(EntityCollection {
                        filter: pattern.clone(),
                        ..(**collection).clone()
                    })
                }
            }
            SetLoaded { loaded } => {
                if collection.loaded == *loaded {
                    Arc::clone(collection)
                } else {
                    Arc::new(EntityCollection {
                        loaded: *loaded,
                        ..(**collection).clone()
                    })
                }
            }
            SetLoading { loading } => self.set_loading(collection, *loading),
            SetChangeState { change_state } => {
                if collection.change_state == *change_state {
                    Arc::clone(collection)
                } else {
                    Arc::new(EntityCollection {
                        change_state: change_state.clone(),
                        ..(**collection).clone()
                    })
                }
            }
            SetCollection { collection } => Arc::new(collection.clone()),

            // ----------------------------------------------------------
            // Cancellation: the request is targeted in the orchestrator;
            // only the terminal canceled outcome touches the collection.
            // ----------------------------------------------------------
            CancelPersist { .. } => Arc::clone(collection),
            CanceledPersist { .. } => self.set_loading(collection, false),
        };

        Ok(ReducedCollection {
            collection: reduced,
            skip: action.skip,
        })
    }

    fn save_add_start(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        let optimistic = action
            .is_optimistic
            .unwrap_or(self.definition.save_defaults().optimistic_add);
        let collection = if optimistic {
            let collection =
                self.tracker.track_add_many(entities, collection, action.merge_strategy)?;
            self.adapter.add_many(entities, &collection)?
        } else {
            Arc::clone(collection)
        };
        Ok(self.set_loading(&collection, true))
    }

    /// A pessimistic add inserts the server's entity now. An optimistic
    /// add already holds the entity, but the server may have revised
    /// fields (assigned ids, concurrency tokens), so the response is
    /// merged back as an update.
    fn save_add_success(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        let optimistic = action
            .is_optimistic
            .unwrap_or(self.definition.save_defaults().optimistic_add);
        let collection = if optimistic {
            let mut responses = Vec::with_capacity(entities.len());
            for entity in entities {
                let key = self
                    .definition
                    .key_of(entity)
                    .ok_or_else(|| KeyError::new(self.definition.entity_name(), "save-add-success"))?;
                responses.push(UpdateResponse::new(key, entity.clone(), true));
            }
            self.tracker
                .merge_save_updates(&responses, collection, action.merge_strategy, false)
        } else {
            self.tracker.merge_save_adds(entities, collection, action.merge_strategy)?
        };
        Ok(self.set_loading(&collection, false))
    }

    fn save_delete_start(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Result<ReducedCollection, KeyError> {
        let mut collection = Arc::clone(collection);
        let mut remaining = 0usize;
        for key in keys {
            match collection.change_for(key).map(|entry| entry.change_type) {
                // Deleting an entity that was only ever Added locally:
                // drop it and its tracking now; there is nothing to
                // delete server-side.
                Some(ChangeType::Added) => {
                    collection = self.adapter.remove_one(key, &collection);
                    collection = self.tracker.commit_one(key, &collection);
                }
                // Re-track as a delete even when tracking was turned off
                // for this call.
                Some(_) => {
                    remaining += 1;
                    collection = self.tracker.track_delete_one(key, &collection, None);
                }
                None => remaining += 1,
            }
        }
        let skip = action.skip || (remaining == 0 && !keys.is_empty());

        let optimistic = action
            .is_optimistic
            .unwrap_or(self.definition.save_defaults().optimistic_delete);
        if optimistic {
            collection = self.tracker.track_delete_many(keys, &collection, action.merge_strategy);
            collection = self.adapter.remove_many(keys, &collection);
        }
        Ok(ReducedCollection {
            collection: self.set_loading(&collection, true),
            skip,
        })
    }

    fn save_delete_success(
        &self,
        keys: &[EntityKey],
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Arc<EntityCollection> {
        let optimistic = action
            .is_optimistic
            .unwrap_or(self.definition.save_defaults().optimistic_delete);
        let collection = if optimistic {
            self.tracker.merge_save_deletes(keys, collection, action.merge_strategy)
        } else {
            let collection = self.adapter.remove_many(keys, collection);
            self.tracker.commit_many(keys, &collection)
        };
        self.set_loading(&collection, false)
    }

    fn save_update_success(
        &self,
        responses: &[UpdateResponse],
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Arc<EntityCollection> {
        let optimistic = action
            .is_optimistic
            .unwrap_or(self.definition.save_defaults().optimistic_update);
        // When the save was optimistic the edit is already in the map;
        // responses the server left unchanged need not be reapplied.
        let collection = self.tracker.merge_save_updates(
            responses,
            collection,
            action.merge_strategy,
            optimistic,
        );
        self.set_loading(&collection, false)
    }

    fn save_upsert_start(
        &self,
        entities: &[Value],
        collection: &Arc<EntityCollection>,
        action: &EntityAction,
    ) -> Result<Arc<EntityCollection>, KeyError> {
        let optimistic = action
            .is_optimistic
            .unwrap_or(self.definition.save_defaults().optimistic_upsert);
        let collection = if optimistic {
            let collection =
                self.tracker.track_upsert_many(entities, collection, action.merge_strategy)?;
            self.adapter.upsert_many(entities, &collection)?
        } else {
            Arc::clone(collection)
        };
        Ok(self.set_loading(&collection, true))
    }

    fn set_loading(
        &self,
        collection: &Arc<EntityCollection>,
        loading: bool,
    ) -> Arc<EntityCollection> {
        if collection.loading == loading {
            return Arc::clone(collection);
        }
        Arc::new(EntityCollection {
            loading,
            ..(**collection).clone()
        })
    }

    fn settle_loaded(&self, collection: &Arc<EntityCollection>) -> Arc<EntityCollection> {
        if collection.loaded && !collection.loading {
            return Arc::clone(collection);
        }
        Arc::new(EntityCollection {
            loading: false,
            loaded: true,
            ..(**collection).clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityUpdate;
    use serde_json::json;

    fn reducer() -> EntityCollectionReducer {
        EntityCollectionReducer::new(Arc::new(EntityDefinition::new("Hero")))
    }

    fn reduce(
        reducer: &EntityCollectionReducer,
        collection: &Arc<EntityCollection>,
        op: EntityOp,
    ) -> Arc<EntityCollection> {
        reducer
            .reduce(collection, &EntityAction::new("Hero", op))
            .unwrap()
            .collection
    }

    #[test]
    fn query_start_and_error_toggle_loading() {
        let reducer = reducer();
        let collection = reducer.create_collection();

        let loading = reduce(&reducer, &collection, EntityOp::QueryAll);
        assert!(loading.loading());

        let failed = reduce(
            &reducer,
            &loading,
            EntityOp::QueryAllError { error: crate::persist::DataServiceError::local("x") },
        );
        assert!(!failed.loading());
        assert!(!failed.loaded());
    }

    #[test]
    fn query_all_success_merges_and_marks_loaded() {
        let reducer = reducer();
        let collection = reduce(&reducer, &reducer.create_collection(), EntityOp::QueryAll);
        let collection = reduce(
            &reducer,
            &collection,
            EntityOp::QueryAllSuccess { entities: vec![json!({ "id": 1, "name": "A" })] },
        );

        assert!(collection.loaded());
        assert!(!collection.loading());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn query_load_success_replaces_everything() {
        let reducer = reducer();
        let collection = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::AddOne { entity: json!({ "id": 1, "name": "local" }) },
        );
        assert!(collection.has_changes());

        let collection = reduce(
            &reducer,
            &collection,
            EntityOp::QueryLoadSuccess { entities: vec![json!({ "id": 2, "name": "B" })] },
        );

        assert!(collection.loaded());
        assert!(!collection.has_changes());
        assert!(!collection.contains(&EntityKey::from(1)));
        assert!(collection.contains(&EntityKey::from(2)));
    }

    #[test]
    fn simple_set_ops_short_circuit_on_equal_values() {
        let reducer = reducer();
        let collection = reducer.create_collection();
        let next = reduce(&reducer, &collection, EntityOp::SetLoading { loading: false });
        assert!(Arc::ptr_eq(&collection, &next));
        let next = reduce(&reducer, &collection, EntityOp::SetFilter { pattern: None });
        assert!(Arc::ptr_eq(&collection, &next));
    }

    #[test]
    fn pessimistic_save_add_defers_the_entity() {
        let reducer = reducer();
        let start = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::SaveAddOne { entity: json!({ "id": 1, "name": "A" }) },
        );
        assert!(start.loading());
        assert!(start.is_empty());
        assert!(!start.has_changes());

        let done = reduce(
            &reducer,
            &start,
            EntityOp::SaveAddOneSuccess { entity: json!({ "id": 1, "name": "A" }) },
        );
        assert!(!done.loading());
        assert_eq!(done.get(&EntityKey::from(1)), Some(&json!({ "id": 1, "name": "A" })));
    }

    #[test]
    fn optimistic_save_add_applies_and_tracks_immediately() {
        let reducer = reducer();
        let action = EntityAction::new(
            "Hero",
            EntityOp::SaveAddOne { entity: json!({ "id": 1, "name": "A" }) },
        )
        .optimistic(true);
        let start = reducer
            .reduce(&reducer.create_collection(), &action)
            .unwrap()
            .collection;

        assert!(start.loading());
        assert!(start.contains(&EntityKey::from(1)));
        assert_eq!(
            start.change_for(&EntityKey::from(1)).unwrap().change_type,
            ChangeType::Added
        );

        // Server assigned a field; the success merges it onto the entity.
        let success = EntityAction::new(
            "Hero",
            EntityOp::SaveAddOneSuccess { entity: json!({ "id": 1, "name": "A", "rev": 7 }) },
        )
        .optimistic(true);
        let done = reducer.reduce(&start, &success).unwrap().collection;
        assert!(!done.loading());
        assert_eq!(
            done.get(&EntityKey::from(1)),
            Some(&json!({ "id": 1, "name": "A", "rev": 7 }))
        );
        assert!(!done.has_changes());
    }

    #[test]
    fn save_error_keeps_the_optimistic_mutation() {
        let reducer = reducer();
        let action = EntityAction::new(
            "Hero",
            EntityOp::SaveAddOne { entity: json!({ "id": 1, "name": "A" }) },
        )
        .optimistic(true);
        let start = reducer
            .reduce(&reducer.create_collection(), &action)
            .unwrap()
            .collection;

        let failed = reduce(
            &reducer,
            &start,
            EntityOp::SaveAddOneError { error: crate::persist::DataServiceError::local("x") },
        );
        // No auto-rollback: entity and tracking stay; only loading clears.
        assert!(!failed.loading());
        assert!(failed.contains(&EntityKey::from(1)));
        assert!(failed.has_changes());
    }

    #[test]
    fn pessimistic_delete_scenario() {
        let reducer = reducer();
        let collection = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::QueryLoadSuccess { entities: vec![json!({ "id": 5, "name": "E" })] },
        );

        let action = EntityAction::new("Hero", EntityOp::SaveDeleteOne { key: EntityKey::from(5) })
            .optimistic(false);
        let reduced = reducer.reduce(&collection, &action).unwrap();
        assert!(!reduced.skip);
        let start = reduced.collection;

        // Pessimistic: entity stays, loading on, no tracking added.
        assert!(start.contains(&EntityKey::from(5)));
        assert!(start.loading());
        assert!(start.change_for(&EntityKey::from(5)).is_none());

        let success = EntityAction::new(
            "Hero",
            EntityOp::SaveDeleteOneSuccess { key: EntityKey::from(5) },
        )
        .optimistic(false);
        let done = reducer.reduce(&start, &success).unwrap().collection;
        assert!(!done.contains(&EntityKey::from(5)));
        assert!(!done.loading());
        assert!(done.change_for(&EntityKey::from(5)).is_none());
    }

    #[test]
    fn deleting_an_added_entity_marks_the_command_skippable() {
        let reducer = reducer();
        let collection = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::AddOne { entity: json!({ "id": 1, "name": "new" }) },
        );
        assert_eq!(
            collection.change_for(&EntityKey::from(1)).unwrap().change_type,
            ChangeType::Added
        );

        let action = EntityAction::new("Hero", EntityOp::SaveDeleteOne { key: EntityKey::from(1) });
        let reduced = reducer.reduce(&collection, &action).unwrap();

        assert!(reduced.skip);
        assert!(!reduced.collection.contains(&EntityKey::from(1)));
        assert!(!reduced.collection.has_changes());
        assert!(reduced.collection.loading());
    }

    #[test]
    fn optimistic_update_scenario_with_skip_unchanged() {
        let reducer = reducer();
        let collection = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::QueryLoadSuccess { entities: vec![json!({ "id": 1, "name": "A" })] },
        );

        let start_action = EntityAction::new(
            "Hero",
            EntityOp::SaveUpdateOne { update: EntityUpdate::new(1, json!({ "name": "A2" })) },
        )
        .optimistic(true);
        let start = reducer.reduce(&collection, &start_action).unwrap().collection;

        assert!(start.loading());
        assert_eq!(
            start.get(&EntityKey::from(1)),
            Some(&json!({ "id": 1, "name": "A2" }))
        );
        let entry = start.change_for(&EntityKey::from(1)).unwrap();
        assert_eq!(entry.change_type, ChangeType::Updated);
        assert_eq!(entry.original_value, Some(json!({ "id": 1, "name": "A" })));

        let success_action = EntityAction::new(
            "Hero",
            EntityOp::SaveUpdateOneSuccess {
                response: UpdateResponse::new(1, json!({ "name": "A2" }), false),
            },
        )
        .optimistic(true);
        let done = reducer.reduce(&start, &success_action).unwrap().collection;

        assert!(!done.loading());
        assert!(done.change_for(&EntityKey::from(1)).is_none());
        assert_eq!(
            done.get(&EntityKey::from(1)),
            Some(&json!({ "id": 1, "name": "A2" }))
        );
    }

    #[test]
    fn replaying_a_success_is_idempotent() {
        let reducer = reducer();
        let op = EntityOp::QueryAllSuccess {
            entities: vec![json!({ "id": 1, "name": "A" }), json!({ "id": 2, "name": "B" })],
        };
        let once = reduce(&reducer, &reducer.create_collection(), op.clone());
        let twice = reduce(&reducer, &once, op);
        assert_eq!(once, twice);
    }

    #[test]
    fn remove_all_resets_loaded_and_change_state() {
        let reducer = reducer();
        let collection = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::AddAll { entities: vec![json!({ "id": 1 })] },
        );
        assert!(collection.loaded());

        let collection = reduce(
            &reducer,
            &collection,
            EntityOp::AddOne { entity: json!({ "id": 2 }) },
        );
        let cleared = reduce(&reducer, &collection, EntityOp::RemoveAll);

        assert!(cleared.is_empty());
        assert!(!cleared.loaded());
        assert!(!cleared.has_changes());
    }

    #[test]
    fn undo_one_restores_the_pre_update_value() {
        let reducer = reducer();
        let collection = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::QueryLoadSuccess { entities: vec![json!({ "id": 1, "name": "A" })] },
        );
        let collection = reduce(
            &reducer,
            &collection,
            EntityOp::UpdateOne { update: EntityUpdate::new(1, json!({ "name": "edited" })) },
        );
        assert_eq!(
            collection.get(&EntityKey::from(1)),
            Some(&json!({ "id": 1, "name": "edited" }))
        );

        let undone = reduce(&reducer, &collection, EntityOp::UndoOne { key: EntityKey::from(1) });
        assert_eq!(
            undone.get(&EntityKey::from(1)),
            Some(&json!({ "id": 1, "name": "A" }))
        );
        assert!(!undone.has_changes());
    }

    #[test]
    fn set_collection_replaces_wholesale() {
        let reducer = reducer();
        let mut replacement = EntityCollection::new("Hero");
        replacement.loaded = true;
        let next = reduce(
            &reducer,
            &reducer.create_collection(),
            EntityOp::SetCollection { collection: replacement.clone() },
        );
        assert_eq!(*next, replacement);
    }
}
