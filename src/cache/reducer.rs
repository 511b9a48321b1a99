use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::action::{EntityAction, EntityOp};
use crate::changes::MergeStrategy;
use crate::changeset::ChangeSetItem;
use crate::collection::{EntityCollection, EntityCollectionReducer};
use crate::entity::{DefinitionError, EntityDefinitionRegistry, KeyError, UpdateResponse};
use crate::persist::DataServiceError;

use super::action::{Action, CacheAction, CacheOp};
use super::cache::EntityCache;

/// Programmer errors surfaced by reduction. These are thrown to the
/// caller of the synchronous reducer, never converted into outcomes:
/// they indicate a misconfigured call site.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReduceError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    UnknownEntity(#[from] DefinitionError),
}

/// Applies commands to the cache by decomposing them into per-collection
/// reductions and folding the results back in, keyed by collection name.
///
/// Alongside the next cache value, `reduce` returns the action as it
/// should travel onward: a delete of a never-saved entity comes back
/// skip-marked, and a failed change-set application comes back with the
/// error attached instead of thrown.
pub struct EntityCacheReducer {
    reducers: HashMap<String, EntityCollectionReducer>,
}

impl EntityCacheReducer {
    pub fn new(registry: &EntityDefinitionRegistry) -> Self {
        let mut reducers = HashMap::new();
        for name in registry.names() {
            if let Ok(definition) = registry.get(name) {
                reducers.insert(name.to_string(), EntityCollectionReducer::new(definition));
            }
        }
        EntityCacheReducer { reducers }
    }

    pub fn reduce(
        &self,
        cache: &EntityCache,
        action: &Action,
    ) -> Result<(EntityCache, Action), ReduceError> {
        match action {
            Action::Entity(action) => {
                let (cache, action) = self.reduce_entity(cache, action)?;
                Ok((cache, Action::Entity(action)))
            }
            Action::Cache(action) => {
                let (cache, action) = self.reduce_cache(cache, action)?;
                Ok((cache, Action::Cache(action)))
            }
        }
    }

    fn reducer_for(&self, entity_name: &str) -> Result<&EntityCollectionReducer, DefinitionError> {
        self.reducers
            .get(entity_name)
            .ok_or_else(|| DefinitionError(entity_name.to_string()))
    }

    fn reduce_entity(
        &self,
        cache: &EntityCache,
        action: &EntityAction,
    ) -> Result<(EntityCache, EntityAction), ReduceError> {
        let reducer = self.reducer_for(&action.entity_name)?;
        let existing = cache.collection(&action.entity_name).cloned();
        let current = existing
            .clone()
            .unwrap_or_else(|| reducer.create_collection());
        let reduced = reducer.reduce(&current, action)?;

        let mut annotated = action.clone();
        annotated.skip = reduced.skip;

        // An untouched snapshot of an existing collection means an
        // untouched cache; a first reference still materializes the
        // empty collection.
        if existing.is_some() && Arc::ptr_eq(&current, &reduced.collection) {
            return Ok((cache.clone(), annotated));
        }
        let mut next = cache.clone();
        next.set_collection(&action.entity_name, reduced.collection);
        Ok((next, annotated))
    }

    fn reduce_cache(
        &self,
        cache: &EntityCache,
        action: &CacheAction,
    ) -> Result<(EntityCache, CacheAction), ReduceError> {
        match &action.op {
            CacheOp::ClearCollections { entity_names } => {
                let names: Vec<String> = if entity_names.is_empty() {
                    cache.names().iter().map(|name| name.to_string()).collect()
                } else {
                    entity_names.clone()
                };
                let mut next = cache.clone();
                for name in &names {
                    let remove = EntityAction::new(name.clone(), EntityOp::RemoveAll);
                    next = self.reduce_entity(&next, &remove)?.0;
                }
                Ok((next, action.clone()))
            }
            CacheOp::LoadCollections { collections } => {
                let mut next = cache.clone();
                for (name, entities) in collections {
                    let load = EntityAction::new(
                        name.clone(),
                        EntityOp::AddAll { entities: entities.clone() },
                    );
                    next = self.reduce_entity(&next, &load)?.0;
                }
                Ok((next, action.clone()))
            }
            CacheOp::MergeQuerySet { query_set } => {
                let strategy = action
                    .merge_strategy
                    .unwrap_or_else(MergeStrategy::query_default);
                let mut next = cache.clone();
                for (name, entities) in query_set {
                    let merge = EntityAction::new(
                        name.clone(),
                        EntityOp::QueryManySuccess { entities: entities.clone() },
                    )
                    .with_merge_strategy(strategy);
                    next = self.reduce_entity(&next, &merge)?.0;
                }
                Ok((next, action.clone()))
            }
            CacheOp::SaveEntities { changeset } => {
                let mut next = cache.clone();
                let mut annotated = action.clone();
                for item in &changeset.changes {
                    let start = self.changeset_action(item, action, false)?;
                    match self.reduce_entity(&next, &start) {
                        Ok((applied, _)) => next = applied,
                        // The failure rides on the command instead of
                        // propagating; the orchestrator inspects it before
                        // any network call. Groups already applied stay.
                        Err(err) => {
                            warn!(
                                entity_name = item.entity_name(),
                                error = %err,
                                "change-set group failed to apply"
                            );
                            annotated.error = Some(DataServiceError::local(err.to_string()));
                            break;
                        }
                    }
                }
                Ok((next, annotated))
            }
            CacheOp::SaveEntitiesSuccess { changeset } => {
                let mut next = cache.clone();
                for item in &changeset.changes {
                    let success = self.changeset_action(item, action, true)?;
                    next = self.reduce_entity(&next, &success)?.0;
                }
                Ok((next, action.clone()))
            }
            CacheOp::SaveEntitiesError { entity_names, .. }
            | CacheOp::SaveEntitiesCancel { entity_names, .. }
            | CacheOp::SaveEntitiesCanceled { entity_names, .. } => {
                Ok((self.clear_loading(cache, entity_names), action.clone()))
            }
            CacheOp::SetEntityCache { cache: replacement } => {
                Ok((replacement.clone(), action.clone()))
            }
        }
    }

    /// The per-collection save action for one change group, carrying the
    /// change-set command's envelope. Optimism resolves against the
    /// group's definition when the command does not say.
    fn changeset_action(
        &self,
        item: &ChangeSetItem,
        action: &CacheAction,
        success: bool,
    ) -> Result<EntityAction, ReduceError> {
        let entity_name = item.entity_name();
        let definition = self.reducer_for(entity_name)?.definition();
        let optimistic = action
            .is_optimistic
            .unwrap_or(definition.save_defaults().optimistic_save_entities);

        let op = match (item, success) {
            (ChangeSetItem::Add { entities, .. }, false) => {
                EntityOp::SaveAddMany { entities: entities.clone() }
            }
            (ChangeSetItem::Add { entities, .. }, true) => {
                EntityOp::SaveAddManySuccess { entities: entities.clone() }
            }
            (ChangeSetItem::Delete { keys, .. }, false) => {
                EntityOp::SaveDeleteMany { keys: keys.clone() }
            }
            (ChangeSetItem::Delete { keys, .. }, true) => {
                EntityOp::SaveDeleteManySuccess { keys: keys.clone() }
            }
            (ChangeSetItem::Update { updates, .. }, false) => {
                EntityOp::SaveUpdateMany { updates: updates.clone() }
            }
            (ChangeSetItem::Update { updates, .. }, true) => EntityOp::SaveUpdateManySuccess {
                responses: updates
                    .iter()
                    .map(|update| {
                        UpdateResponse::new(update.key.clone(), update.changes.clone(), true)
                    })
                    .collect(),
            },
            (ChangeSetItem::Upsert { entities, .. }, false) => {
                EntityOp::SaveUpsertMany { entities: entities.clone() }
            }
            (ChangeSetItem::Upsert { entities, .. }, true) => {
                EntityOp::SaveUpsertManySuccess { entities: entities.clone() }
            }
        };

        let mut entity_action = EntityAction::new(entity_name, op).optimistic(optimistic);
        entity_action.correlation_id = action.correlation_id.clone();
        entity_action.merge_strategy = action.merge_strategy;
        entity_action.tag = action.tag.clone();
        entity_action.offline = action.offline;
        Ok(entity_action)
    }

    fn clear_loading(&self, cache: &EntityCache, entity_names: &[String]) -> EntityCache {
        let mut next = cache.clone();
        for name in entity_names {
            if let Some(collection) = cache.collection(name) {
                if collection.loading() {
                    next.set_collection(
                        name.clone(),
                        Arc::new(EntityCollection {
                            loading: false,
                            ..(**collection).clone()
                        }),
                    );
                }
            }
        }
        next
    }
}
