//! In-memory data services for testing, prototyping, and offline
//! operation: a keyed store per entity type and a recording change-set
//! endpoint, both with injectable latency and failure.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::changeset::ChangeSet;
use crate::entity::{merge_changes, EntityDefinition, EntityKey, EntityUpdate, QueryParams};

use super::data_service::{EntityCacheDataService, EntityDataService};
use super::error::{DataServiceError, RequestContext};

fn matches_params(entity: &Value, params: &QueryParams) -> bool {
    params.iter().all(|(field, expected)| {
        match entity.get(field) {
            Some(Value::String(actual)) => actual.contains(expected),
            Some(other) => other.to_string() == *expected,
            None => false,
        }
    })
}

/// An [`EntityDataService`] over an in-process keyed map.
///
/// Doubles as the offline-capable data service: register one per entity
/// type in the orchestrator's offline registry and writes reconcile
/// against it while disconnected.
pub struct InMemoryDataService {
    definition: Arc<EntityDefinition>,
    entities: Mutex<BTreeMap<EntityKey, Value>>,
    latency: Mutex<Option<Duration>>,
    failure: Mutex<Option<DataServiceError>>,
    calls: AtomicUsize,
}

impl InMemoryDataService {
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        InMemoryDataService {
            definition,
            entities: Mutex::new(BTreeMap::new()),
            latency: Mutex::new(None),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed the store; entities without a resolvable key are dropped.
    pub fn with_entities(self, entities: Vec<Value>) -> Self {
        {
            let mut map = self.entities.lock().unwrap();
            for entity in entities {
                if let Some(key) = self.definition.key_of(&entity) {
                    map.insert(key, entity);
                }
            }
        }
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Every subsequent call fails with this error until cleared.
    pub fn fail_with(&self, error: DataServiceError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// How many service calls have been made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current contents in key order.
    pub fn snapshot(&self) -> Vec<Value> {
        self.entities.lock().unwrap().values().cloned().collect()
    }

    fn url(&self, suffix: Option<&EntityKey>) -> String {
        match suffix {
            Some(key) => format!("mem://{}/{}", self.definition.entity_name(), key),
            None => format!("mem://{}", self.definition.entity_name()),
        }
    }

    async fn begin(&self) -> Result<(), DataServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntityDataService for InMemoryDataService {
    async fn get_all(&self) -> Result<Vec<Value>, DataServiceError> {
        self.begin().await?;
        Ok(self.entities.lock().unwrap().values().cloned().collect())
    }

    async fn get_by_id(&self, key: &EntityKey) -> Result<Value, DataServiceError> {
        self.begin().await?;
        self.entities.lock().unwrap().get(key).cloned().ok_or_else(|| {
            DataServiceError::new(
                format!("{} {} not found", self.definition.entity_name(), key),
                RequestContext::new("GET", self.url(Some(key))),
            )
        })
    }

    async fn get_with_query(&self, params: &QueryParams) -> Result<Vec<Value>, DataServiceError> {
        self.begin().await?;
        Ok(self
            .entities
            .lock()
            .unwrap()
            .values()
            .filter(|entity| matches_params(entity, params))
            .cloned()
            .collect())
    }

    async fn add(&self, entity: &Value) -> Result<Value, DataServiceError> {
        self.begin().await?;
        let key = self.definition.key_of(entity).ok_or_else(|| {
            DataServiceError::new(
                format!("{} entity has no key", self.definition.entity_name()),
                RequestContext::new("POST", self.url(None)),
            )
        })?;
        self.entities.lock().unwrap().insert(key, entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, key: &EntityKey) -> Result<EntityKey, DataServiceError> {
        self.begin().await?;
        // Deleting an absent key still succeeds; the goal state holds.
        self.entities.lock().unwrap().remove(key);
        Ok(key.clone())
    }

    async fn update(&self, update: &EntityUpdate) -> Result<Value, DataServiceError> {
        self.begin().await?;
        let mut entities = self.entities.lock().unwrap();
        let current = entities.get(&update.key).cloned().ok_or_else(|| {
            DataServiceError::new(
                format!("{} {} not found", self.definition.entity_name(), update.key),
                RequestContext::new("PUT", self.url(Some(&update.key))),
            )
        })?;
        let merged = merge_changes(&current, &update.changes);
        let new_key = self
            .definition
            .key_of(&merged)
            .unwrap_or_else(|| update.key.clone());
        if new_key != update.key {
            entities.remove(&update.key);
        }
        entities.insert(new_key, merged.clone());
        Ok(merged)
    }

    async fn upsert(&self, entity: &Value) -> Result<Value, DataServiceError> {
        self.begin().await?;
        let key = self.definition.key_of(entity).ok_or_else(|| {
            DataServiceError::new(
                format!("{} entity has no key", self.definition.entity_name()),
                RequestContext::new("POST", self.url(None)),
            )
        })?;
        let mut entities = self.entities.lock().unwrap();
        let stored = match entities.get(&key) {
            Some(current) => merge_changes(current, entity),
            None => entity.clone(),
        };
        entities.insert(key, stored.clone());
        Ok(stored)
    }
}

/// An [`EntityCacheDataService`] that records submitted change sets and
/// echoes them back, or returns a configured response instead.
#[derive(Default)]
pub struct InMemoryCacheDataService {
    latency: Mutex<Option<Duration>>,
    failure: Mutex<Option<DataServiceError>>,
    response: Mutex<Option<ChangeSet>>,
    saved: Mutex<Vec<ChangeSet>>,
}

impl InMemoryCacheDataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    /// Respond with this change set instead of echoing the submission.
    /// An empty change set models an HTTP 204: no further server-side
    /// changes.
    pub fn respond_with(&self, response: ChangeSet) {
        *self.response.lock().unwrap() = Some(response);
    }

    pub fn fail_with(&self, error: DataServiceError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Change sets received so far, in arrival order.
    pub fn saved(&self) -> Vec<ChangeSet> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityCacheDataService for InMemoryCacheDataService {
    async fn save_entities(&self, changeset: &ChangeSet) -> Result<ChangeSet, DataServiceError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.saved.lock().unwrap().push(changeset.clone());
        let response = self.response.lock().unwrap().clone();
        Ok(response.unwrap_or_else(|| changeset.clone()))
    }
}
