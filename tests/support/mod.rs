#![allow(dead_code)]

//! Shared fixtures: a heroes/villains domain, a settable connectivity
//! probe, and a data service that answers updates with "no content".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use entity_cache::{
    DataServiceError, DataServiceRegistry, EntityDataService, EntityDefinition,
    EntityDefinitionRegistry, EntityKey, EntityUpdate, InMemoryDataService, QueryParams,
};

pub fn hero(id: i64, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

pub fn definitions() -> EntityDefinitionRegistry {
    let mut registry = EntityDefinitionRegistry::new();
    registry.register(EntityDefinition::new("Hero"));
    registry.register(EntityDefinition::new("Villain"));
    registry
}

pub fn hero_definition() -> Arc<EntityDefinition> {
    definitions().get("Hero").unwrap()
}

pub fn hero_services(seed: Vec<Value>) -> (DataServiceRegistry, Arc<InMemoryDataService>) {
    let service = Arc::new(InMemoryDataService::new(hero_definition()).with_entities(seed));
    let mut registry = DataServiceRegistry::new();
    registry.register("Hero", service.clone());
    (registry, service)
}

/// Connectivity probe flipped by tests.
pub struct Toggle {
    online: AtomicBool,
}

impl Toggle {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Toggle {
            online: AtomicBool::new(online),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl entity_cache::ConnectivitySignal for Toggle {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Answers every update with no content, the way a server responding
/// HTTP 204 does; everything else echoes.
pub struct NoContentUpdateService;

#[async_trait]
impl EntityDataService for NoContentUpdateService {
    async fn get_all(&self) -> Result<Vec<Value>, DataServiceError> {
        Ok(vec![])
    }

    async fn get_by_id(&self, key: &EntityKey) -> Result<Value, DataServiceError> {
        Err(DataServiceError::local(format!("{} not found", key)))
    }

    async fn get_with_query(&self, _params: &QueryParams) -> Result<Vec<Value>, DataServiceError> {
        Ok(vec![])
    }

    async fn add(&self, entity: &Value) -> Result<Value, DataServiceError> {
        Ok(entity.clone())
    }

    async fn delete(&self, key: &EntityKey) -> Result<EntityKey, DataServiceError> {
        Ok(key.clone())
    }

    async fn update(&self, _update: &EntityUpdate) -> Result<Value, DataServiceError> {
        Ok(Value::Null)
    }

    async fn upsert(&self, entity: &Value) -> Result<Value, DataServiceError> {
        Ok(entity.clone())
    }
}
