use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::changeset::ChangeSet;
use crate::entity::{EntityKey, EntityUpdate, QueryParams};

use super::error::DataServiceError;

/// Data access for one entity type.
///
/// Implementations must return failures as [`DataServiceError`]s carrying
/// the originating request's method and url when they have one.
#[async_trait]
pub trait EntityDataService: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Value>, DataServiceError>;

    async fn get_by_id(&self, key: &EntityKey) -> Result<Value, DataServiceError>;

    async fn get_with_query(&self, params: &QueryParams) -> Result<Vec<Value>, DataServiceError>;

    async fn add(&self, entity: &Value) -> Result<Value, DataServiceError>;

    /// Returns the deleted key.
    async fn delete(&self, key: &EntityKey) -> Result<EntityKey, DataServiceError>;

    /// Returns the updated entity; `Value::Null` means the server had
    /// nothing further to say (e.g. HTTP 204).
    async fn update(&self, update: &EntityUpdate) -> Result<Value, DataServiceError>;

    async fn upsert(&self, entity: &Value) -> Result<Value, DataServiceError>;
}

/// The change-set transport: one batch endpoint that accepts a full
/// change set and returns a same-shaped one reflecting server-side
/// changes. An empty response means "no further changes", not an error.
#[async_trait]
pub trait EntityCacheDataService: Send + Sync {
    async fn save_entities(&self, changeset: &ChangeSet) -> Result<ChangeSet, DataServiceError>;
}

/// Connectivity probe, sampled once at the moment a command begins
/// executing and never re-sampled mid-flight.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;
}

/// The trivial probe for always-connected deployments.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivitySignal for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Explicit map from entity-type name to its data service, plus the
/// optional change-set transport. Injected into the orchestrator at
/// construction.
#[derive(Clone, Default)]
pub struct DataServiceRegistry {
    services: HashMap<String, Arc<dyn EntityDataService>>,
    cache_service: Option<Arc<dyn EntityCacheDataService>>,
}

impl DataServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        entity_name: impl Into<String>,
        service: Arc<dyn EntityDataService>,
    ) -> &mut Self {
        self.services.insert(entity_name.into(), service);
        self
    }

    pub fn register_cache_service(
        &mut self,
        service: Arc<dyn EntityCacheDataService>,
    ) -> &mut Self {
        self.cache_service = Some(service);
        self
    }

    pub fn service_for(
        &self,
        entity_name: &str,
    ) -> Result<Arc<dyn EntityDataService>, DataServiceError> {
        self.services.get(entity_name).cloned().ok_or_else(|| {
            DataServiceError::local(format!("no data service registered for {}", entity_name))
        })
    }

    pub fn cache_service(&self) -> Result<Arc<dyn EntityCacheDataService>, DataServiceError> {
        self.cache_service
            .clone()
            .ok_or_else(|| DataServiceError::local("no change-set data service registered"))
    }
}

impl fmt::Debug for DataServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataServiceRegistry")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("cache_service", &self.cache_service.is_some())
            .finish()
    }
}
