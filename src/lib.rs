mod action;
mod cache;
mod changes;
mod changeset;
mod collection;
mod entity;
mod persist;
mod store;

pub use action::{
    CorrelationId, CorrelationIdGenerator, EntityAction, EntityOp, OpPhase, UuidCorrelationIds,
};
pub use cache::{Action, CacheAction, CacheOp, EntityCache, EntityCacheReducer, ReduceError};
pub use changes::{ChangeEntry, ChangeState, ChangeTracker, ChangeType, MergeStrategy};
pub use changeset::{ChangeSet, ChangeSetBuilder, ChangeSetItem};
pub use collection::{
    CollectionAdapter, EntityCollection, EntityCollectionReducer, ReducedCollection,
};
pub use entity::{
    merge_changes, DefinitionError, EntityDefinition, EntityDefinitionRegistry, EntityKey,
    EntityUpdate, KeyError, KeySelector, QueryParams, SaveDefaults, UpdateResponse,
};
pub use persist::{
    AlwaysOnline, ConnectivitySignal, DataServiceError, DataServiceRegistry,
    EntityCacheDataService, EntityDataService, InMemoryCacheDataService, InMemoryDataService,
    PersistenceOrchestrator, RequestContext,
};
pub use store::CacheStore;
