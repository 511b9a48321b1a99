//! Persistence: the data-service capability traits, the structured error
//! taxonomy, in-memory service doubles, and the orchestrator that turns
//! each command into exactly one terminal outcome.

mod data_service;
mod error;
mod in_memory;
mod orchestrator;

pub use data_service::{
    AlwaysOnline, ConnectivitySignal, DataServiceRegistry, EntityCacheDataService,
    EntityDataService,
};
pub use error::{DataServiceError, RequestContext};
pub use in_memory::{InMemoryCacheDataService, InMemoryDataService};
pub use orchestrator::PersistenceOrchestrator;
