use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::action::{CorrelationId, CorrelationIdGenerator, EntityOp, UuidCorrelationIds};
use crate::cache::{Action, CacheOp, EntityCache, EntityCacheReducer, ReduceError};
use crate::entity::EntityDefinitionRegistry;
use crate::persist::PersistenceOrchestrator;

/// Holds the cache and applies transitions to it one at a time.
///
/// Command initiation and outcome arrival are fully concurrent; only the
/// application of a transition is serialized, under one lock held for the
/// duration of a synchronous reduction. Observers receive each published
/// snapshot on a watch channel; a reduction that changes nothing publishes
/// nothing.
pub struct CacheStore {
    reducer: EntityCacheReducer,
    orchestrator: Option<Arc<PersistenceOrchestrator>>,
    correlation_ids: Box<dyn CorrelationIdGenerator>,
    state: Mutex<EntityCache>,
    watch_tx: watch::Sender<EntityCache>,
}

impl CacheStore {
    /// A store wired to a persistence orchestrator: `execute` runs
    /// commands against data services and folds the outcomes back in.
    pub fn new(
        definitions: &EntityDefinitionRegistry,
        orchestrator: Arc<PersistenceOrchestrator>,
    ) -> Self {
        let (watch_tx, _) = watch::channel(EntityCache::new());
        CacheStore {
            reducer: EntityCacheReducer::new(definitions),
            orchestrator: Some(orchestrator),
            correlation_ids: Box::new(UuidCorrelationIds),
            state: Mutex::new(EntityCache::new()),
            watch_tx,
        }
    }

    /// A store without persistence: `dispatch` works, `execute` applies
    /// the local transition and stops there.
    pub fn cache_only(definitions: &EntityDefinitionRegistry) -> Self {
        let (watch_tx, _) = watch::channel(EntityCache::new());
        CacheStore {
            reducer: EntityCacheReducer::new(definitions),
            orchestrator: None,
            correlation_ids: Box::new(UuidCorrelationIds),
            state: Mutex::new(EntityCache::new()),
            watch_tx,
        }
    }

    /// Mint correlation ids with something other than random uuids.
    pub fn with_correlation_ids(
        mut self,
        generator: impl CorrelationIdGenerator + 'static,
    ) -> Self {
        self.correlation_ids = Box::new(generator);
        self
    }

    /// Start from a rehydrated cache instead of an empty one.
    pub fn with_initial_cache(self, cache: EntityCache) -> Self {
        if let Ok(mut state) = self.state.lock() {
            *state = cache.clone();
        }
        self.watch_tx.send_replace(cache);
        self
    }

    /// The current cache value.
    pub fn snapshot(&self) -> EntityCache {
        self.state.lock().map(|state| state.clone()).unwrap_or_default()
    }

    /// A receiver of published snapshots. The current value is visible
    /// immediately; each subsequent publication marks it changed.
    pub fn watch(&self) -> watch::Receiver<EntityCache> {
        self.watch_tx.subscribe()
    }

    /// Apply one action to the cache and publish the new snapshot if it
    /// differs. Returns the action as annotated by reduction (skip
    /// marking, attached change-set error). Programmer errors propagate;
    /// they are never converted into outcomes.
    pub fn dispatch(&self, action: &Action) -> Result<Action, ReduceError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (next, annotated) = self.reducer.reduce(&state, action)?;
        debug!(action = %action.type_name(), changed = !next.same_as(&state), "dispatched");
        if !next.same_as(&state) {
            *state = next.clone();
            self.watch_tx.send_replace(next);
        }
        Ok(annotated)
    }

    /// Run one command through its whole lifecycle: apply the start
    /// transition, execute against the data services, apply the terminal
    /// outcome, and return it.
    ///
    /// Non-persistable actions stop after the local transition, as does
    /// everything on a cache-only store.
    pub async fn execute(&self, action: Action) -> Result<Action, ReduceError> {
        // Commands that can reach a data service get a correlation id up
        // front so their outcome is attributable and cancellable.
        let mut action = action;
        match &mut action {
            Action::Entity(command)
                if command.op.is_persistable() && command.correlation_id.is_none() =>
            {
                command.correlation_id = Some(self.correlation_ids.next_id());
            }
            Action::Cache(command)
                if matches!(command.op, CacheOp::SaveEntities { .. })
                    && command.correlation_id.is_none() =>
            {
                command.correlation_id = Some(self.correlation_ids.next_id());
            }
            _ => {}
        }
        let annotated = self.dispatch(&action)?;
        match annotated {
            Action::Entity(command) => {
                if let EntityOp::CancelPersist { reason } = &command.op {
                    if let (Some(orchestrator), Some(correlation_id)) =
                        (&self.orchestrator, &command.correlation_id)
                    {
                        orchestrator.cancel(correlation_id, reason.clone());
                    }
                    return Ok(Action::Entity(command));
                }
                if !command.op.is_persistable() {
                    return Ok(Action::Entity(command));
                }
                let Some(orchestrator) = &self.orchestrator else {
                    return Ok(Action::Entity(command));
                };
                let outcome = orchestrator.execute(command).await;
                self.dispatch(&Action::Entity(outcome.clone()))?;
                Ok(Action::Entity(outcome))
            }
            Action::Cache(command) => {
                if let CacheOp::SaveEntitiesCancel { reason, .. } = &command.op {
                    if let (Some(orchestrator), Some(correlation_id)) =
                        (&self.orchestrator, &command.correlation_id)
                    {
                        orchestrator.cancel(correlation_id, reason.clone());
                    }
                    return Ok(Action::Cache(command));
                }
                if !matches!(command.op, CacheOp::SaveEntities { .. }) {
                    return Ok(Action::Cache(command));
                }
                let Some(orchestrator) = &self.orchestrator else {
                    return Ok(Action::Cache(command));
                };
                let outcome = orchestrator.execute_changeset(command).await;
                self.dispatch(&Action::Cache(outcome.clone()))?;
                Ok(Action::Cache(outcome))
            }
        }
    }

    /// Request cancellation of an in-flight command. Advisory: returns
    /// true when something was still in flight to signal.
    pub fn cancel(&self, correlation_id: &CorrelationId, reason: Option<String>) -> bool {
        match &self.orchestrator {
            Some(orchestrator) => orchestrator.cancel(correlation_id, reason),
            None => false,
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("persistent", &self.orchestrator.is_some())
            .finish()
    }
}
