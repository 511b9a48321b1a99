use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::action::{CorrelationId, EntityAction, EntityOp};
use crate::cache::{CacheAction, CacheOp};
use crate::entity::{merge_changes, UpdateResponse};

use super::data_service::{ConnectivitySignal, DataServiceRegistry, EntityDataService};
use super::error::DataServiceError;

/// Converts a command into exactly one terminal outcome per correlation
/// id: success, error, or cancel.
///
/// Each command races its data-service call against a cancellation signal
/// targeted by correlation id; whichever resolves first is the outcome and
/// the loser's continuation is dropped, not merely ignored. Commands are
/// independent: many may be in flight and their outcomes may arrive in any
/// order. Nothing is retried; a retry is the caller reissuing the command
/// with a fresh correlation id.
pub struct PersistenceOrchestrator {
    services: DataServiceRegistry,
    offline_services: Option<DataServiceRegistry>,
    connectivity: Arc<dyn ConnectivitySignal>,
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<Option<String>>>>,
}

impl PersistenceOrchestrator {
    pub fn new(services: DataServiceRegistry, connectivity: Arc<dyn ConnectivitySignal>) -> Self {
        PersistenceOrchestrator {
            services,
            offline_services: None,
            connectivity,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register the data services used while disconnected. Without them,
    /// commands issued offline produce error outcomes.
    pub fn with_offline_services(mut self, services: DataServiceRegistry) -> Self {
        self.offline_services = Some(services);
        self
    }

    /// Request cancellation of the in-flight command with this correlation
    /// id. Advisory and race-based: returns true when a pending command was
    /// signalled, false when nothing was in flight. A command whose data
    /// call already resolved cannot be retroactively cancelled.
    pub fn cancel(&self, correlation_id: &CorrelationId, reason: Option<String>) -> bool {
        let sender = {
            let Ok(mut pending) = self.pending.lock() else {
                return false;
            };
            pending.remove(correlation_id)
        };
        match sender {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }

    /// Execute a single-collection command to its terminal outcome.
    pub async fn execute(&self, command: EntityAction) -> EntityAction {
        let mut command = command;
        command.offline = !self.connectivity.is_online();
        debug!(command = %command.type_name(), offline = command.offline, "executing");

        // An error attached upstream short-circuits before any network
        // work; so does a skip marking (nothing to execute server-side).
        if let Some(error) = command.error.take() {
            return self.entity_error(&command, error);
        }
        if command.skip {
            return self.skip_success(&command);
        }

        let Some(registry) = self.registry(command.offline) else {
            return self.entity_error(
                &command,
                DataServiceError::local("offline and no offline data services registered"),
            );
        };
        let service = match registry.service_for(&command.entity_name) {
            Ok(service) => service,
            Err(error) => return self.entity_error(&command, error),
        };

        let data = self.call_entity_service(service, &command);
        tokio::pin!(data);

        match command.correlation_id.clone() {
            Some(correlation_id) => {
                let mut cancel = self.register(correlation_id.clone());
                let outcome = tokio::select! {
                    reason = &mut cancel => match reason {
                        Ok(reason) => {
                            debug!(command = %command.type_name(), "canceled in flight");
                            command.to_outcome(EntityOp::CanceledPersist { reason })
                        }
                        // The cancellation channel vanished from under us;
                        // only the data branch can terminate the command.
                        Err(_) => (&mut data).await,
                    },
                    outcome = &mut data => outcome,
                };
                self.unregister(&correlation_id);
                outcome
            }
            None => data.await,
        }
    }

    /// Execute an atomic change-set command to its terminal outcome.
    pub async fn execute_changeset(&self, command: CacheAction) -> CacheAction {
        let mut command = command;
        command.offline = !self.connectivity.is_online();
        debug!(command = %command.type_name(), offline = command.offline, "executing");

        let CacheOp::SaveEntities { changeset } = &command.op else {
            let error = DataServiceError::local("not a save-entities command");
            return command.to_outcome(CacheOp::SaveEntitiesError {
                error,
                entity_names: vec![],
            });
        };
        let entity_names: Vec<String> = changeset
            .entity_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        if let Some(error) = command.error.take() {
            warn!(command = %command.type_name(), error = %error, "error outcome");
            return command.to_outcome(CacheOp::SaveEntitiesError { error, entity_names });
        }

        let changeset = changeset.clone().exclude_empty_items();
        if changeset.is_empty() {
            return command.to_outcome(CacheOp::SaveEntitiesSuccess { changeset });
        }

        let Some(registry) = self.registry(command.offline) else {
            let error =
                DataServiceError::local("offline and no offline data services registered");
            warn!(command = %command.type_name(), error = %error, "error outcome");
            return command.to_outcome(CacheOp::SaveEntitiesError { error, entity_names });
        };
        let service = match registry.cache_service() {
            Ok(service) => service,
            Err(error) => {
                warn!(command = %command.type_name(), error = %error, "error outcome");
                return command.to_outcome(CacheOp::SaveEntitiesError { error, entity_names });
            }
        };

        let data = async {
            match service.save_entities(&changeset).await {
                Ok(response) => {
                    command.to_outcome(CacheOp::SaveEntitiesSuccess { changeset: response })
                }
                Err(error) => {
                    warn!(command = %command.type_name(), error = %error, "error outcome");
                    command.to_outcome(CacheOp::SaveEntitiesError {
                        error,
                        entity_names: entity_names.clone(),
                    })
                }
            }
        };
        tokio::pin!(data);

        match command.correlation_id.clone() {
            Some(correlation_id) => {
                let mut cancel = self.register(correlation_id.clone());
                let outcome = tokio::select! {
                    reason = &mut cancel => match reason {
                        Ok(reason) => {
                            debug!(command = %command.type_name(), "canceled in flight");
                            command.to_outcome(CacheOp::SaveEntitiesCanceled {
                                entity_names: entity_names.clone(),
                                reason,
                            })
                        }
                        Err(_) => (&mut data).await,
                    },
                    outcome = &mut data => outcome,
                };
                self.unregister(&correlation_id);
                outcome
            }
            None => data.await,
        }
    }

    /// Pick the registry for the connectivity sampled at command start;
    /// the signal is never re-consulted mid-flight.
    fn registry(&self, offline: bool) -> Option<&DataServiceRegistry> {
        if offline {
            self.offline_services.as_ref()
        } else {
            Some(&self.services)
        }
    }

    fn register(&self, correlation_id: CorrelationId) -> oneshot::Receiver<Option<String>> {
        let (sender, receiver) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(correlation_id, sender);
        }
        receiver
    }

    fn unregister(&self, correlation_id: &CorrelationId) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(correlation_id);
        }
    }

    async fn call_entity_service(
        &self,
        service: Arc<dyn EntityDataService>,
        command: &EntityAction,
    ) -> EntityAction {
        use EntityOp::*;
        match &command.op {
            QueryAll => match service.get_all().await {
                Ok(entities) => command.to_outcome(QueryAllSuccess { entities }),
                Err(error) => self.entity_error(command, error),
            },
            QueryLoad => match service.get_all().await {
                Ok(entities) => command.to_outcome(QueryLoadSuccess { entities }),
                Err(error) => self.entity_error(command, error),
            },
            QueryMany { params } => match service.get_with_query(params).await {
                Ok(entities) => command.to_outcome(QueryManySuccess { entities }),
                Err(error) => self.entity_error(command, error),
            },
            QueryByKey { key } => match service.get_by_id(key).await {
                Ok(entity) => command.to_outcome(QueryByKeySuccess { entity }),
                Err(error) => self.entity_error(command, error),
            },
            SaveAddOne { entity } => match service.add(entity).await {
                Ok(entity) => command.to_outcome(SaveAddOneSuccess { entity }),
                Err(error) => self.entity_error(command, error),
            },
            SaveDeleteOne { key } => match service.delete(key).await {
                Ok(key) => command.to_outcome(SaveDeleteOneSuccess { key }),
                Err(error) => self.entity_error(command, error),
            },
            SaveUpdateOne { update } => match service.update(update).await {
                Ok(returned) => {
                    // `changed` reports whether the server sent anything
                    // beyond the submitted changes; it feeds the
                    // skip-unchanged reconciliation on the way back in.
                    let changed = match &returned {
                        Value::Null => false,
                        Value::Object(fields) => !fields.is_empty(),
                        _ => true,
                    };
                    let changes = if changed {
                        merge_changes(&update.changes, &returned)
                    } else {
                        update.changes.clone()
                    };
                    command.to_outcome(SaveUpdateOneSuccess {
                        response: UpdateResponse::new(update.key.clone(), changes, changed),
                    })
                }
                Err(error) => self.entity_error(command, error),
            },
            SaveUpsertOne { entity } => match service.upsert(entity).await {
                Ok(entity) => command.to_outcome(SaveUpsertOneSuccess { entity }),
                Err(error) => self.entity_error(command, error),
            },
            op => self.entity_error(
                command,
                DataServiceError::local(format!(
                    "operation {} is not persistable",
                    op.base_name()
                )),
            ),
        }
    }

    /// Synthesize success without touching the network: the caller (or
    /// the reducer) already established there is nothing to execute
    /// server-side.
    fn skip_success(&self, command: &EntityAction) -> EntityAction {
        use EntityOp::*;
        match &command.op {
            SaveDeleteOne { key } => command.to_outcome(SaveDeleteOneSuccess { key: key.clone() }),
            SaveDeleteMany { keys } => {
                command.to_outcome(SaveDeleteManySuccess { keys: keys.clone() })
            }
            SaveAddOne { entity } => {
                command.to_outcome(SaveAddOneSuccess { entity: entity.clone() })
            }
            SaveUpdateOne { update } => command.to_outcome(SaveUpdateOneSuccess {
                response: UpdateResponse::new(update.key.clone(), update.changes.clone(), false),
            }),
            SaveUpsertOne { entity } => {
                command.to_outcome(SaveUpsertOneSuccess { entity: entity.clone() })
            }
            op => self.entity_error(
                command,
                DataServiceError::local(format!(
                    "skip set on {}, which has no skippable execution",
                    op.base_name()
                )),
            ),
        }
    }

    /// Funnel every failure into the structured error outcome for the
    /// command's operation family.
    fn entity_error(&self, command: &EntityAction, error: DataServiceError) -> EntityAction {
        use EntityOp::*;
        warn!(command = %command.type_name(), error = %error, "error outcome");
        let op = match &command.op {
            QueryAll => QueryAllError { error },
            QueryLoad => QueryLoadError { error },
            QueryMany { .. } => QueryManyError { error },
            QueryByKey { .. } => QueryByKeyError { error },
            SaveAddOne { .. } => SaveAddOneError { error },
            SaveAddMany { .. } => SaveAddManyError { error },
            SaveDeleteOne { .. } => SaveDeleteOneError { error },
            SaveDeleteMany { .. } => SaveDeleteManyError { error },
            SaveUpdateOne { .. } => SaveUpdateOneError { error },
            SaveUpdateMany { .. } => SaveUpdateManyError { error },
            SaveUpsertOne { .. } => SaveUpsertOneError { error },
            SaveUpsertMany { .. } => SaveUpsertManyError { error },
            // No error family for this op; the envelope carries it.
            other => {
                let mut outcome = command.to_outcome(other.clone());
                outcome.error = Some(error);
                return outcome;
            }
        };
        command.to_outcome(op)
    }
}

impl std::fmt::Debug for PersistenceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceOrchestrator")
            .field("services", &self.services)
            .field("offline_services", &self.offline_services)
            .finish()
    }
}
