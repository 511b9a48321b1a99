use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::changes::ChangeState;
use crate::collection::EntityCollection;
use crate::entity::{EntityKey, EntityUpdate, QueryParams, UpdateResponse};
use crate::persist::DataServiceError;

/// Which leg of an operation's lifecycle an op denotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpPhase {
    Start,
    Success,
    Error,
}

/// Every operation a collection understands, with its payload.
///
/// An exhaustive sum type rather than a string-keyed handler table: adding
/// an operation without handling it in the reducer is a compile error.
/// Arbitrary app-defined actions stay permissively ignorable one level up:
/// the store passes anything that is not an entity or cache action through
/// untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntityOp {
    // ------------------------------------------------------------------
    // Query lifecycle
    // ------------------------------------------------------------------
    QueryAll,
    QueryAllSuccess { entities: Vec<Value> },
    QueryAllError { error: DataServiceError },
    /// Authoritative full fetch: success replaces the entire collection.
    QueryLoad,
    QueryLoadSuccess { entities: Vec<Value> },
    QueryLoadError { error: DataServiceError },
    QueryMany { params: QueryParams },
    QueryManySuccess { entities: Vec<Value> },
    QueryManyError { error: DataServiceError },
    QueryByKey { key: EntityKey },
    QueryByKeySuccess { entity: Value },
    QueryByKeyError { error: DataServiceError },

    // ------------------------------------------------------------------
    // Save lifecycle
    // ------------------------------------------------------------------
    SaveAddOne { entity: Value },
    SaveAddOneSuccess { entity: Value },
    SaveAddOneError { error: DataServiceError },
    SaveAddMany { entities: Vec<Value> },
    SaveAddManySuccess { entities: Vec<Value> },
    SaveAddManyError { error: DataServiceError },
    SaveDeleteOne { key: EntityKey },
    SaveDeleteOneSuccess { key: EntityKey },
    SaveDeleteOneError { error: DataServiceError },
    SaveDeleteMany { keys: Vec<EntityKey> },
    SaveDeleteManySuccess { keys: Vec<EntityKey> },
    SaveDeleteManyError { error: DataServiceError },
    SaveUpdateOne { update: EntityUpdate },
    SaveUpdateOneSuccess { response: UpdateResponse },
    SaveUpdateOneError { error: DataServiceError },
    SaveUpdateMany { updates: Vec<EntityUpdate> },
    SaveUpdateManySuccess { responses: Vec<UpdateResponse> },
    SaveUpdateManyError { error: DataServiceError },
    SaveUpsertOne { entity: Value },
    SaveUpsertOneSuccess { entity: Value },
    SaveUpsertOneError { error: DataServiceError },
    SaveUpsertMany { entities: Vec<Value> },
    SaveUpsertManySuccess { entities: Vec<Value> },
    SaveUpsertManyError { error: DataServiceError },

    // ------------------------------------------------------------------
    // Cache-only
    // ------------------------------------------------------------------
    /// Full replace: entities become the whole collection, `loaded` is set,
    /// all change state is cleared.
    AddAll { entities: Vec<Value> },
    AddMany { entities: Vec<Value> },
    AddOne { entity: Value },
    RemoveAll,
    RemoveMany { keys: Vec<EntityKey> },
    RemoveOne { key: EntityKey },
    UpdateMany { updates: Vec<EntityUpdate> },
    UpdateOne { update: EntityUpdate },
    UpsertMany { entities: Vec<Value> },
    UpsertOne { entity: Value },
    CommitAll,
    CommitMany { keys: Vec<EntityKey> },
    CommitOne { key: EntityKey },
    UndoAll,
    UndoMany { keys: Vec<EntityKey> },
    UndoOne { key: EntityKey },
    SetFilter { pattern: Option<String> },
    SetLoaded { loaded: bool },
    SetLoading { loading: bool },
    /// Escape hatch for rehydration from persisted storage.
    SetChangeState {
        #[serde(with = "crate::entity::keyed_map")]
        change_state: ChangeState,
    },
    /// Escape hatch for rehydration from persisted storage.
    SetCollection { collection: EntityCollection },

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------
    CancelPersist { reason: Option<String> },
    CanceledPersist { reason: Option<String> },
}

impl EntityOp {
    /// The operation's base name; success/error/offline segments are
    /// appended by the action's discriminator formatting.
    pub fn base_name(&self) -> &'static str {
        use EntityOp::*;
        match self {
            QueryAll | QueryAllSuccess { .. } | QueryAllError { .. } => "query/all",
            QueryLoad | QueryLoadSuccess { .. } | QueryLoadError { .. } => "query/load",
            QueryMany { .. } | QueryManySuccess { .. } | QueryManyError { .. } => "query/many",
            QueryByKey { .. } | QueryByKeySuccess { .. } | QueryByKeyError { .. } => {
                "query/by-key"
            }
            SaveAddOne { .. } | SaveAddOneSuccess { .. } | SaveAddOneError { .. } => {
                "save/add-one"
            }
            SaveAddMany { .. } | SaveAddManySuccess { .. } | SaveAddManyError { .. } => {
                "save/add-many"
            }
            SaveDeleteOne { .. } | SaveDeleteOneSuccess { .. } | SaveDeleteOneError { .. } => {
                "save/delete-one"
            }
            SaveDeleteMany { .. } | SaveDeleteManySuccess { .. } | SaveDeleteManyError { .. } => {
                "save/delete-many"
            }
            SaveUpdateOne { .. } | SaveUpdateOneSuccess { .. } | SaveUpdateOneError { .. } => {
                "save/update-one"
            }
            SaveUpdateMany { .. } | SaveUpdateManySuccess { .. } | SaveUpdateManyError { .. } => {
                "save/update-many"
            }
            SaveUpsertOne { .. } | SaveUpsertOneSuccess { .. } | SaveUpsertOneError { .. } => {
                "save/upsert-one"
            }
            SaveUpsertMany { .. } | SaveUpsertManySuccess { .. } | SaveUpsertManyError { .. } => {
                "save/upsert-many"
            }
            AddAll { .. } => "add-all",
            AddMany { .. } => "add-many",
            AddOne { .. } => "add-one",
            RemoveAll => "remove-all",
            RemoveMany { .. } => "remove-many",
            RemoveOne { .. } => "remove-one",
            UpdateMany { .. } => "update-many",
            UpdateOne { .. } => "update-one",
            UpsertMany { .. } => "upsert-many",
            UpsertOne { .. } => "upsert-one",
            CommitAll => "commit-all",
            CommitMany { .. } => "commit-many",
            CommitOne { .. } => "commit-one",
            UndoAll => "undo-all",
            UndoMany { .. } => "undo-many",
            UndoOne { .. } => "undo-one",
            SetFilter { .. } => "set-filter",
            SetLoaded { .. } => "set-loaded",
            SetLoading { .. } => "set-loading",
            SetChangeState { .. } => "set-change-state",
            SetCollection { .. } => "set-collection",
            CancelPersist { .. } => "cancel-persist",
            CanceledPersist { .. } => "canceled-persist",
        }
    }

    pub fn phase(&self) -> OpPhase {
        use EntityOp::*;
        match self {
            QueryAllSuccess { .. }
            | QueryLoadSuccess { .. }
            | QueryManySuccess { .. }
            | QueryByKeySuccess { .. }
            | SaveAddOneSuccess { .. }
            | SaveAddManySuccess { .. }
            | SaveDeleteOneSuccess { .. }
            | SaveDeleteManySuccess { .. }
            | SaveUpdateOneSuccess { .. }
            | SaveUpdateManySuccess { .. }
            | SaveUpsertOneSuccess { .. }
            | SaveUpsertManySuccess { .. } => OpPhase::Success,
            QueryAllError { .. }
            | QueryLoadError { .. }
            | QueryManyError { .. }
            | QueryByKeyError { .. }
            | SaveAddOneError { .. }
            | SaveAddManyError { .. }
            | SaveDeleteOneError { .. }
            | SaveDeleteManyError { .. }
            | SaveUpdateOneError { .. }
            | SaveUpdateManyError { .. }
            | SaveUpsertOneError { .. }
            | SaveUpsertManyError { .. } => OpPhase::Error,
            _ => OpPhase::Start,
        }
    }

    /// Whether this op begins a command the persistence orchestrator can
    /// execute over a data service. Multi-entity saves travel as change
    /// sets through the cache-level save, not here.
    pub fn is_persistable(&self) -> bool {
        matches!(
            self,
            EntityOp::QueryAll
                | EntityOp::QueryLoad
                | EntityOp::QueryMany { .. }
                | EntityOp::QueryByKey { .. }
                | EntityOp::SaveAddOne { .. }
                | EntityOp::SaveDeleteOne { .. }
                | EntityOp::SaveUpdateOne { .. }
                | EntityOp::SaveUpsertOne { .. }
        )
    }
}
