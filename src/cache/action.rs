use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{CorrelationId, EntityAction, OpPhase};
use crate::changes::MergeStrategy;
use crate::changeset::ChangeSet;
use crate::persist::DataServiceError;

use super::cache::EntityCache;

/// Operations that span the whole cache or several collections at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CacheOp {
    /// Empty the named collections; an empty list means all of them.
    ClearCollections { entity_names: Vec<String> },
    /// Full-replace each named collection with the given entities.
    LoadCollections {
        collections: BTreeMap<String, Vec<Value>>,
    },
    /// Merge a multi-collection query result (PreserveChanges default).
    MergeQuerySet {
        query_set: BTreeMap<String, Vec<Value>>,
    },
    /// Apply and persist one atomic change set.
    SaveEntities { changeset: ChangeSet },
    SaveEntitiesSuccess { changeset: ChangeSet },
    SaveEntitiesError {
        error: DataServiceError,
        entity_names: Vec<String>,
    },
    SaveEntitiesCancel {
        entity_names: Vec<String>,
        reason: Option<String>,
    },
    SaveEntitiesCanceled {
        entity_names: Vec<String>,
        reason: Option<String>,
    },
    /// Whole-cache replacement for rehydration from persisted storage.
    /// Applied without per-collection validation.
    SetEntityCache { cache: EntityCache },
}

impl CacheOp {
    pub fn base_name(&self) -> &'static str {
        match self {
            CacheOp::ClearCollections { .. } => "entity-cache/clear-collections",
            CacheOp::LoadCollections { .. } => "entity-cache/load-collections",
            CacheOp::MergeQuerySet { .. } => "entity-cache/merge-query-set",
            CacheOp::SaveEntities { .. }
            | CacheOp::SaveEntitiesSuccess { .. }
            | CacheOp::SaveEntitiesError { .. } => "save/entities",
            CacheOp::SaveEntitiesCancel { .. } => "save/entities/cancel",
            CacheOp::SaveEntitiesCanceled { .. } => "save/entities/canceled",
            CacheOp::SetEntityCache { .. } => "entity-cache/set",
        }
    }

    pub fn phase(&self) -> OpPhase {
        match self {
            CacheOp::SaveEntitiesSuccess { .. } => OpPhase::Success,
            CacheOp::SaveEntitiesError { .. } => OpPhase::Error,
            _ => OpPhase::Start,
        }
    }
}

/// A command to, or outcome from, the cache as a whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheAction {
    pub op: CacheOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<MergeStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_optimistic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub offline: bool,
    /// An error attached by a failed change-set application; the
    /// orchestrator turns the command into an immediate error outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DataServiceError>,
}

impl CacheAction {
    pub fn new(op: CacheOp) -> Self {
        CacheAction {
            op,
            correlation_id: None,
            merge_strategy: None,
            is_optimistic: None,
            tag: None,
            offline: false,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> Self {
        self.merge_strategy = Some(merge_strategy);
        self
    }

    pub fn optimistic(mut self, is_optimistic: bool) -> Self {
        self.is_optimistic = Some(is_optimistic);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Derive an outcome action: same envelope, new op, error consumed.
    pub fn to_outcome(&self, op: CacheOp) -> CacheAction {
        CacheAction {
            op,
            correlation_id: self.correlation_id.clone(),
            merge_strategy: self.merge_strategy,
            is_optimistic: self.is_optimistic,
            tag: self.tag.clone(),
            offline: self.offline,
            error: None,
        }
    }

    /// `"[tag-or-EntityCache] op-name"`, with `/offline` spliced before
    /// the success/error segment.
    pub fn type_name(&self) -> String {
        let label = self.tag.as_deref().unwrap_or("EntityCache");
        let offline = if self.offline { "/offline" } else { "" };
        let phase = match self.op.phase() {
            OpPhase::Start => "",
            OpPhase::Success => "/success",
            OpPhase::Error => "/error",
        };
        format!("[{}] {}{}{}", label, self.op.base_name(), offline, phase)
    }
}

/// Anything the store understands. Applications with their own action
/// types keep them outside this enum; the store leaves unrecognized
/// actions untouched by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Entity(EntityAction),
    Cache(CacheAction),
}

impl Action {
    pub fn type_name(&self) -> String {
        match self {
            Action::Entity(action) => action.type_name(),
            Action::Cache(action) => action.type_name(),
        }
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            Action::Entity(action) => action.correlation_id.as_ref(),
            Action::Cache(action) => action.correlation_id.as_ref(),
        }
    }
}

impl From<EntityAction> for Action {
    fn from(action: EntityAction) -> Self {
        Action::Entity(action)
    }
}

impl From<CacheAction> for Action {
    fn from(action: CacheAction) -> Self {
        Action::Cache(action)
    }
}
