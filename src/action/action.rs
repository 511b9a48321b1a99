use serde::{Deserialize, Serialize};

use crate::changes::MergeStrategy;
use crate::persist::DataServiceError;

use super::correlation::CorrelationId;
use super::op::{EntityOp, OpPhase};

/// A command to, or outcome from, one named collection.
///
/// The envelope carries everything that must survive from a command into
/// its derived outcomes: the correlation id, optimism, merge strategy, tag,
/// the skip marking, and any error attached upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityAction {
    pub entity_name: String,
    pub op: EntityOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<MergeStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_optimistic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Set when the caller (or the reducer) determined the operation needs
    /// no network execution, e.g. deleting a never-saved Added entity.
    #[serde(default)]
    pub skip: bool,
    /// Set on outcomes that were reconciled by the offline data service
    /// rather than confirmed by the server.
    #[serde(default)]
    pub offline: bool,
    /// An error attached by an upstream component, turning the command
    /// into an immediate error outcome when executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DataServiceError>,
}

impl EntityAction {
    pub fn new(entity_name: impl Into<String>, op: EntityOp) -> Self {
        EntityAction {
            entity_name: entity_name.into(),
            op,
            correlation_id: None,
            merge_strategy: None,
            is_optimistic: None,
            tag: None,
            skip: false,
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

    pub fn with_error(mut self, error: DataServiceError) -> Self {
        self.error = Some(error);
        self
    }

    /// Derive an outcome action: same envelope, new op. The pre-attached
    /// error is consumed by the transition and not carried forward.
    pub fn to_outcome(&self, op: EntityOp) -> EntityAction {
        EntityAction {
            entity_name: self.entity_name.clone(),
            op,
            correlation_id: self.correlation_id.clone(),
            merge_strategy: self.merge_strategy,
            is_optimistic: self.is_optimistic,
            tag: self.tag.clone(),
            skip: self.skip,
            offline: self.offline,
            error: None,
        }
    }

    /// The externally visible discriminator:
    /// `"[tag-or-entityName] op-name"`, with `/offline` spliced before the
    /// success/error segment for offline-reconciled outcomes.
    pub fn type_name(&self) -> String {
        let label = self.tag.as_deref().unwrap_or(&self.entity_name);
        let base = self.op.base_name();
        let offline = if self.offline { "/offline" } else { "" };
        let phase = match self.op.phase() {
            OpPhase::Start => "",
            OpPhase::Success => "/success",
            OpPhase::Error => "/error",
        };
        format!("[{}] {}{}{}", label, base, offline, phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_name_uses_entity_name_or_tag() {
        let action = EntityAction::new("Hero", EntityOp::QueryAll);
        assert_eq!(action.type_name(), "[Hero] query/all");

        let action = action.with_tag("Dashboard Heroes");
        assert_eq!(action.type_name(), "[Dashboard Heroes] query/all");
    }

    #[test]
    fn type_name_appends_phase_and_offline_segments() {
        let mut action = EntityAction::new(
            "Hero",
            EntityOp::SaveAddOneSuccess { entity: json!({ "id": 1 }) },
        );
        assert_eq!(action.type_name(), "[Hero] save/add-one/success");

        action.offline = true;
        assert_eq!(action.type_name(), "[Hero] save/add-one/offline/success");
    }

    #[test]
    fn outcomes_keep_the_envelope_and_drop_the_error() {
        let id = CorrelationId::new();
        let command = EntityAction::new("Hero", EntityOp::QueryAll)
            .with_correlation_id(id.clone())
            .optimistic(true)
            .with_tag("tag")
            .with_error(DataServiceError::local("attached"));

        let outcome = command.to_outcome(EntityOp::QueryAllSuccess { entities: vec![] });
        assert_eq!(outcome.correlation_id, Some(id));
        assert_eq!(outcome.is_optimistic, Some(true));
        assert_eq!(outcome.tag.as_deref(), Some("tag"));
        assert_eq!(outcome.error, None);
    }
}
