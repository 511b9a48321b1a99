use serde_json::Value;

use crate::entity::{EntityKey, EntityUpdate};

use super::set::{ChangeSet, ChangeSetItem};

/// Fluent assembly of a [`ChangeSet`], one group per call, in call order.
///
/// ## Example
///
/// ```
/// use entity_cache::{ChangeSetBuilder, EntityKey};
/// use serde_json::json;
///
/// let changeset = ChangeSetBuilder::new()
///     .add("Hero", vec![json!({ "id": 1, "name": "A" })])
///     .delete("Villain", vec![EntityKey::from(9)])
///     .with_tag("cleanup")
///     .build();
///
/// assert_eq!(changeset.changes.len(), 2);
/// assert_eq!(changeset.tag.as_deref(), Some("cleanup"));
/// ```
#[derive(Debug, Default)]
pub struct ChangeSetBuilder {
    changes: Vec<ChangeSetItem>,
    tag: Option<String>,
}

impl ChangeSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn add(mut self, entity_name: impl Into<String>, entities: Vec<Value>) -> Self {
        self.changes.push(ChangeSetItem::Add {
            entity_name: entity_name.into(),
            entities,
        });
        self
    }

    pub fn delete(mut self, entity_name: impl Into<String>, keys: Vec<EntityKey>) -> Self {
        self.changes.push(ChangeSetItem::Delete {
            entity_name: entity_name.into(),
            keys,
        });
        self
    }

    pub fn update(mut self, entity_name: impl Into<String>, updates: Vec<EntityUpdate>) -> Self {
        self.changes.push(ChangeSetItem::Update {
            entity_name: entity_name.into(),
            updates,
        });
        self
    }

    pub fn upsert(mut self, entity_name: impl Into<String>, entities: Vec<Value>) -> Self {
        self.changes.push(ChangeSetItem::Upsert {
            entity_name: entity_name.into(),
            entities,
        });
        self
    }

    /// Build the change set, dropping empty groups.
    pub fn build(self) -> ChangeSet {
        ChangeSet {
            changes: self.changes,
            tag: self.tag,
        }
        .exclude_empty_items()
    }
}
