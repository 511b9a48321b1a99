use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{EntityKey, EntityUpdate};

/// One typed group of changes for a single entity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChangeSetItem {
    Add {
        entity_name: String,
        entities: Vec<Value>,
    },
    Delete {
        entity_name: String,
        keys: Vec<EntityKey>,
    },
    Update {
        entity_name: String,
        updates: Vec<EntityUpdate>,
    },
    Upsert {
        entity_name: String,
        entities: Vec<Value>,
    },
}

impl ChangeSetItem {
    pub fn entity_name(&self) -> &str {
        match self {
            ChangeSetItem::Add { entity_name, .. }
            | ChangeSetItem::Delete { entity_name, .. }
            | ChangeSetItem::Update { entity_name, .. }
            | ChangeSetItem::Upsert { entity_name, .. } => entity_name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChangeSetItem::Add { entities, .. } | ChangeSetItem::Upsert { entities, .. } => {
                entities.len()
            }
            ChangeSetItem::Delete { keys, .. } => keys.len(),
            ChangeSetItem::Update { updates, .. } => updates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered batch of change groups, applied and persisted as one unit.
/// Groups apply in array order; no reordering or dependency analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<ChangeSetItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(ChangeSetItem::is_empty)
    }

    /// The affected entity names, in order of first appearance.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for item in &self.changes {
            if !names.contains(&item.entity_name()) {
                names.push(item.entity_name());
            }
        }
        names
    }

    /// Drop groups with nothing in them; a server round-trip for an empty
    /// group is wasted work.
    pub fn exclude_empty_items(mut self) -> Self {
        self.changes.retain(|item| !item.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_names_dedupe_in_first_appearance_order() {
        let changeset = ChangeSet {
            changes: vec![
                ChangeSetItem::Add {
                    entity_name: "Villain".into(),
                    entities: vec![json!({ "id": 1 })],
                },
                ChangeSetItem::Delete {
                    entity_name: "Hero".into(),
                    keys: vec![EntityKey::from(2)],
                },
                ChangeSetItem::Update {
                    entity_name: "Villain".into(),
                    updates: vec![EntityUpdate::new(1, json!({ "name": "V" }))],
                },
            ],
            tag: None,
        };
        assert_eq!(changeset.entity_names(), vec!["Villain", "Hero"]);
    }

    #[test]
    fn exclude_empty_items_drops_hollow_groups() {
        let changeset = ChangeSet {
            changes: vec![
                ChangeSetItem::Add { entity_name: "Hero".into(), entities: vec![] },
                ChangeSetItem::Delete {
                    entity_name: "Hero".into(),
                    keys: vec![EntityKey::from(1)],
                },
            ],
            tag: None,
        }
        .exclude_empty_items();

        assert_eq!(changeset.changes.len(), 1);
        assert!(!changeset.is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let changeset = ChangeSet {
            changes: vec![ChangeSetItem::Upsert {
                entity_name: "Hero".into(),
                entities: vec![json!({ "id": 1, "name": "A" })],
            }],
            tag: Some("bulk import".into()),
        };
        let text = serde_json::to_string(&changeset).unwrap();
        let back: ChangeSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, changeset);
    }
}
