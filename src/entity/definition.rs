use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::key::EntityKey;

/// Resolves an entity's primary key from its JSON value.
pub type KeySelector = Arc<dyn Fn(&Value) -> Option<EntityKey> + Send + Sync>;

/// Default optimism per save family, consulted when a command does not say.
///
/// Deletes default to optimistic (the entity disappears immediately and the
/// server call confirms); everything else defaults to pessimistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveDefaults {
    pub optimistic_add: bool,
    pub optimistic_delete: bool,
    pub optimistic_update: bool,
    pub optimistic_upsert: bool,
    pub optimistic_save_entities: bool,
}

impl Default for SaveDefaults {
    fn default() -> Self {
        SaveDefaults {
            optimistic_add: false,
            optimistic_delete: true,
            optimistic_update: false,
            optimistic_upsert: false,
            optimistic_save_entities: false,
        }
    }
}

/// Metadata for one entity type: its name, how to read a primary key out of
/// an entity, and the save-optimism defaults for its commands.
#[derive(Clone)]
pub struct EntityDefinition {
    entity_name: String,
    select_key: KeySelector,
    save_defaults: SaveDefaults,
}

impl EntityDefinition {
    /// Definition keyed on the conventional `"id"` field.
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self::with_key_field(entity_name, "id")
    }

    /// Definition keyed on a named top-level field.
    pub fn with_key_field(entity_name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        EntityDefinition {
            entity_name: entity_name.into(),
            select_key: Arc::new(move |entity| {
                entity.get(&field).and_then(EntityKey::from_value)
            }),
            save_defaults: SaveDefaults::default(),
        }
    }

    /// Definition with a custom key selector.
    pub fn with_key_selector(
        entity_name: impl Into<String>,
        select_key: impl Fn(&Value) -> Option<EntityKey> + Send + Sync + 'static,
    ) -> Self {
        EntityDefinition {
            entity_name: entity_name.into(),
            select_key: Arc::new(select_key),
            save_defaults: SaveDefaults::default(),
        }
    }

    /// Override the save-optimism defaults.
    pub fn with_save_defaults(mut self, save_defaults: SaveDefaults) -> Self {
        self.save_defaults = save_defaults;
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Resolve the primary key of an entity, if it has one.
    pub fn key_of(&self, entity: &Value) -> Option<EntityKey> {
        (self.select_key)(entity)
    }

    pub fn save_defaults(&self) -> SaveDefaults {
        self.save_defaults
    }
}

impl fmt::Debug for EntityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinition")
            .field("entity_name", &self.entity_name)
            .field("save_defaults", &self.save_defaults)
            .finish()
    }
}

// The `select_key` closure cannot participate in equality; compare the
// observable, non-closure fields (mirrors the `Debug` impl above).
impl PartialEq for EntityDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.entity_name == other.entity_name && self.save_defaults == other.save_defaults
    }
}

/// An operation named a collection whose metadata was never registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no entity definition registered for {0}")]
pub struct DefinitionError(pub String);

/// Explicit registry from entity-type name to its definition.
///
/// Injected wherever key selection or collection creation is needed; there
/// is no ambient lookup.
#[derive(Clone, Default)]
pub struct EntityDefinitionRegistry {
    definitions: HashMap<String, Arc<EntityDefinition>>,
}

impl EntityDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one for the same name.
    pub fn register(&mut self, definition: EntityDefinition) -> &mut Self {
        self.definitions.insert(
            definition.entity_name().to_string(),
            Arc::new(definition),
        );
        self
    }

    pub fn get(&self, entity_name: &str) -> Result<Arc<EntityDefinition>, DefinitionError> {
        self.definitions
            .get(entity_name)
            .cloned()
            .ok_or_else(|| DefinitionError(entity_name.to_string()))
    }

    pub fn contains(&self, entity_name: &str) -> bool {
        self.definitions.contains_key(entity_name)
    }

    /// Registered entity names, in no particular order.
    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(|name| name.as_str()).collect()
    }
}

impl fmt::Debug for EntityDefinitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinitionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
