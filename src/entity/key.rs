use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Primary key of a cached entity.
///
/// Server ids arrive as JSON strings or integers; both sort and hash, so a
/// key works as a `BTreeMap` key and as a correlation target. Integer keys
/// order before string keys.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Num(i64),
    Str(String),
}

impl EntityKey {
    /// Read a key out of a JSON value, if the value can denote one.
    ///
    /// Empty strings, floats, and non-scalar values do not resolve.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(EntityKey::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(EntityKey::Num),
            _ => None,
        }
    }

    /// The key as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            EntityKey::Num(n) => Value::from(*n),
            EntityKey::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Num(n) => write!(f, "{}", n),
            EntityKey::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(n: i64) -> Self {
        EntityKey::Num(n)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        EntityKey::Str(s.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        EntityKey::Str(s)
    }
}

/// Serialize `EntityKey`-keyed maps as pair sequences. JSON object keys
/// are strings, which would turn a numeric key into a string key on the
/// way back in; a sequence of `[key, value]` pairs round-trips exactly.
pub(crate) mod keyed_map {
    use std::collections::BTreeMap;

    use serde::de::Deserializer;
    use serde::ser::Serializer;
    use serde::{Deserialize, Serialize};

    use super::EntityKey;

    pub fn serialize<V, S>(
        map: &BTreeMap<EntityKey, V>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<EntityKey, V>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(EntityKey, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// A tracked add/update/upsert could not resolve a primary key.
///
/// This is a programmer error, not a runtime condition: an entity without a
/// key cannot be tracked or normalized, and silently skipping it would
/// corrupt the cache untraceably.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve a primary key for a {entity_name} entity in {operation}")]
pub struct KeyError {
    pub entity_name: String,
    pub operation: &'static str,
}

impl KeyError {
    pub fn new(entity_name: impl Into<String>, operation: &'static str) -> Self {
        KeyError {
            entity_name: entity_name.into(),
            operation,
        }
    }
}
