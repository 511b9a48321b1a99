//! Entity identity: keys, per-type definitions, and the update shapes
//! exchanged with a server.

mod definition;
mod key;
mod query;
mod update;

pub use definition::{
    DefinitionError, EntityDefinition, EntityDefinitionRegistry, KeySelector, SaveDefaults,
};
pub(crate) use key::keyed_map;
pub use key::{EntityKey, KeyError};
pub use query::QueryParams;
pub use update::{merge_changes, EntityUpdate, UpdateResponse};
