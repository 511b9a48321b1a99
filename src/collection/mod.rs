//! Entity collections: the normalized snapshot type, the map adapter that
//! mutates it structurally, and the reducer that drives it per operation.

mod adapter;
mod collection;
mod reducer;

pub use adapter::CollectionAdapter;
pub use collection::EntityCollection;
pub use reducer::{EntityCollectionReducer, ReducedCollection};
