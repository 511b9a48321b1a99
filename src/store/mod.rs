//! The store: serialized application of transitions to the single cache
//! value, snapshot observation, and the command → outcome loop.

mod store;

pub use store::CacheStore;
