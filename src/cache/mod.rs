//! The multi-collection cache and the reducer that fans cache-level
//! commands out into per-collection reductions.

mod action;
mod cache;
mod reducer;

pub use action::{Action, CacheAction, CacheOp};
pub use cache::EntityCache;
pub use reducer::{EntityCacheReducer, ReduceError};
