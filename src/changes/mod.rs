//! Per-entity change tracking: the change-state model and the pure
//! tracker that records, commits, undoes, and reconciles local changes.

mod state;
mod tracker;

pub use state::{ChangeEntry, ChangeState, ChangeType, MergeStrategy};
pub use tracker::ChangeTracker;
