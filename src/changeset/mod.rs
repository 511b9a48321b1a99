//! Multi-collection change sets: one atomic batch of adds, deletes,
//! updates, and upserts across entity types, submitted for persistence as
//! a unit.

mod builder;
mod set;

pub use builder::ChangeSetBuilder;
pub use set::{ChangeSet, ChangeSetItem};
