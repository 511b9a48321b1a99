use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token minted per persistable command. Matches a terminal
/// success/error/cancel outcome back to its in-flight request and targets
/// cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        CorrelationId(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of correlation ids, unique enough to disambiguate every command
/// in flight for the process lifetime.
pub trait CorrelationIdGenerator: Send + Sync {
    fn next_id(&self) -> CorrelationId;
}

/// Default generator: random v4 uuids.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidCorrelationIds;

impl CorrelationIdGenerator for UuidCorrelationIds {
    fn next_id(&self) -> CorrelationId {
        CorrelationId::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let generator = UuidCorrelationIds;
        assert_ne!(generator.next_id(), generator.next_id());
    }

    #[test]
    fn serde_round_trip() {
        let id = CorrelationId::new();
        let text = serde_json::to_string(&id).unwrap();
        let back: CorrelationId = serde_json::from_str(&text).unwrap();
        assert_eq!(back, id);
    }
}
