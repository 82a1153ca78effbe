//! Opaque entity references.
//!
//! Spaces, pieces and every other board object live in the game's own state.
//! The engine only ever sees an `EntityId`: it can compare, hash and
//! serialize one, and board selections offer lists of them as candidates.
//! Moving an entity is the business of move callbacks, never the resolver.

use serde::{Deserialize, Serialize};

/// Stable identifier of a game entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_basics() {
        let e = EntityId::new(7);
        assert_eq!(e.raw(), 7);
        assert_eq!(e, EntityId(7));
        assert_eq!(e.to_string(), "#7");
    }
}
