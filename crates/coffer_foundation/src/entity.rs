//! Entity identifiers.

use std::fmt;

/// Entity identifier.
///
/// An entity is just an index into the registry's dense entity table; it
/// carries no data of its own. Ids are issued densely from zero and a
/// destroyed id is handed out again before any new one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Entity(u64);

impl Entity {
    /// Reserved value marking a destroyed or absent entity.
    ///
    /// This is `u64::MAX`, which is never issued as a live id.
    pub const SENTINEL: Entity = Entity(u64::MAX);

    /// Creates an entity with the given id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns the id as a table index.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true if this is the sentinel value.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 == u64::MAX
    }
}

impl From<u64> for Entity {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "Entity(sentinel)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "sentinel")
        } else {
            write!(f, "e{}", self.0)
        }
    }
}
