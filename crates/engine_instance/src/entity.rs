//! Entity identity.
//!
//! An [`EntityId`] names one engine object whose attributes and properties a
//! component can bridge. IDs are handed out by an [`EntityAllocator`] owned by
//! whoever spawns instances.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an engine entity. `0` is reserved as [`EntityId::INVALID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Sentinel for "no entity".
    pub const INVALID: EntityId = EntityId(0);

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is [`EntityId::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity#{}", self.0)
    }
}

/// Hands out increasing [`EntityId`]s starting at 1.
///
/// Allocation goes through `&self` so a single allocator can be shared by
/// reference between spawners on one thread.
#[derive(Debug)]
pub struct EntityAllocator {
    next: Cell<u64>,
}

impl EntityAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }

    /// Returns a fresh, never-before-seen ID.
    pub fn allocate(&self) -> EntityId {
        let id = self.next.get();
        self.next.set(id + 1);
        EntityId(id)
    }

    /// How many IDs have been handed out.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next.get() - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
