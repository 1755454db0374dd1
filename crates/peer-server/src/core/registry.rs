//! Id-keyed registries for clients and rooms.
//!
//! A thin wrapper over `HashMap` with the contract both registries share:
//! insertion is rejected (not overwritten) for a duplicate id, removal of
//! an absent id is a no-op, and no iteration order is guaranteed.

use std::collections::HashMap;

/// An entity addressable by a stable string id.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Registry of entities keyed by id.
#[derive(Debug)]
pub struct Registry<T: Keyed> {
    entries: HashMap<String, T>,
}

impl<T: Keyed> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert an entity under its own id. Returns false (and leaves the
    /// registry untouched) if the id is already present.
    pub fn add(&mut self, entity: T) -> bool {
        match self.entries.entry(entity.key().to_owned()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    /// Remove by id; `None` if absent.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.entries.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

impl<T: Keyed> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
