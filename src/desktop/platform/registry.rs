//! Handle registry for native element references.
//!
//! Hands out stable string ids for native elements. Re-registering an
//! element equal to one already held returns the existing id, so repeated
//! lookups of the same node during a long poll do not grow the map.

use dashmap::DashMap;

use crate::desktop::types::{ElementHandle, ElementId};

pub struct HandleRegistry<T> {
    entries: DashMap<ElementId, T>,
}

impl<T: Clone + PartialEq> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn register(&self, element: T) -> ElementHandle {
        let existing = self
            .entries
            .iter()
            .find(|entry| *entry.value() == element)
            .map(|entry| entry.key().clone());
        if let Some(id) = existing {
            return ElementHandle::new(id);
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.entries.insert(id.clone(), element);
        ElementHandle::new(id)
    }

    pub fn resolve(&self, handle: &ElementHandle) -> Option<T> {
        self.entries.get(handle.id()).map(|entry| entry.value().clone())
    }

    /// Drop every held reference; outstanding handles resolve to nothing
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone + PartialEq> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_element_keeps_its_handle() {
        let registry = HandleRegistry::new();
        let first = registry.register("window".to_string());

        for _ in 0..1_000 {
            assert_eq!(registry.register("window".to_string()), first);
        }
        let button = registry.register("button".to_string());

        assert_ne!(button, first);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(&first).as_deref(), Some("window"));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let registry = HandleRegistry::new();
        let handle = registry.register(7u32);

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.resolve(&handle), None);
    }
}
