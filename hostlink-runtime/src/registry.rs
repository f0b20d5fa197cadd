use std::collections::HashMap;

/// Maps opaque `u64` ids to values owned on behalf of a foreign caller.
///
/// Ids start at 1 and are never reused, so 0 can signal failure across the
/// C ABI and a stale id never reaches a newer value.
pub struct Registry<T> {
    items: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert an item and return its id.
    pub fn insert(&mut self, item: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_not_reused() {
        let mut registry = Registry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");
        assert_eq!((a, b), (1, 2));
        assert_eq!(registry.remove(a), Some("a"));
        let c = registry.insert("c");
        assert_eq!(c, 3);
        assert!(registry.get(a).is_none());
        assert_eq!(registry.get(c), Some(&"c"));
        assert_eq!(registry.len(), 2);
    }
}
