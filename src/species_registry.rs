use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Integer surrogate for a species name. Species are compared through this
/// identifier, never through the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameId(pub u32);

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name#{}", self.0)
    }
}

struct Entry {
    name: String,
    holders: usize,
}

/// Bijective map between species names and [`NameId`]s.
///
/// Every live species holds one reference on its name. Once the last holder
/// releases a name its identifier goes back to the free list and may be handed
/// out to a different name later.
#[derive(Default)]
pub struct SpeciesRegistry {
    by_name: HashMap<String, NameId>,
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        SpeciesRegistry::default()
    }

    /// Returns the identifier of `name`, assigning one if needed, and records
    /// one more holder.
    pub fn acquire(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.by_name.get(name) {
            if let Some(entry) = self.entries[id.0 as usize].as_mut() {
                entry.holders += 1;
            }
            return id;
        }

        let entry = Entry {
            name: name.to_string(),
            holders: 1,
        };
        let id = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = Some(entry);
                NameId(index)
            }
            None => {
                self.entries.push(Some(entry));
                NameId((self.entries.len() - 1) as u32)
            }
        };
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Drops one holder of `id`. Returns true if the identifier was reclaimed.
    pub fn release(&mut self, id: NameId) -> bool {
        let Some(slot) = self.entries.get_mut(id.0 as usize) else {
            return false;
        };
        let Some(entry) = slot.as_mut() else {
            return false;
        };
        entry.holders -= 1;
        if entry.holders > 0 {
            return false;
        }
        if let Some(entry) = slot.take() {
            self.by_name.remove(&entry.name);
        }
        self.free.push(id.0);
        true
    }

    pub fn string_to_int(&self, name: &str) -> Option<NameId> {
        self.by_name.get(name).copied()
    }

    pub fn int_to_string(&self, id: NameId) -> Option<&str> {
        self.entries
            .get(id.0 as usize)
            .and_then(|entry| entry.as_ref())
            .map(|entry| entry.name.as_str())
    }

    pub fn holders(&self, id: NameId) -> usize {
        self.entries
            .get(id.0 as usize)
            .and_then(|entry| entry.as_ref())
            .map_or(0, |entry| entry.holders)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.entries.clear();
        self.free.clear();
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        let mut registry = SpeciesRegistry::new();
        let a = registry.acquire("A");
        let b = registry.acquire("B");
        assert_ne!(a, b);
        assert_eq!(a, registry.acquire("A"));
        assert_eq!(registry.holders(a), 2);
        assert_eq!(registry.string_to_int("B"), Some(b));
        assert_eq!(registry.int_to_string(a), Some("A"));
    }

    #[test]
    fn identifiers_are_reclaimed() {
        let mut registry = SpeciesRegistry::new();
        let a = registry.acquire("A");
        registry.acquire("A");
        assert!(!registry.release(a));
        assert_eq!(registry.int_to_string(a), Some("A"));
        assert!(registry.release(a));
        assert_eq!(registry.string_to_int("A"), None);
        assert_eq!(registry.int_to_string(a), None);

        let c = registry.acquire("C");
        assert_eq!(c, a);
        assert_eq!(registry.int_to_string(c), Some("C"));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut registry = SpeciesRegistry::new();
        registry.acquire("A");
        registry.acquire("B");
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.acquire("B"), NameId(0));
    }
}
