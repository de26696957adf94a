use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Derived values keyed by entity, valid for exactly one version of it.
///
/// A lookup with a different version than the stored one is a miss; the
/// entity's owner invalidates by bumping its version, never by hashing
/// content. Owned by the render engine rather than shared globally.
pub struct VersionCache<K, V> {
    entries: HashMap<K, (u64, V)>,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V> VersionCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&self, key: &K, version: u64) -> Option<&V> {
        match self.entries.get(key) {
            Some((v, value)) if *v == version => Some(value),
            _ => None,
        }
    }

    /// Return the cached value for `version`, building and storing it on a miss.
    pub fn get_or_build(&mut self, key: &K, version: u64, build: impl FnOnce() -> V) -> &V {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut e) => {
                if e.get().0 == version {
                    self.hits += 1;
                } else {
                    self.misses += 1;
                    *e.get_mut() = (version, build());
                }
                &e.into_mut().1
            }
            Entry::Vacant(e) => {
                self.misses += 1;
                &e.insert((version, build())).1
            }
        }
    }

    pub fn insert(&mut self, key: K, version: u64, value: V) {
        self.entries.insert(key, (version, value));
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop entries whose key is not in `active`. Returns how many went.
    pub fn cleanup(&mut self, active: &HashSet<K>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| active.contains(k));
        before - self.entries.len()
    }

    pub fn version(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|(v, _)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl<K: Eq + Hash + Clone, V> Default for VersionCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_bump_forces_rebuild() {
        let mut cache: VersionCache<&str, u32> = VersionCache::new();
        let mut builds = 0;
        for _ in 0..3 {
            cache.get_or_build(&"a", 1, || {
                builds += 1;
                10
            });
        }
        assert_eq!(builds, 1);
        assert_eq!(*cache.get_or_build(&"a", 2, || 20), 20);
        assert_eq!(cache.get(&"a", 1), None);
        assert_eq!(cache.get(&"a", 2), Some(&20));
        assert_eq!(cache.stats(), (2, 2));
    }

    #[test]
    fn cleanup_keeps_only_active_keys() {
        let mut cache = VersionCache::new();
        cache.insert(1u32, 0, "one");
        cache.insert(2u32, 0, "two");
        cache.insert(3u32, 0, "three");
        let removed = cache.cleanup(&HashSet::from([2u32]));
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        cache.invalidate(&2);
        assert!(cache.is_empty());
    }
}
