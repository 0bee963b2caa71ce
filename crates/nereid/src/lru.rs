//! Fixed-capacity least-recently-used cache.
//!
//! Recency is a score taken from a counter that increases on every access.
//! When the counter would overflow, all entries are sorted by score and
//! renumbered from zero, which preserves their relative order. Capacities
//! are small (tens of entries), so entries live in a `Vec` and lookups scan.

/// An LRU cache holding at most `capacity` entries.
#[derive(Debug, Clone)]
pub struct LruCache<K, V> {
    entries: Vec<Entry<K, V>>,
    capacity: usize,
    next_score: u32,
    max_score: u32,
}

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    score: u32,
}

impl<K: Eq, V> LruCache<K, V> {
    /// Create a cache.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_max_score(capacity, u32::MAX)
    }

    fn with_max_score(capacity: usize, max_score: u32) -> Self {
        assert!(capacity > 0, "capacity must be at least 1");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_score: 0,
            max_score,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is cached. Does not affect recency.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        // Rescoring reorders entries, so look up after bumping.
        let score = self.bump();
        let index = self.position(key)?;
        let entry = &mut self.entries[index];
        entry.score = score;
        Some(&entry.value)
    }

    /// Insert or replace `key`, making it most recently used.
    ///
    /// Returns the evicted entry when a new key had to make room.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let score = self.bump();
        if let Some(index) = self.position(&key) {
            let entry = &mut self.entries[index];
            entry.value = value;
            entry.score = score;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_least_recent()
        } else {
            None
        };
        self.entries.push(Entry { key, value, score });
        evicted
    }

    /// Remove and return `key`'s value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        let index = self.position(key)?;
        Some(self.entries.swap_remove(index).value)
    }

    /// Values from least to most recently used.
    pub fn values_by_recency(&self) -> impl Iterator<Item = &V> + '_ {
        let mut order: Vec<&Entry<K, V>> = self.entries.iter().collect();
        order.sort_by_key(|e| e.score);
        order.into_iter().map(|e| &e.value)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_score = 0;
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|e| e.key == *key)
    }

    fn evict_least_recent(&mut self) -> Option<(K, V)> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.score)
            .map(|(i, _)| i)?;
        let entry = self.entries.swap_remove(index);
        Some((entry.key, entry.value))
    }

    fn bump(&mut self) -> u32 {
        if self.next_score >= self.max_score {
            self.rescore();
        }
        let score = self.next_score;
        self.next_score += 1;
        score
    }

    fn rescore(&mut self) {
        self.entries.sort_by_key(|e| e.score);
        let mut score = 0;
        for entry in &mut self.entries {
            entry.score = score;
            score += 1;
        }
        self.next_score = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut lru = LruCache::new(2);
        lru.insert("a", 1);
        lru.insert("b", 2);
        assert_eq!(lru.get(&"a"), Some(&1));

        let evicted = lru.insert("c", 3);

        assert_eq!(evicted, Some(("b", 2)));
        assert!(lru.contains(&"a"));
        assert!(lru.contains(&"c"));
    }

    #[test]
    fn insert_existing_key_replaces_without_eviction() {
        let mut lru = LruCache::new(2);
        lru.insert("a", 1);
        lru.insert("b", 2);

        assert_eq!(lru.insert("a", 10), None);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.get(&"a"), Some(&10));
    }

    #[test]
    fn take_removes_entry() {
        let mut lru = LruCache::new(2);
        lru.insert("a", 1);

        assert_eq!(lru.take(&"a"), Some(1));
        assert_eq!(lru.take(&"a"), None);
        assert!(lru.is_empty());
    }

    #[test]
    fn rescoring_preserves_recency_order() {
        let mut lru = LruCache::with_max_score(3, 4);
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.insert("c", 3);
        lru.get(&"a");
        // The counter overflows on each of the next accesses.
        lru.get(&"c");
        lru.get(&"b");

        let order: Vec<i32> = lru.values_by_recency().copied().collect();
        assert_eq!(order, vec![1, 3, 2]);

        assert_eq!(lru.insert("d", 4), Some(("a", 1)));
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_panics() {
        let _ = LruCache::<u32, u32>::new(0);
    }
}
