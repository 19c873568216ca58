//! LRU (Least Recently Used) cache implementation
//!
//! Entries live in an arena of slots threaded into a doubly-linked recency
//! list by index (head = most recently used). A hash index maps each key to
//! its slot, so lookup, insertion, promotion and eviction are all O(1).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ahash::RandomState;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Arena cell.
///
/// `generation` moves forward every time the value held here stops being
/// the one an [`EntryRef`] was issued for.
struct Slot<K, V> {
    generation: u64,
    node: Option<Node<K, V>>,
}

/// Expiring locator for a cached value.
///
/// Returned by [`LruCache::get_ref`]. Unlike a borrow from [`LruCache::get`],
/// an `EntryRef` can be held across later cache operations. Once the entry
/// it points at is evicted, removed, cleared or overwritten,
/// [`LruCache::resolve`] reports [`Error::StaleReference`] instead of
/// handing out whatever now occupies the slot.
///
/// A locator is only meaningful for the cache that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    index: usize,
    generation: u64,
}

/// LRU cache with fixed capacity
///
/// The borrow returned by [`get`](Self::get) is tied to `&mut self`, so the
/// compiler rules out reading an entry after a later call evicted or
/// replaced it. Use [`get_ref`](Self::get_ref) when a lookup result has to
/// outlive further operations.
pub struct LruCache<K, V> {
    map: HashMap<K, usize, RandomState>,
    slots: Vec<Slot<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU cache holding at most `capacity` entries
    ///
    /// # Errors
    /// Returns [`Error::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            warn!("rejecting LRU cache with zero capacity");
            return Err(Error::InvalidCapacity(capacity));
        }
        debug!(capacity, "creating LRU cache");

        Ok(Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            slots: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
        })
    }

    /// Get a value from the cache, marking it most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.node(idx).map(|node| &node.value)
    }

    /// Get a mutable value from the cache, marking it most recently used
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.slots[idx].node.as_mut().map(|node| &mut node.value)
    }

    /// Look up a key like [`get`](Self::get), returning an expiring locator
    pub fn get_ref<Q>(&mut self, key: &Q) -> Option<EntryRef>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        Some(EntryRef {
            index: idx,
            generation: self.slots[idx].generation,
        })
    }

    /// Get a value without touching its recency
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.node(idx).map(|node| &node.value)
    }

    /// Check whether a key is cached without touching its recency
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert a key-value pair into the cache
    ///
    /// An existing key has its value replaced and becomes most recently
    /// used; nothing is evicted. A new key on a full cache evicts the least
    /// recently used entry, which is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            let slot = &mut self.slots[idx];
            slot.generation = slot.generation.wrapping_add(1);
            if let Some(node) = &mut slot.node {
                node.value = value;
            }
            self.move_to_front(idx);
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            let evicted = self.pop_lru();
            trace!(len = self.map.len(), "evicted least recently used entry");
            evicted
        } else {
            None
        };

        let idx = self.alloc_slot();
        self.slots[idx].node = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.map.insert(key, idx);

        evicted
    }

    /// Remove a key from the cache
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        self.take_slot(idx).map(|node| node.value)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        let node = self.take_slot(idx)?;
        self.map.remove(&node.key);
        Some((node.key, node.value))
    }
}

impl<K, V> LruCache<K, V> {
    /// Resolve a locator obtained from [`get_ref`](LruCache::get_ref)
    ///
    /// Does not change recency.
    ///
    /// # Errors
    /// Returns [`Error::StaleReference`] when the entry has been evicted,
    /// removed, cleared or overwritten since the locator was issued.
    pub fn resolve(&self, entry: EntryRef) -> Result<&V> {
        match self.slots.get(entry.index) {
            Some(slot) if slot.generation == entry.generation => slot
                .node
                .as_ref()
                .map(|node| &node.value)
                .ok_or(Error::StaleReference),
            _ => Err(Error::StaleReference),
        }
    }

    /// Check whether a locator still points at a cached value
    pub fn is_live(&self, entry: EntryRef) -> bool {
        self.resolve(entry).is_ok()
    }

    /// Peek at the entry that would be evicted next
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let idx = self.tail?;
        self.node(idx).map(|node| (&node.key, &node.value))
    }

    /// Iterate from most to least recently used without changing recency
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cache: self,
            next: self.head,
            remaining: self.map.len(),
        }
    }

    /// Get the current size of the cache
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries the cache retains
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the cache
    ///
    /// Every outstanding [`EntryRef`] becomes stale. Slots are kept for reuse.
    pub fn clear(&mut self) {
        self.map.clear();
        for slot in &mut self.slots {
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
        }
        self.free_list.clear();
        self.free_list.extend((0..self.slots.len()).rev());
        self.head = None;
        self.tail = None;
    }

    fn node(&self, idx: usize) -> Option<&Node<K, V>> {
        self.slots[idx].node.as_ref()
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        self.unlink(idx);
        self.push_front(idx);
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;

        if let Some(node) = &mut self.slots[idx].node {
            node.prev = None;
            node.next = old_head;
        }

        if let Some(head_idx) = old_head {
            if let Some(head) = &mut self.slots[head_idx].node {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &self.slots[idx].node {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.slots[prev_idx].node {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.slots[next_idx].node {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    /// Unlink a slot, empty it and return it to the free list.
    fn take_slot(&mut self, idx: usize) -> Option<Node<K, V>> {
        self.unlink(idx);
        let slot = &mut self.slots[idx];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(idx);
        Some(node)
    }

    fn alloc_slot(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                node: None,
            });
            idx
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over cache entries, most recently used first
pub struct Iter<'a, K, V> {
    cache: &'a LruCache<K, V>,
    next: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let node = self.cache.node(idx)?;
        self.next = node.next;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a LruCache<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<K: Clone, V>(cache: &LruCache<K, V>) -> Vec<K> {
        cache.iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");

        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn test_lru_zero_capacity() {
        let result = LruCache::<u32, u32>::new(0);
        assert_eq!(result.err(), Some(Error::InvalidCapacity(0)));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        let evicted = cache.insert(3, "c"); // Should evict 1

        assert_eq!(evicted, Some((1, "a")));
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.get(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_promotion_on_get() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.get(&1); // Move 1 to front
        cache.insert(3, "c"); // Should evict 2

        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_overwrite() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        let evicted = cache.insert(1, "z"); // Overwrite, promotes 1

        assert_eq!(evicted, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(keys(&cache), vec![1, 2]);
        assert_eq!(cache.get(&1), Some(&"z"));
        assert_eq!(cache.get(&2), Some(&"b"));
    }

    #[test]
    fn test_lru_reference_scenario() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "test1".to_string());
        assert_eq!(keys(&cache), vec![1]);
        cache.insert(2, "test2".to_string());
        assert_eq!(keys(&cache), vec![2, 1]);
        cache.insert(1, "test1".to_string());
        assert_eq!(keys(&cache), vec![1, 2]);
        let evicted = cache.insert(3, "test3".to_string());
        assert_eq!(evicted, Some((2, "test2".to_string())));

        assert_eq!(cache.get(&1).map(String::as_str), Some("test1"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3).map(String::as_str), Some("test3"));
    }

    #[test]
    fn test_lru_borrowed_key_lookup() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert("alpha".to_string(), 1);

        assert_eq!(cache.get("alpha"), Some(&1));
        assert!(cache.contains_key("alpha"));
        assert_eq!(cache.remove("alpha"), Some(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_get_mut() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, vec![1]);
        cache.insert(2, vec![2]);
        if let Some(v) = cache.get_mut(&1) {
            v.push(10);
        }
        cache.insert(3, vec![3]); // Should evict 2

        assert_eq!(cache.peek(&1), Some(&vec![1, 10]));
        assert!(!cache.contains_key(&2));
    }

    #[test]
    fn test_lru_peek_does_not_promote() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        assert_eq!(cache.peek(&1), Some(&"a"));
        assert!(cache.contains_key(&1));
        cache.insert(3, "c"); // 1 is still the oldest

        assert!(!cache.contains_key(&1));
        assert_eq!(keys(&cache), vec![3, 2]);
    }

    #[test]
    fn test_lru_remove() {
        let mut cache = LruCache::new(3).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.insert(3, "c");

        assert_eq!(cache.remove(&2), Some("b"));
        assert_eq!(cache.remove(&2), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(keys(&cache), vec![3, 1]);
    }

    #[test]
    fn test_lru_pop_and_peek_lru() {
        let mut cache = LruCache::new(3).unwrap();
        assert_eq!(cache.pop_lru(), None);

        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.insert(3, "c");
        cache.get(&1);

        assert_eq!(cache.peek_lru(), Some((&2, &"b")));
        assert_eq!(cache.pop_lru(), Some((2, "b")));
        assert_eq!(cache.pop_lru(), Some((3, "c")));
        assert_eq!(cache.pop_lru(), Some((1, "a")));
        assert_eq!(cache.pop_lru(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = LruCache::new(3).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.iter().next(), None);

        cache.insert(3, "c");
        cache.insert(4, "d");
        cache.insert(5, "e");
        assert_eq!(keys(&cache), vec![5, 4, 3]);
    }

    #[test]
    fn test_lru_iter_order() {
        let mut cache = LruCache::new(4).unwrap();

        for i in 0..4 {
            cache.insert(i, i * 10);
        }
        cache.get(&1);

        let iter = cache.iter();
        assert_eq!(iter.len(), 4);
        let entries: Vec<_> = iter.map(|(k, v)| (*k, *v)).collect();
        assert_eq!(entries, vec![(1, 10), (3, 30), (2, 20), (0, 0)]);
        assert_eq!(format!("{:?}", cache), "{1: 10, 3: 30, 2: 20, 0: 0}");
    }

    #[test]
    fn test_entry_ref_resolves_without_promotion() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        let one = cache.get_ref(&1).unwrap(); // Promotes 1
        let two = cache.get_ref(&2).unwrap(); // Promotes 2

        assert_eq!(cache.resolve(one), Ok(&"a"));
        assert_eq!(keys(&cache), vec![2, 1]);
        assert!(cache.is_live(two));
        assert_eq!(cache.get_ref(&3), None);
    }

    #[test]
    fn test_entry_ref_stale_after_eviction() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "test1");
        cache.insert(2, "test2");
        let two = cache.get_ref(&2).unwrap();
        cache.insert(1, "test1");
        cache.insert(3, "test3"); // Evicts 2; its slot is reused by 3

        assert_eq!(cache.resolve(two), Err(Error::StaleReference));
        assert!(!cache.is_live(two));
        assert_eq!(cache.get(&3), Some(&"test3"));
    }

    #[test]
    fn test_entry_ref_stale_after_overwrite() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, "old");
        let before = cache.get_ref(&1).unwrap();
        cache.insert(1, "new");
        let after = cache.get_ref(&1).unwrap();

        assert_eq!(cache.resolve(before), Err(Error::StaleReference));
        assert_eq!(cache.resolve(after), Ok(&"new"));
    }

    #[test]
    fn test_entry_ref_survives_get_mut() {
        let mut cache = LruCache::new(2).unwrap();

        cache.insert(1, 1);
        let one = cache.get_ref(&1).unwrap();
        *cache.get_mut(&1).unwrap() += 1;

        assert_eq!(cache.resolve(one), Ok(&2));
    }

    #[test]
    fn test_entry_ref_stale_after_remove_and_clear() {
        let mut cache = LruCache::new(3).unwrap();

        cache.insert(1, "a");
        cache.insert(2, "b");
        let one = cache.get_ref(&1).unwrap();
        let two = cache.get_ref(&2).unwrap();

        cache.remove(&1);
        assert_eq!(cache.resolve(one), Err(Error::StaleReference));
        assert!(cache.is_live(two));

        cache.clear();
        assert_eq!(cache.resolve(two), Err(Error::StaleReference));

        // Reused slots must not revive old locators
        cache.insert(7, "x");
        cache.insert(8, "y");
        assert!(!cache.is_live(one));
        assert!(!cache.is_live(two));
    }

    #[test]
    fn test_lru_matches_model() {
        // Deterministic LCG so the sequence is reproducible without extra crates
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as u32
        };

        for capacity in 1..=5 {
            let mut cache = LruCache::new(capacity).unwrap();
            // Model: most recently used first
            let mut model: Vec<(u32, u32)> = Vec::new();

            for step in 0..2000u32 {
                let key = next() % 8;
                match next() % 4 {
                    0 => {
                        let got = cache.get(&key).copied();
                        let pos = model.iter().position(|(k, _)| *k == key);
                        let expected = pos.map(|p| {
                            let entry = model.remove(p);
                            model.insert(0, entry);
                            entry.1
                        });
                        assert_eq!(got, expected);
                    }
                    1 => {
                        let got = cache.remove(&key);
                        let expected = model
                            .iter()
                            .position(|(k, _)| *k == key)
                            .map(|p| model.remove(p).1);
                        assert_eq!(got, expected);
                    }
                    _ => {
                        let evicted = cache.insert(key, step);
                        let expected = match model.iter().position(|(k, _)| *k == key) {
                            Some(p) => {
                                model.remove(p);
                                None
                            }
                            None if model.len() == capacity => model.pop(),
                            None => None,
                        };
                        model.insert(0, (key, step));
                        assert_eq!(evicted, expected);
                    }
                }

                assert!(cache.len() <= capacity);
                let actual: Vec<_> = cache.iter().map(|(k, v)| (*k, *v)).collect();
                assert_eq!(actual, model);
            }
        }
    }
}
