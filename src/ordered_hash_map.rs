//! OrderedHashMap: separately-chained hash table with an insertion-order
//! list threaded through the same entries.
//!
//! Entries live in a `SlotMap` arena. Bucket heads, chain links and order
//! links are all arena keys, so relinking during insert, removal and resize
//! only moves small `Copy` values around.

use crate::error::MapError;
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use hashbrown::hash_map::DefaultHashBuilder;
use slotmap::{DefaultKey, SlotMap};

/// Bucket count of a map built with `new()` or `default()`.
pub const DEFAULT_CAPACITY: usize = 32;

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: Option<V>,
    hash: u64,
    chain_next: Option<DefaultKey>,
    order_prev: Option<DefaultKey>,
    order_next: Option<DefaultKey>,
}

/// A hash map with separate chaining that iterates in insertion order.
///
/// Re-inserting an existing key replaces its value in place and keeps its
/// position. A value may be left unset with [`add_key`](Self::add_key).
pub struct OrderedHashMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    buckets: Vec<Option<DefaultKey>>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    reentrancy: DebugReentrancy,
}

#[inline]
fn mix(hash: u64) -> u64 {
    let h = hash ^ (hash >> 32);
    h.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (h >> 29)
}

#[inline]
fn bucket_index(hash: u64, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (mix(hash) as usize) & (capacity - 1)
}

impl<K, V> OrderedHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a map with at least `capacity` buckets, rounded up to a power
    /// of two.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K: Eq + Hash, V> OrderedHashMap<K, V> {
    /// Map holding a single entry.
    pub fn from_pair(key: K, value: V) -> Self {
        let mut map = Self::new();
        map.add(key, value);
        map
    }

    /// Map holding a single key whose value is unset.
    pub fn from_key(key: K) -> Self {
        let mut map = Self::new();
        map.add_key(key);
        map
    }
}

impl<K, V, S: Default> Default for OrderedHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, S::default())
    }
}

impl<K, V, S> OrderedHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            hasher,
            buckets: vec![None; capacity],
            slots: SlotMap::with_capacity_and_key(capacity),
            head: None,
            tail: None,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current number of buckets. Always a power of two; never shrinks.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Earliest-inserted live entry.
    pub fn first(&self) -> Option<(&K, Option<&V>)> {
        self.head.map(|k| {
            let e = &self.slots[k];
            (&e.key, e.value.as_ref())
        })
    }

    /// Most recently inserted live entry.
    pub fn last(&self) -> Option<(&K, Option<&V>)> {
        self.tail.map(|k| {
            let e = &self.slots[k];
            (&e.key, e.value.as_ref())
        })
    }

    /// Borrowing iterator in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            next: self.head,
            remaining: self.slots.len(),
        }
    }

    /// Snapshot of all keys in insertion order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of all values in insertion order; unset values are `None`.
    pub fn values(&self) -> Vec<Option<V>>
    where
        V: Clone,
    {
        self.iter().map(|(_, v)| v.cloned()).collect()
    }

    /// Drop every entry. The bucket count is kept.
    pub fn clear(&mut self) {
        log::trace!(
            "clearing {} entries, keeping {} buckets",
            self.slots.len(),
            self.buckets.len()
        );
        self.slots.clear();
        self.buckets.fill(None);
        self.head = None;
        self.tail = None;
    }

    fn push_order_back(&mut self, k: DefaultKey) {
        match self.tail {
            Some(t) => {
                self.slots[t].order_next = Some(k);
                self.slots[k].order_prev = Some(t);
            }
            None => self.head = Some(k),
        }
        self.tail = Some(k);
    }

    fn unlink_order(&mut self, k: DefaultKey) {
        let (prev, next) = {
            let e = &self.slots[k];
            (e.order_prev, e.order_next)
        };
        match prev {
            Some(p) => self.slots[p].order_next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].order_prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_chain_back(&mut self, k: DefaultKey, bucket: usize) {
        match self.buckets[bucket] {
            None => self.buckets[bucket] = Some(k),
            Some(mut cur) => {
                while let Some(next) = self.slots[cur].chain_next {
                    cur = next;
                }
                self.slots[cur].chain_next = Some(k);
            }
        }
    }

    /// Unlink `k` from its chain (after `prev`, or at the bucket head) and
    /// from the order list, then free it.
    fn detach(
        &mut self,
        bucket: usize,
        prev: Option<DefaultKey>,
        k: DefaultKey,
    ) -> (K, Option<V>) {
        let chain_next = self.slots[k].chain_next;
        match prev {
            Some(p) => self.slots[p].chain_next = chain_next,
            None => self.buckets[bucket] = chain_next,
        }
        self.unlink_order(k);
        let entry = self
            .slots
            .remove(k)
            .expect("detached entry must be live in the arena");
        (entry.key, entry.value)
    }

    /// Remove the most recently inserted entry.
    pub fn pop_item(&mut self) -> Result<(K, Option<V>), MapError> {
        let k = self.tail.ok_or(MapError::EmptyContainer)?;
        let bucket = bucket_index(self.slots[k].hash, self.buckets.len());
        let mut prev = None;
        let mut cur = self.buckets[bucket];
        while let Some(c) = cur {
            if c == k {
                break;
            }
            prev = Some(c);
            cur = self.slots[c].chain_next;
        }
        debug_assert_eq!(cur, Some(k), "tail entry missing from its chain");
        Ok(self.detach(bucket, prev, k))
    }

    fn at_load_limit(&self) -> bool {
        // len / capacity >= 0.75
        self.slots.len() * 4 >= self.buckets.len() * 3
    }

    /// Double the bucket count and rebuild every chain from the cached
    /// hashes, visiting entries in insertion order. Order links are kept.
    fn grow(&mut self) {
        let new_capacity = self.buckets.len() * 2;
        log::trace!(
            "growing from {} to {} buckets with {} entries",
            self.buckets.len(),
            new_capacity,
            self.slots.len()
        );
        self.buckets = vec![None; new_capacity];
        let mut chain_tails: Vec<Option<DefaultKey>> = vec![None; new_capacity];
        let mut cur = self.head;
        while let Some(k) = cur {
            let hash = {
                let e = &mut self.slots[k];
                e.chain_next = None;
                cur = e.order_next;
                e.hash
            };
            let b = bucket_index(hash, new_capacity);
            match chain_tails[b] {
                Some(t) => self.slots[t].chain_next = Some(k),
                None => self.buckets[b] = Some(k),
            }
            chain_tails[b] = Some(k);
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use std::collections::HashSet;

        let cap = self.buckets.len();
        assert!(cap.is_power_of_two(), "capacity {cap} not a power of two");
        let len = self.slots.len();
        assert!(
            len == 0 || (len - 1) * 4 < cap * 3,
            "load limit exceeded: {len} entries in {cap} buckets"
        );

        // Order list: head -> tail, back links agree, ends are open.
        let mut seen_order = HashSet::new();
        let mut prev = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let e = self.slots.get(k).expect("order list points at dead entry");
            assert_eq!(e.order_prev, prev, "order back link mismatch");
            assert!(seen_order.insert(k), "order list cycles");
            prev = Some(k);
            cur = e.order_next;
        }
        assert_eq!(self.tail, prev, "tail is not the last order entry");
        assert_eq!(seen_order.len(), len, "order list length != len");

        // Chains: every entry sits in the bucket its hash selects, once.
        let mut seen_chain = HashSet::new();
        for (b, head) in self.buckets.iter().enumerate() {
            let mut cur = *head;
            while let Some(k) = cur {
                let e = self.slots.get(k).expect("chain points at dead entry");
                assert_eq!(bucket_index(e.hash, cap), b, "entry in wrong bucket");
                assert!(seen_chain.insert(k), "entry chained twice");
                cur = e.chain_next;
            }
        }
        assert_eq!(seen_chain, seen_order, "chains and order list disagree");
    }
}

impl<K, V, S> OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Walk the chain `hash` selects for an entry equal to `q`, returning
    /// it with its chain predecessor.
    fn find_in_chain<Q>(&self, hash: u64, q: &Q) -> Option<(Option<DefaultKey>, DefaultKey)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut prev = None;
        let mut cur = self.buckets[bucket_index(hash, self.buckets.len())];
        while let Some(k) = cur {
            let e = &self.slots[k];
            if e.hash == hash && e.key.borrow() == q {
                return Some((prev, k));
            }
            prev = Some(k);
            cur = e.chain_next;
        }
        None
    }

    /// Hash and look up `q`. The only place user `Hash`/`Eq` code runs, so
    /// the reentrancy guard covers exactly this.
    fn probe<Q>(&self, q: &Q) -> (u64, Option<(Option<DefaultKey>, DefaultKey)>)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        (hash, self.find_in_chain(hash, q))
    }

    /// Insert `key` with `value`, or replace the value of an existing equal
    /// key without moving it. Returns the replaced value, if one was set.
    pub fn add(&mut self, key: K, value: V) -> Option<V> {
        self.insert_slot(key, Some(value))
    }

    /// Insert `key` with its value unset. An existing key has its value
    /// cleared.
    pub fn add_key(&mut self, key: K) -> Option<V> {
        self.insert_slot(key, None)
    }

    fn insert_slot(&mut self, key: K, value: Option<V>) -> Option<V> {
        if self.at_load_limit() {
            self.grow();
        }
        let (hash, found) = self.probe(&key);
        if let Some((_, k)) = found {
            return core::mem::replace(&mut self.slots[k].value, value);
        }
        let k = self.slots.insert(Entry {
            key,
            value,
            hash,
            chain_next: None,
            order_prev: None,
            order_next: None,
        });
        self.push_order_back(k);
        self.push_chain_back(k, bucket_index(hash, self.buckets.len()));
        None
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.probe(q).1.is_some()
    }

    /// Value stored under `q`. `None` when the key is absent or its value
    /// is unset; use [`get_key_value`](Self::get_key_value) to tell them
    /// apart.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).and_then(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, Option<&V>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_, k) = self.probe(q).1?;
        let e = &self.slots[k];
        Some((&e.key, e.value.as_ref()))
    }

    /// Remove `q` and return its value. `None` when the key is absent or
    /// its value was unset.
    pub fn pop<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.pop_entry(q).and_then(|(_, v)| v)
    }

    /// Remove `q` and return the owned key and value.
    pub fn pop_entry<Q>(&mut self, q: &Q) -> Option<(K, Option<V>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, found) = self.probe(q);
        let (prev, k) = found?;
        let bucket = bucket_index(hash, self.buckets.len());
        Some(self.detach(bucket, prev, k))
    }

    /// Replace the value of an existing key. Fails with `KeyNotFound`, and
    /// leaves the map untouched, when the key is absent.
    pub fn update_value(&mut self, key: K, value: V) -> Result<Option<V>, MapError> {
        let (_, k) = self.probe(&key).1.ok_or(MapError::KeyNotFound)?;
        Ok(core::mem::replace(&mut self.slots[k].value, Some(value)))
    }

    /// Add every entry of `other` in `other`'s insertion order. Shared keys
    /// take `other`'s value and keep their position here; new keys are
    /// appended.
    pub fn update<S2>(&mut self, other: &OrderedHashMap<K, V, S2>)
    where
        K: Clone,
        V: Clone,
    {
        for (k, v) in other.iter() {
            self.insert_slot(k.clone(), v.cloned());
        }
    }

    /// Independent map with the same entries, inserted in this map's
    /// insertion order.
    pub fn copy(&self) -> Self
    where
        K: Clone,
        V: Clone,
        S: Clone,
    {
        let mut out = Self::with_capacity_and_hasher(self.capacity(), self.hasher.clone());
        for (k, v) in self.iter() {
            out.insert_slot(k.clone(), v.cloned());
        }
        out
    }

    /// Same entries regardless of insertion order. Unset values compare
    /// equal to each other only.
    pub fn equals<S2>(&self, other: &OrderedHashMap<K, V, S2>) -> bool
    where
        V: PartialEq,
        S2: BuildHasher,
    {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(k, v)| matches!(other.get_key_value(k), Some((_, ov)) if ov == v))
            && other.iter().all(|(k, _)| self.contains_key(k))
    }
}

impl<K, V, S> Clone for OrderedHashMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<K, V, S> PartialEq for OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<K, V, S> Eq for OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> FromIterator<(K, V)> for OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for OrderedHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Renders `{k: v, ...}` in insertion order; unset values print as `None`.
impl<K: fmt::Display, V: fmt::Display, S> fmt::Display for OrderedHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match v {
                Some(v) => write!(f, "{k}: {v}")?,
                None => write!(f, "{k}: None")?,
            }
        }
        f.write_str("}")
    }
}

/// Iterator over `OrderedHashMap` entries in insertion order.
pub struct Iter<'a, K, V> {
    slots: &'a SlotMap<DefaultKey, Entry<K, V>>,
    next: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, Option<&'a V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.next?;
        let slots = self.slots;
        let e = &slots[k];
        self.next = e.order_next;
        self.remaining -= 1;
        Some((&e.key, e.value.as_ref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a OrderedHashMap<K, V, S> {
    type Item = (&'a K, Option<&'a V>);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // every key lands in one chain
    }

    fn chained(keys: &[&'static str]) -> OrderedHashMap<&'static str, i32, ConstBuildHasher> {
        let mut m = OrderedHashMap::with_hasher(ConstBuildHasher);
        for (i, k) in keys.iter().enumerate() {
            m.add(*k, i as i32);
        }
        m
    }

    /// Invariant: re-adding a key replaces the value in place; len and
    /// position are unchanged.
    #[test]
    fn re_add_updates_in_place() {
        let mut m = OrderedHashMap::new();
        assert_eq!(m.add("k", 1), None);
        m.add("other", 0);
        assert_eq!(m.add("k", 2), Some(1));
        assert_eq!(m.len(), 2);
        assert_eq!(m.keys(), vec!["k", "other"]);
        assert_eq!(m.get("k"), Some(&2));
        m.check_invariants();
    }

    /// Invariant: `add_key` stores an unset value that is distinguishable
    /// from a missing key.
    #[test]
    fn unset_values_are_not_missing_keys() {
        let mut m: OrderedHashMap<String, i32> = OrderedHashMap::new();
        m.add_key("k".to_string());
        assert!(m.contains_key("k"));
        assert_eq!(m.get("k"), None);
        assert_eq!(m.get_key_value("k"), Some((&"k".to_string(), None)));
        assert_eq!(m.get_key_value("missing"), None);

        m.add("k".to_string(), 5);
        assert_eq!(m.add_key("k".to_string()), Some(5));
        assert_eq!(m.values(), vec![None]);
    }

    /// Invariant: removing the chain head, a chain middle and a chain tail
    /// each keeps both linkages consistent.
    #[test]
    fn pop_from_every_chain_position() {
        let mut m = chained(&["a", "b", "c", "d", "e"]);
        assert_eq!(m.pop("a"), Some(0)); // chain head and order head
        m.check_invariants();
        assert_eq!(m.pop("c"), Some(2)); // chain middle
        m.check_invariants();
        assert_eq!(m.pop("e"), Some(4)); // chain tail and order tail
        m.check_invariants();
        assert_eq!(m.keys(), vec!["b", "d"]);
        assert_eq!(m.first(), Some((&"b", Some(&1))));
        assert_eq!(m.last(), Some((&"d", Some(&3))));
        assert_eq!(m.pop("zzz"), None);
        assert_eq!(m.len(), 2);
    }

    /// Invariant: removing the last entry of a shared chain that is also the
    /// order tail moves `tail` back and leaves the chain head alone.
    #[test]
    fn pop_chain_tail_that_is_order_tail() {
        let mut m = chained(&["only"]);
        m.add("x", 1);
        assert_eq!(m.pop("x"), Some(1));
        assert_eq!(m.last(), Some((&"only", Some(&0))));
        m.check_invariants();
        assert_eq!(m.pop("only"), Some(0));
        assert!(m.is_empty());
        assert!(m.first().is_none() && m.last().is_none());
        m.check_invariants();

        m.add("again", 7);
        assert_eq!(m.keys(), vec!["again"]);
        m.check_invariants();
    }

    /// Invariant: removing an entry that heads its own bucket chain and is
    /// also the order tail clears the bucket and moves `tail` back.
    #[test]
    fn pop_chain_head_that_is_order_tail() {
        let mut m = OrderedHashMap::with_capacity(64);
        m.add(0u32, 0u32);
        let heads_own_chain = |m: &OrderedHashMap<u32, u32>| {
            let t = m.tail.expect("non-empty");
            m.buckets[bucket_index(m.slots[t].hash, m.capacity())] == Some(t)
        };
        let mut k = 1u32;
        loop {
            m.add(k, k);
            if heads_own_chain(&m) {
                break;
            }
            assert_eq!(m.pop(&k), Some(k));
            k += 1;
        }
        let bucket = bucket_index(m.slots[m.tail.expect("non-empty")].hash, m.capacity());
        assert_ne!(m.first(), m.last());

        assert_eq!(m.pop(&k), Some(k));
        assert_eq!(m.buckets[bucket], None);
        assert_eq!(m.last(), Some((&0, Some(&0))));
        m.check_invariants();

        assert_eq!(m.pop_item(), Ok((0, Some(0))));
        assert!(m.is_empty());
        m.check_invariants();
    }

    /// Invariant: `pop_item` removes in reverse insertion order and errors
    /// once empty.
    #[test]
    fn pop_item_drains_from_tail() {
        let mut m = chained(&["a", "b", "c"]);
        assert_eq!(m.pop_item(), Ok(("c", Some(2))));
        assert_eq!(m.pop_item(), Ok(("b", Some(1))));
        m.check_invariants();
        assert_eq!(m.pop_item(), Ok(("a", Some(0))));
        assert_eq!(m.pop_item(), Err(MapError::EmptyContainer));
        m.check_invariants();
    }

    /// Invariant: growth doubles capacity exactly when len/capacity reaches
    /// 0.75 before an add, and never reorders entries.
    #[test]
    fn grows_at_load_limit_and_keeps_order() {
        let mut m = OrderedHashMap::with_capacity(4);
        for i in 0..3 {
            m.add(i, i);
        }
        assert_eq!(m.capacity(), 4);
        m.add(3, 3); // 3/4 reached before this add
        assert_eq!(m.capacity(), 8);
        for i in 4..100 {
            m.add(i, i);
            m.check_invariants();
        }
        assert_eq!(m.keys(), (0..100).collect::<Vec<_>>());
        assert!((0..100).all(|i| m.get(&i) == Some(&i)));
    }

    /// Invariant: capacity is rounded up to a power of two and never zero.
    #[test]
    fn capacity_is_power_of_two() {
        assert_eq!(OrderedHashMap::<u8, u8>::with_capacity(0).capacity(), 1);
        assert_eq!(OrderedHashMap::<u8, u8>::with_capacity(5).capacity(), 8);
        assert_eq!(OrderedHashMap::<u8, u8>::new().capacity(), DEFAULT_CAPACITY);
    }

    /// Invariant: `clear` empties both linkages but keeps the bucket count.
    #[test]
    fn clear_keeps_capacity() {
        let mut m = OrderedHashMap::with_capacity(2);
        for i in 0..10 {
            m.add(i, ());
        }
        let cap = m.capacity();
        m.clear();
        assert_eq!(m.capacity(), cap);
        assert!(m.is_empty());
        assert!(m.keys().is_empty());
        assert_eq!(m.get(&3), None);
        m.check_invariants();
        m.add(42, ());
        assert_eq!(m.keys(), vec![42]);
    }

    /// Invariant: the growth path relinks colliding chains correctly.
    #[test]
    fn grow_with_single_chain() {
        let mut m: OrderedHashMap<u32, u32, ConstBuildHasher> =
            OrderedHashMap::with_capacity_and_hasher(1, ConstBuildHasher);
        for i in 0..20 {
            m.add(i, i * 10);
            m.check_invariants();
        }
        for i in (0..20).step_by(3) {
            assert_eq!(m.pop(&i), Some(i * 10));
            m.check_invariants();
        }
        assert_eq!(m.len(), 13);
    }

    /// Invariant: `update_value` never inserts and reports absence only
    /// when the key is truly missing.
    #[test]
    fn update_value_reports_absence_only() {
        let mut m = OrderedHashMap::new();
        m.add("a", 1);
        assert_eq!(m.update_value("a", 2), Ok(Some(1)));
        assert_eq!(m.get("a"), Some(&2));
        assert_eq!(m.update_value("b", 3), Err(MapError::KeyNotFound));
        assert!(!m.contains_key("b"));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: the iterator reports an exact length and stops for good.
    #[test]
    fn iter_is_exact_size() {
        let m = chained(&["a", "b", "c"]);
        let mut it = m.iter();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
        assert_eq!(it.clone().count(), 2);
        it.by_ref().for_each(drop);
        assert_eq!(it.next(), None);
    }

    /// Invariant (debug-only): a key whose `Eq` re-enters the map during a
    /// probe panics instead of reading a half-linked chain.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_panics_from_eq_during_get() {
        struct ReentryKey {
            id: &'static str,
            map: *const OrderedHashMap<ReentryKey, i32, ConstBuildHasher>,
            trigger: bool,
        }
        impl PartialEq for ReentryKey {
            fn eq(&self, other: &Self) -> bool {
                if self.id == other.id {
                    return true;
                }
                if other.trigger {
                    unsafe {
                        let m = &*other.map;
                        let _ = m.contains_key(self);
                    }
                }
                false
            }
        }
        impl Eq for ReentryKey {}
        impl Hash for ReentryKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        let mut m: OrderedHashMap<ReentryKey, i32, ConstBuildHasher> =
            OrderedHashMap::with_hasher(ConstBuildHasher);
        m.add(
            ReentryKey {
                id: "a",
                map: core::ptr::null(),
                trigger: false,
            },
            1,
        );
        let query = ReentryKey {
            id: "b",
            map: &m as *const _,
            trigger: true,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = m.get(&query);
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    }

    /// Invariant: a key whose `Hash` panics during `add` (right after a
    /// resize) leaves both linkages intact and the guard released.
    #[test]
    fn panicking_hash_leaves_map_consistent() {
        #[derive(Clone, Debug, PartialEq, Eq)]
        struct Fragile(u32);
        impl Hash for Fragile {
            fn hash<H: Hasher>(&self, state: &mut H) {
                assert_ne!(self.0, 999, "unhashable key");
                self.0.hash(state);
            }
        }

        let mut m = OrderedHashMap::with_capacity(4);
        for i in 0..3 {
            m.add(Fragile(i), i);
        }
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            m.add(Fragile(999), 999);
        }));
        assert!(res.is_err(), "hash panic must propagate");
        assert_eq!(m.capacity(), 8, "grow ran before the panicking probe");
        m.check_invariants();
        assert_eq!(m.len(), 3);

        m.add(Fragile(5), 5);
        assert_eq!(m.get(&Fragile(5)), Some(&5));
        assert_eq!(
            m.keys(),
            vec![Fragile(0), Fragile(1), Fragile(2), Fragile(5)]
        );
        m.check_invariants();
    }

    #[test]
    fn seeded_constructors() {
        let pair = OrderedHashMap::from_pair("k", 1);
        assert_eq!(pair.keys(), vec!["k"]);
        assert_eq!(pair.get("k"), Some(&1));

        let bare: OrderedHashMap<&str, i32> = OrderedHashMap::from_key("k");
        assert_eq!(bare.len(), 1);
        assert_eq!(bare.get_key_value("k"), Some((&"k", None)));
        assert_eq!(bare.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn display_and_debug_follow_insertion_order() {
        let mut m = OrderedHashMap::new();
        m.add("z", 1);
        m.add_key("a");
        m.add("m", 3);
        assert_eq!(m.to_string(), "{z: 1, a: None, m: 3}");
        assert_eq!(format!("{:?}", m), r#"{"z": Some(1), "a": None, "m": Some(3)}"#);
        assert_eq!(OrderedHashMap::<u8, u8>::new().to_string(), "{}");
    }
}
