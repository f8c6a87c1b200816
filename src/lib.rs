//! chained-ordered-map: a single-threaded hash map with separate chaining
//! that remembers the order in which keys were first inserted.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: O(1) average insert/lookup/remove plus traversal in insertion
//!   order, with both linkages kept consistent by every mutation.
//! - Every entry sits on two lists at once:
//!   - a singly-linked bucket chain (the hash table proper), and
//!   - a doubly-linked order list spanning all entries, oldest first.
//!
//! Storage
//! - Entries live in a `slotmap::SlotMap` arena. Chain heads, chain links,
//!   order links and the `head`/`tail` ends are `Option<DefaultKey>`, so no
//!   entry ever holds a reference to another and removal or resize only
//!   rewrites small integers.
//! - The bucket table is a `Vec` whose length is always a power of two;
//!   `index = mix(hash) & (capacity - 1)`.
//!
//! Hasher and rehashing invariants
//! - Each entry stores the `u64` hash computed on insertion. Resize and
//!   `pop_item` use the stored hash; `K: Hash` runs once per inserted key.
//! - Before every `add`, if `len / capacity >= 0.75` the table doubles. The
//!   new chains are built by walking the order list head to tail, so the
//!   order list needs no changes and chain order follows insertion order.
//! - Capacity never shrinks, not even on `clear`.
//!
//! Values
//! - A value may be unset (`add_key`). Internally values are `Option<V>`;
//!   accessors that return a single `Option<&V>` flatten "absent key" and
//!   "unset value", while `get_key_value`/`pop_entry` keep them apart.
//!
//! Reentrancy
//! - User code (`K: Hash`, `K: Eq`) only runs while probing a chain. That
//!   probe holds a debug-only reentrancy guard; links are rewritten only
//!   after it finishes.
//!
//! Notes and non-goals
//! - Single-threaded: the map is `!Send`/`!Sync`.
//! - Keys are immutable once inserted; there is no `key_mut`.
//! - Order is insertion order only; re-adding a key does not move it.

mod error;
mod ordered_hash_map;
mod ordered_hash_map_proptest;
mod reentrancy;

// Public surface
pub use error::MapError;
pub use ordered_hash_map::{Iter, OrderedHashMap, DEFAULT_CAPACITY};
