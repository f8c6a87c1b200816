#![cfg(test)]

// Property tests for OrderedHashMap kept inside the crate so they can call
// the internal `check_invariants` after every step.

use crate::error::MapError;
use crate::ordered_hash_map::OrderedHashMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    AddKey(usize),
    Pop(usize),
    PopItem,
    Get(usize),
    Contains(String),
    UpdateValue(usize, i32),
    Clear,
    Snapshot,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Add(i, v)),
            1 => idx.clone().prop_map(OpI::AddKey),
            2 => idx.clone().prop_map(OpI::Pop),
            1 => Just(OpI::PopItem),
            1 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::UpdateValue(i, v)),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Snapshot),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Reference model: entries in insertion order.
type Model = Vec<(Key, Option<i32>)>;

fn position(model: &Model, k: &Key) -> Option<usize> {
    model.iter().position(|(mk, _)| mk == k)
}

// State-machine equivalence against an ordered Vec model. After every op:
// both linkages are consistent, len matches, and keys/values come back in
// the model's order.
fn run_scenario<S: BuildHasher>(
    mut sut: OrderedHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: Model = Vec::new();
    for op in ops {
        match op {
            OpI::Add(i, v) => {
                let k = key_from(&pool, i);
                let prev = sut.add(k.clone(), v);
                match position(&model, &k) {
                    Some(p) => {
                        prop_assert_eq!(prev, model[p].1);
                        model[p].1 = Some(v);
                    }
                    None => {
                        prop_assert_eq!(prev, None);
                        model.push((k, Some(v)));
                    }
                }
            }
            OpI::AddKey(i) => {
                let k = key_from(&pool, i);
                let prev = sut.add_key(k.clone());
                match position(&model, &k) {
                    Some(p) => {
                        prop_assert_eq!(prev, model[p].1.take());
                    }
                    None => model.push((k, None)),
                }
            }
            OpI::Pop(i) => {
                let k = key_from(&pool, i);
                let got = sut.pop_entry(&k);
                let want = position(&model, &k).map(|p| model.remove(p));
                prop_assert_eq!(got, want);
            }
            OpI::PopItem => {
                let got = sut.pop_item();
                let want = model.pop().ok_or(MapError::EmptyContainer);
                prop_assert_eq!(got, want);
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                let want = position(&model, &k).map(|p| model[p].1);
                prop_assert_eq!(sut.get_key_value(&k).map(|(_, v)| v.copied()), want);
                prop_assert_eq!(sut.get(&k).copied(), want.flatten());
            }
            OpI::Contains(s) => {
                let has_model = model.iter().any(|(k, _)| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::UpdateValue(i, v) => {
                let k = key_from(&pool, i);
                let got = sut.update_value(k.clone(), v);
                match position(&model, &k) {
                    Some(p) => {
                        let old = model[p].1.replace(v);
                        prop_assert_eq!(got, Ok(old));
                    }
                    None => {
                        prop_assert_eq!(got, Err(MapError::KeyNotFound));
                    }
                }
            }
            OpI::Clear => {
                let cap = sut.capacity();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), cap);
            }
            OpI::Snapshot => {
                let keys: Vec<Key> = model.iter().map(|(k, _)| k.clone()).collect();
                let values: Vec<Option<i32>> = model.iter().map(|(_, v)| *v).collect();
                prop_assert_eq!(sut.keys(), keys);
                prop_assert_eq!(sut.values(), values);
            }
        }

        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let order: Vec<&Key> = sut.iter().map(|(k, _)| k).collect();
        let model_order: Vec<&Key> = model.iter().map(|(k, _)| k).collect();
        prop_assert_eq!(order, model_order);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        // Start tiny so most scenarios cross several resizes.
        run_scenario(OrderedHashMap::with_capacity(2), pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress chain splicing.
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
    }
}

// Same invariants as above with every key in one chain, so removals hit
// head, middle and tail chain positions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = OrderedHashMap::with_capacity_and_hasher(2, ConstBuildHasher);
        run_scenario(sut, pool, ops)?;
    }
}
