#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can reach
// internal accessors without feature gates.

use crate::hash_table::{Handle, HashTable, HashTableConfig};
use crate::protocol::Natural;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hasher;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, i32),
    Add(usize),
    Reset(usize),
    Remove(usize),
    Get(usize),
    Rehash(u8),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            2 => idx.clone().prop_map(Op::Add),
            1 => idx.clone().prop_map(Op::Reset),
            4 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Get),
            1 => any::<u8>().prop_map(Op::Rehash),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run<S: std::hash::BuildHasher>(
    mut sut: HashTable<String, i32, Natural<S>, Natural>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            Op::Set(i, v) => {
                let k = &pool[i];
                let h = sut.set(k, &v).expect("set");
                if let Some(&prev) = live.get(k) {
                    prop_assert_eq!(prev, h, "overwrite keeps the entry");
                }
                live.insert(k.clone(), h);
                model.insert(k.clone(), v);
            }
            Op::Add(i) => {
                let k = &pool[i];
                sut.add(k).expect("add");
                model.entry(k.clone()).or_insert(0);
                if let Some(h) = sut.find(k) {
                    live.insert(k.clone(), h);
                }
            }
            Op::Reset(i) => {
                let k = &pool[i];
                sut.reset(k);
                if let Some(v) = model.get_mut(k) {
                    *v = 0;
                }
            }
            Op::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove(k);
                prop_assert_eq!(removed, model.remove(k).is_some());
                if let Some(h) = live.remove(k) {
                    stale.push(h);
                }
            }
            Op::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            Op::Rehash(n) => {
                let target = sut.len().max(1) * 2 + usize::from(n);
                let before = sut.len();
                sut.rehash(target).expect("rehash to a roomy capacity");
                prop_assert_eq!(sut.len(), before);
                prop_assert_eq!(sut.occupied(), before, "rehash clears tombstones");
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain().map(|(_, h)| h));
            }
            Op::Iterate => {
                let s: BTreeSet<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m: BTreeSet<(String, i32)> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s, m);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert!(
            sut.occupied() as f64 / sut.capacity() as f64 <= sut.load_factor(),
            "load factor bound"
        );
        if let Err(v) = sut.validate() {
            prop_assert!(false, "invariant violated: {}", v);
        }
        for (k, h) in &live {
            prop_assert_eq!(h.value(&sut), model.get(k));
        }
        for h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - set/add/reset/remove/get agree with the model after every operation.
// - `validate()` holds: size <= occupied <= capacity, tombstone accounting,
//   every key reachable along its own probe sequence, no duplicate keys.
// - Occupancy never exceeds the load factor.
// - Handles of live keys resolve to the model's value; removed ones never do.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let config = HashTableConfig { initial_capacity: 8, ..HashTableConfig::default() };
        let sut = HashTable::with_config(Natural::new(), Natural::new(), config).unwrap();
        run(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution
// and growth on saturated probe sequences.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl std::hash::BuildHasher for ConstBuildHasher {
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

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_colliding((pool, ops) in arb_scenario()) {
        let config = HashTableConfig { initial_capacity: 4, load_factor: 0.5 };
        let sut = HashTable::with_config(
            Natural::with_hasher(ConstBuildHasher),
            Natural::new(),
            config,
        )
        .unwrap();
        run(sut, &pool, ops)?;
    }
}
