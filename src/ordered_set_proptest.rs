#![cfg(test)]

// Property tests for OrderedSet: balance under random insert/remove
// sequences, equivalence with BTreeSet, and the set-algebra identities.

use crate::ordered_set::OrderedSet;
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
enum Op {
    Add(i16),
    Remove(i16),
    Contains(i16),
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    // A narrow key range makes removals of present keys common.
    let key = -64i16..64;
    let op = prop_oneof![
        8 => key.clone().prop_map(Op::Add),
        6 => key.clone().prop_map(Op::Remove),
        2 => key.prop_map(Op::Contains),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..300)
}

fn build(xs: &BTreeSet<i16>) -> OrderedSet<i16> {
    let mut s = OrderedSet::new();
    for x in xs {
        s.add(x);
    }
    s
}

// Property: after every operation the tree is a valid red-black tree
// (black root, no red-red, equal black height, strictly increasing
// traversal, length matches node count) and agrees with BTreeSet.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_balanced_after_every_op(ops in arb_ops()) {
        let mut sut: OrderedSet<i16> = OrderedSet::new();
        let mut model: BTreeSet<i16> = BTreeSet::new();
        for op in ops {
            match op {
                Op::Add(x) => prop_assert_eq!(sut.add(&x), model.insert(x)),
                Op::Remove(x) => prop_assert_eq!(sut.remove(&x), model.remove(&x)),
                Op::Contains(x) => prop_assert_eq!(sut.contains(&x), model.contains(&x)),
                Op::Clear => {
                    sut.clear();
                    model.clear();
                }
            }
            if let Err(v) = sut.validate() {
                prop_assert!(false, "invariant violated: {}", v);
            }
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.minimum(), model.first());
            prop_assert_eq!(sut.maximum(), model.last());
        }
        let seen: Vec<i16> = sut.iter().copied().collect();
        let expected: Vec<i16> = model.into_iter().collect();
        prop_assert_eq!(seen, expected);
    }
}

// Property: |A∪B| = |A|+|B|-|A∩B|; A\B and B\A are disjoint; both operands
// are subsets of the union; equals is reflexive and symmetric.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_set_algebra(
        a in proptest::collection::btree_set(-40i16..40, 0..40),
        b in proptest::collection::btree_set(-40i16..40, 0..40),
    ) {
        let sa = build(&a);
        let sb = build(&b);
        let union = sa.union(&sb);
        let inter = sa.intersection(&sb);
        prop_assert_eq!(union.len(), sa.len() + sb.len() - inter.len());

        let a_minus_b = sa.complement(&sb);
        let b_minus_a = sb.complement(&sa);
        prop_assert_eq!(a_minus_b.intersection(&b_minus_a).len(), 0);

        prop_assert!(union.subset(&sa));
        prop_assert!(union.subset(&sb));
        prop_assert!(sa.equals(&sa));
        prop_assert_eq!(sa.equals(&sb), sb.equals(&sa));
        prop_assert_eq!(sa.equals(&sb), a == b);

        let expected: Vec<i16> = a.union(&b).copied().collect();
        prop_assert_eq!(union.iter().copied().collect::<Vec<_>>(), expected);
        for s in [&union, &inter, &a_minus_b, &b_minus_a] {
            prop_assert!(s.validate().is_ok());
        }
    }
}
