#![cfg(test)]

// Property tests for DirectedGraph. Every operation sequence runs against
// two graphs, one materialized up front and one left adjacency-only, plus a
// multiset model of the edges.

use crate::graph::DirectedGraph;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

const POOL: u8 = 8;

#[derive(Clone, Debug)]
enum Op {
    Add(u8),
    Remove(u8),
    Connect(u8, u8),
    Disconnect(u8, u8),
    Assign(u8, u8, i32),
    Unassign(u8, u8),
    ClearEdges,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let v = 0..POOL;
    let op = prop_oneof![
        3 => v.clone().prop_map(Op::Add),
        1 => v.clone().prop_map(Op::Remove),
        5 => (v.clone(), v.clone()).prop_map(|(a, b)| Op::Connect(a, b)),
        2 => (v.clone(), v.clone()).prop_map(|(a, b)| Op::Disconnect(a, b)),
        2 => (v.clone(), v.clone(), any::<i32>()).prop_map(|(a, b, x)| Op::Assign(a, b, x)),
        1 => (v.clone(), v).prop_map(|(a, b)| Op::Unassign(a, b)),
        1 => Just(Op::ClearEdges),
    ];
    proptest::collection::vec(op, 1..120)
}

type Model = (BTreeSet<u8>, BTreeMap<(u8, u8), usize>);

fn apply(g: &mut DirectedGraph<u8, i32>, op: &Op) {
    match *op {
        Op::Add(v) => {
            g.add(&v).unwrap();
        }
        Op::Remove(v) => {
            g.remove(&v);
        }
        Op::Connect(a, b) => {
            let _ = g.connect(&a, &b);
        }
        Op::Disconnect(a, b) => {
            let _ = g.disconnect(&a, &b);
        }
        Op::Assign(a, b, x) => {
            let _ = g.assign(&a, &b, &x);
        }
        Op::Unassign(a, b) => {
            let _ = g.unassign(&a, &b);
        }
        Op::ClearEdges => g.clear_edges(),
    }
}

fn apply_model((vertices, edges): &mut Model, op: &Op) {
    match *op {
        Op::Add(v) => {
            vertices.insert(v);
        }
        Op::Remove(v) => {
            vertices.remove(&v);
            edges.retain(|&(a, b), _| a != v && b != v);
        }
        Op::Connect(a, b) => {
            if vertices.contains(&a) && vertices.contains(&b) {
                *edges.entry((a, b)).or_default() += 1;
            }
        }
        Op::Disconnect(a, b) => {
            if let Some(n) = edges.get_mut(&(a, b)) {
                *n -= 1;
                if *n == 0 {
                    edges.remove(&(a, b));
                }
            }
        }
        Op::Assign(a, b, _) => {
            if vertices.contains(&a) && vertices.contains(&b) {
                edges.entry((a, b)).or_insert(1);
            }
        }
        Op::Unassign(..) => {}
        Op::ClearEdges => edges.clear(),
    }
}

// Property: degree/edge consistency and edge-index transparency.
// - edge_count == Σ out_degree == Σ in_degree == model multiset size.
// - `adjacent(u, w)` agrees between the materialized and adjacency-only
//   graphs for every pair, and with the model.
// - After `remove(v)` nothing references `v` (checked by `validate()`,
//   which also checks the index mirrors the adjacency lists exactly).
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_degrees_and_index_transparency(ops in arb_ops()) {
        let mut indexed: DirectedGraph<u8, i32> = DirectedGraph::new().unwrap();
        indexed.materialize().unwrap();
        let mut plain: DirectedGraph<u8, i32> = DirectedGraph::new().unwrap();
        let mut model: Model = Default::default();

        for op in &ops {
            apply(&mut indexed, op);
            // Keep the adjacency-only graph unmaterialized: assign would
            // materialize it, so route assign through connect-if-absent.
            match *op {
                Op::Assign(a, b, _) => {
                    if !plain.adjacent(&a, &b) {
                        let _ = plain.connect(&a, &b);
                    }
                }
                Op::Unassign(..) => {}
                _ => apply(&mut plain, op),
            }
            apply_model(&mut model, op);
            prop_assert!(!plain.is_materialized());

            for g in [&indexed, &plain] {
                if let Err(v) = g.validate() {
                    prop_assert!(false, "invariant violated: {}", v);
                }
                let expected: usize = model.1.values().sum();
                prop_assert_eq!(g.edge_count(), expected);
                let out: usize = (0..POOL).map(|v| g.out_degree(&v)).sum();
                let inc: usize = (0..POOL).map(|v| g.in_degree(&v)).sum();
                prop_assert_eq!(out, expected);
                prop_assert_eq!(inc, expected);
                prop_assert_eq!(g.vertex_count(), model.0.len());
            }
            for a in 0..POOL {
                for b in 0..POOL {
                    let want = model.1.contains_key(&(a, b));
                    prop_assert_eq!(indexed.adjacent(&a, &b), want);
                    prop_assert_eq!(plain.adjacent(&a, &b), want);
                }
            }
        }

        // Late materialization must agree with the index maintained all along.
        plain.materialize().unwrap();
        plain.validate().unwrap();
        let late: BTreeSet<(u8, u8)> = plain
            .edges()
            .unwrap()
            .map(|e| (*e.from_id, *e.to_id))
            .collect();
        let early: BTreeSet<(u8, u8)> = indexed
            .edges()
            .unwrap()
            .map(|e| (*e.from_id, *e.to_id))
            .collect();
        prop_assert_eq!(late, early);
    }
}
