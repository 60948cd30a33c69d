// A shortest-path consumer built only on the public iteration surface:
// positions live in vertex values, distances are assigned onto edges, and an
// OrderedSet serves as the priority queue.
use protocol_collections::{DirectedGraph, ElementProtocol, Natural, OrderedSet};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Vertices use `x`/`y`; edges use `distance`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct NodeValue {
    x: f64,
    y: f64,
    distance: f64,
}

#[derive(Clone, Default)]
struct NodeProtocol;

impl ElementProtocol<NodeValue> for NodeProtocol {
    fn create_default(&self) -> NodeValue {
        NodeValue::default()
    }
    fn copy(&self, elem: &NodeValue) -> NodeValue {
        *elem
    }
    fn compare(&self, a: &NodeValue, b: &NodeValue) -> Ordering {
        a.distance.total_cmp(&b.distance)
    }
    fn hash(&self, elem: &NodeValue) -> u64 {
        elem.distance.to_bits()
    }
}

type Map = DirectedGraph<String, NodeValue, Natural, NodeProtocol>;

fn load(text: &str) -> Map {
    let mut g = Map::with_protocols(Natural::new(), NodeProtocol).unwrap();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["add", id, x, y] => {
                let value = NodeValue {
                    x: x.parse().unwrap(),
                    y: y.parse().unwrap(),
                    distance: 0.0,
                };
                g.set(&id.to_string(), &value).unwrap();
            }
            ["link", from, to] => {
                g.connect(&from.to_string(), &to.to_string()).unwrap();
            }
            other => panic!("bad line {other:?}"),
        }
    }
    g
}

fn assign_distances(g: &mut Map) {
    let pending: Vec<(String, String, f64)> = g
        .connections()
        .map(|c| {
            let d = ((c.from_value.x - c.to_value.x).powi(2)
                + (c.from_value.y - c.to_value.y).powi(2))
            .sqrt();
            (c.from_id.clone(), c.to_id.clone(), d)
        })
        .collect();
    for (from, to, distance) in pending {
        let value = NodeValue {
            distance,
            ..NodeValue::default()
        };
        g.assign(&from, &to, &value).unwrap();
    }
}

/// Dijkstra over assigned edge distances. Non-negative `f64` bit patterns
/// order like the values, so `(bits, id)` pairs sort by distance.
fn shortest(g: &mut Map, from: &str, to: &str) -> Option<(f64, Vec<String>)> {
    let mut dist: HashMap<String, f64> = HashMap::new();
    let mut prev: HashMap<String, String> = HashMap::new();
    let mut frontier: OrderedSet<(u64, String)> = OrderedSet::new();
    dist.insert(from.to_string(), 0.0);
    frontier.add(&(0f64.to_bits(), from.to_string()));

    while let Some(entry) = frontier.minimum().cloned() {
        frontier.remove(&entry);
        let (bits, u) = entry;
        let d = f64::from_bits(bits);
        if u == to {
            let mut path = vec![u.clone()];
            while let Some(p) = prev.get(path.last()?) {
                path.push(p.clone());
            }
            path.reverse();
            return Some((d, path));
        }
        if dist.get(&u).map_or(false, |&best| d > best) {
            continue;
        }
        let neighbors: Vec<String> = g.outgoing(&u).cloned().collect();
        for v in neighbors {
            let w = g.edge_value(&u, &v).unwrap()?.distance;
            let candidate = d + w;
            if dist.get(&v).map_or(true, |&best| candidate < best) {
                dist.insert(v.clone(), candidate);
                prev.insert(v.clone(), u.clone());
                frontier.add(&(candidate.to_bits(), v));
            }
        }
    }
    None
}

const MAP: &str = "
    add A 0 0
    add B 3 0
    add C 3 4
    add D 0 4
    add E 6 4
    add F 9 9
    link A B
    link B C
    link A C
    link C E
    link A D
    link D E
    link F A
";

#[test]
fn finds_the_shortest_route() {
    let mut g = load(MAP);
    assert_eq!(g.vertex_count(), 6);
    assert_eq!(g.edge_count(), 7);
    assign_distances(&mut g);
    g.validate().unwrap();

    let (d, path) = shortest(&mut g, "A", "E").unwrap();
    assert_eq!(d, 8.0);
    assert_eq!(path, ["A", "C", "E"]);

    let (d, path) = shortest(&mut g, "B", "E").unwrap();
    assert_eq!(d, 7.0);
    assert_eq!(path, ["B", "C", "E"]);
}

#[test]
fn unreachable_target_yields_none() {
    let mut g = load(MAP);
    assign_distances(&mut g);
    assert!(shortest(&mut g, "E", "A").is_none(), "E has no outgoing edges");
    assert!(shortest(&mut g, "A", "F").is_none(), "F is only a source");
}

#[test]
fn detour_after_removal() {
    let mut g = load(MAP);
    assign_distances(&mut g);
    g.remove(&"C".to_string());
    let (d, path) = shortest(&mut g, "A", "E").unwrap();
    assert_eq!(d, 10.0);
    assert_eq!(path, ["A", "D", "E"]);
    assert_eq!(g.edge_count(), 4);
}
