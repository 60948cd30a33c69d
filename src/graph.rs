//! DirectedGraph: vertices in a [`HashTable`], edges in adjacency deques,
//! and an optional edge-value index built on first demand.
//!
//! ## Layout
//! - The vertex table maps each id to a record `{ value, outgoing, incoming }`.
//!   The table's copy of the id is the only owned copy; everything else
//!   refers to a vertex by its [`VertexHandle`], which resolves back to the
//!   id and stays valid across vertex-table rehashes.
//! - An edge `from -> to` is one `to` entry in `from.outgoing` and one `from`
//!   entry in `to.incoming`. `edge_count` is the total number of outgoing
//!   entries.
//! - The edge index starts out absent (adjacency-only). The
//!   first operation that needs edge values materializes it into a second
//!   table keyed by handle pairs, and from then on every edge mutation keeps
//!   it in lockstep with the adjacency lists. The transition is one-way.
//!
//! `connect` does not check for an existing edge, so repeated calls record
//! parallel adjacency entries; the index holds at most one entry per ordered
//! pair and drops it only when the last parallel entry is disconnected.

use crate::error::{Endpoint, GraphError, GraphResult, InvariantViolation, Result};
use crate::hash_table::{Handle, HashTable, HashTableConfig};
use crate::protocol::{ElementProtocol, Natural};
use core::cmp::Ordering;
use core::mem;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Stable reference to a vertex. Resolves until the vertex is removed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VertexHandle(Handle);

impl VertexHandle {
    pub fn id<'a, I, V, IP, VP>(&self, graph: &'a DirectedGraph<I, V, IP, VP>) -> Option<&'a I>
    where
        IP: ElementProtocol<I>,
        VP: ElementProtocol<V>,
    {
        self.0.key(&graph.vertices)
    }

    pub fn value<'a, I, V, IP, VP>(
        &self,
        graph: &'a DirectedGraph<I, V, IP, VP>,
    ) -> Option<&'a V>
    where
        IP: ElementProtocol<I>,
        VP: ElementProtocol<V>,
    {
        self.0.value(&graph.vertices).map(|r| &r.value)
    }
}

pub(crate) struct VertexRecord<V> {
    value: V,
    outgoing: VecDeque<VertexHandle>,
    incoming: VecDeque<VertexHandle>,
}

/// Lifts the caller's value protocol onto whole vertex records: the value
/// goes through `values`, the adjacency deques are plain data.
///
/// The vertex table only creates and destroys records. Ids are its keys, so
/// it never copies, compares or hashes a record; those methods forward to the
/// value protocol to keep the impl total.
#[derive(Clone)]
pub(crate) struct RecordProtocol<VP> {
    values: VP,
}

impl<V, VP> ElementProtocol<VertexRecord<V>> for RecordProtocol<VP>
where
    VP: ElementProtocol<V>,
{
    fn create_default(&self) -> VertexRecord<V> {
        VertexRecord {
            value: self.values.create_default(),
            outgoing: VecDeque::new(),
            incoming: VecDeque::new(),
        }
    }

    fn copy(&self, elem: &VertexRecord<V>) -> VertexRecord<V> {
        VertexRecord {
            value: self.values.copy(&elem.value),
            outgoing: elem.outgoing.clone(),
            incoming: elem.incoming.clone(),
        }
    }

    fn compare(&self, a: &VertexRecord<V>, b: &VertexRecord<V>) -> Ordering {
        self.values.compare(&a.value, &b.value)
    }

    fn hash(&self, elem: &VertexRecord<V>) -> u64 {
        self.values.hash(&elem.value)
    }

    fn destroy(&self, elem: VertexRecord<V>) {
        self.values.destroy(elem.value);
    }
}

/// Ordered handle pair keying the edge index. Independent of the id and
/// value protocols.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct EdgeKey {
    from: VertexHandle,
    to: VertexHandle,
}

enum EdgeIndex<V, VP>
where
    VP: ElementProtocol<V>,
{
    AdjacencyOnly,
    Indexed(HashTable<EdgeKey, V, Natural, VP>),
}

/// One edge as seen from the whole graph: both endpoints with their values.
#[derive(Debug, PartialEq)]
pub struct Connection<'a, I, V> {
    pub from_id: &'a I,
    pub from_value: &'a V,
    pub to_id: &'a I,
    pub to_value: &'a V,
}

/// One indexed edge and its stored value.
#[derive(Debug, PartialEq)]
pub struct Edge<'a, I, V> {
    pub from_id: &'a I,
    pub to_id: &'a I,
    pub value: &'a V,
}

fn unlink(list: &mut VecDeque<VertexHandle>, target: VertexHandle) -> bool {
    match list.iter().position(|&h| h == target) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

pub struct DirectedGraph<I, V, IP = Natural, VP = Natural>
where
    IP: ElementProtocol<I>,
    VP: ElementProtocol<V>,
{
    vertices: HashTable<I, VertexRecord<V>, IP, RecordProtocol<VP>>,
    edges: EdgeIndex<V, VP>,
    edge_count: usize,
}

impl<I, V> DirectedGraph<I, V>
where
    Natural: ElementProtocol<I> + ElementProtocol<V>,
{
    pub fn new() -> Result<Self> {
        Self::with_protocols(Natural::new(), Natural::new())
    }
}

impl<I, V, IP, VP> DirectedGraph<I, V, IP, VP>
where
    IP: ElementProtocol<I>,
    VP: ElementProtocol<V>,
{
    pub fn with_protocols(id_protocol: IP, value_protocol: VP) -> Result<Self> {
        Self::with_config(id_protocol, value_protocol, HashTableConfig::default())
    }

    /// `config` sizes the vertex table; the edge index uses the defaults.
    pub fn with_config(id_protocol: IP, value_protocol: VP, config: HashTableConfig) -> Result<Self> {
        let records = RecordProtocol {
            values: value_protocol,
        };
        Ok(Self {
            vertices: HashTable::with_config(id_protocol, records, config)?,
            edges: EdgeIndex::AdjacencyOnly,
            edge_count: 0,
        })
    }

    fn value_protocol(&self) -> &VP {
        &self.vertices.value_protocol().values
    }

    fn record(&self, h: VertexHandle) -> Option<&VertexRecord<V>> {
        h.0.value(&self.vertices)
    }

    fn record_mut(&mut self, h: VertexHandle) -> Option<&mut VertexRecord<V>> {
        h.0.value_mut(&mut self.vertices)
    }

    pub fn contains(&self, id: &I) -> bool {
        self.vertices.contains(id)
    }

    pub fn find(&self, id: &I) -> Option<VertexHandle> {
        self.vertices.find(id).map(VertexHandle)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.edges, EdgeIndex::Indexed(_))
    }

    /// Create a vertex with a default value. Existing vertices are left
    /// untouched.
    pub fn add(&mut self, id: &I) -> Result<VertexHandle> {
        self.vertices.add(id).map(VertexHandle)
    }

    /// Create the vertex if needed, then store a copy of `value`.
    pub fn set(&mut self, id: &I, value: &V) -> Result<VertexHandle> {
        let h = self.add(id)?;
        let fresh = self.value_protocol().copy(value);
        self.replace_value(h, fresh);
        Ok(h)
    }

    /// Destroy the vertex value and store a default one. No-op for an
    /// absent vertex.
    pub fn reset(&mut self, id: &I) {
        if let Some(h) = self.find(id) {
            let fresh = self.value_protocol().create_default();
            self.replace_value(h, fresh);
        }
    }

    fn replace_value(&mut self, h: VertexHandle, fresh: V) {
        let old = match self.record_mut(h) {
            Some(rec) => mem::replace(&mut rec.value, fresh),
            None => fresh,
        };
        self.value_protocol().destroy(old);
    }

    pub fn vertex_value(&self, id: &I) -> Option<&V> {
        self.vertices.get(id).map(|r| &r.value)
    }

    pub fn vertex_value_mut(&mut self, id: &I) -> Option<&mut V> {
        self.vertices.get_mut(id).map(|r| &mut r.value)
    }

    /// The graph's own copy of `id`.
    pub fn vertex_id(&self, id: &I) -> Option<&I> {
        self.vertices.get_key_value(id).map(|(k, _)| k)
    }

    pub fn out_degree(&self, id: &I) -> usize {
        self.vertices.get(id).map_or(0, |r| r.outgoing.len())
    }

    pub fn in_degree(&self, id: &I) -> usize {
        self.vertices.get(id).map_or(0, |r| r.incoming.len())
    }

    /// Remove a vertex with every incident edge. Returns whether it existed.
    pub fn remove(&mut self, id: &I) -> bool {
        let Some(v) = self.find(id) else {
            return false;
        };
        let (outgoing, incoming) = match self.record_mut(v) {
            Some(rec) => (mem::take(&mut rec.outgoing), mem::take(&mut rec.incoming)),
            None => return false,
        };

        if let EdgeIndex::Indexed(index) = &mut self.edges {
            for &to in &outgoing {
                index.remove(&EdgeKey { from: v, to });
            }
            for &from in &incoming {
                index.remove(&EdgeKey { from, to: v });
            }
        }

        let mut self_loops = 0;
        for &to in &outgoing {
            if to == v {
                self_loops += 1;
            } else if let Some(rec) = self.record_mut(to) {
                unlink(&mut rec.incoming, v);
            }
        }
        for &from in incoming.iter().filter(|&&from| from != v) {
            if let Some(rec) = self.record_mut(from) {
                unlink(&mut rec.outgoing, v);
            }
        }

        let removed_edges = outgoing.len() + incoming.len() - self_loops;
        self.edge_count -= removed_edges;
        debug!(
            out_degree = outgoing.len(),
            in_degree = incoming.len(),
            removed_edges,
            "removed vertex"
        );
        self.vertices.remove(id)
    }

    fn endpoints(&self, from: &I, to: &I) -> GraphResult<(VertexHandle, VertexHandle)> {
        let f = self.find(from).ok_or(GraphError::MissingVertex {
            endpoint: Endpoint::From,
        })?;
        let t = self.find(to).ok_or(GraphError::MissingVertex {
            endpoint: Endpoint::To,
        })?;
        Ok((f, t))
    }

    /// Record an edge `from -> to`. Does not check for an existing edge.
    pub fn connect(&mut self, from: &I, to: &I) -> GraphResult<()> {
        let (f, t) = self.endpoints(from, to)?;
        self.link(f, t)?;
        Ok(())
    }

    fn link(&mut self, from: VertexHandle, to: VertexHandle) -> Result<()> {
        // The index may need to grow, so it goes first.
        if let EdgeIndex::Indexed(index) = &mut self.edges {
            index.add(&EdgeKey { from, to })?;
        }
        if let Some(rec) = self.record_mut(from) {
            rec.outgoing.push_front(to);
        }
        if let Some(rec) = self.record_mut(to) {
            rec.incoming.push_front(from);
        }
        self.edge_count += 1;
        Ok(())
    }

    /// Remove one `from -> to` edge. Returns whether one existed.
    pub fn disconnect(&mut self, from: &I, to: &I) -> GraphResult<bool> {
        let (f, t) = self.endpoints(from, to)?;
        let (removed, parallel_left) = match self.record_mut(f) {
            Some(rec) => {
                let removed = unlink(&mut rec.outgoing, t);
                (removed, rec.outgoing.contains(&t))
            }
            None => (false, false),
        };
        if !removed {
            return Ok(false);
        }
        if let Some(rec) = self.record_mut(t) {
            unlink(&mut rec.incoming, f);
        }
        self.edge_count -= 1;
        if !parallel_left {
            if let EdgeIndex::Indexed(index) = &mut self.edges {
                index.remove(&EdgeKey { from: f, to: t });
            }
        }
        Ok(true)
    }

    /// Whether an edge `from -> to` exists. `false` if either vertex is
    /// missing.
    pub fn adjacent(&self, from: &I, to: &I) -> bool {
        let Ok((f, t)) = self.endpoints(from, to) else {
            return false;
        };
        self.linked(f, t)
    }

    fn linked(&self, from: VertexHandle, to: VertexHandle) -> bool {
        match &self.edges {
            EdgeIndex::Indexed(index) => index.contains(&EdgeKey { from, to }),
            EdgeIndex::AdjacencyOnly => self
                .record(from)
                .map_or(false, |rec| rec.outgoing.contains(&to)),
        }
    }

    /// Iterate `(id, value)` for every vertex.
    pub fn vertices(&self) -> impl Iterator<Item = (&I, &V)> + '_ {
        self.vertices.iter().map(|(id, rec)| (id, &rec.value))
    }

    fn neighbors<'a>(&'a self, list: Option<&'a VecDeque<VertexHandle>>) -> impl Iterator<Item = (&'a I, &'a V)> + 'a {
        list.into_iter().flatten().filter_map(move |&h| {
            let id = h.0.key(&self.vertices)?;
            let rec = h.0.value(&self.vertices)?;
            Some((id, &rec.value))
        })
    }

    /// Ids of the targets of `id`'s outgoing edges. Empty for a missing
    /// vertex.
    pub fn outgoing<'a>(&'a self, id: &I) -> impl Iterator<Item = &'a I> + 'a {
        self.outgoing_pairs(id).map(|(id, _)| id)
    }

    pub fn incoming<'a>(&'a self, id: &I) -> impl Iterator<Item = &'a I> + 'a {
        self.incoming_pairs(id).map(|(id, _)| id)
    }

    /// `(id, vertex value)` of each out-neighbor.
    pub fn outgoing_pairs<'a>(&'a self, id: &I) -> impl Iterator<Item = (&'a I, &'a V)> + 'a {
        self.neighbors(self.vertices.get(id).map(|r| &r.outgoing))
    }

    pub fn incoming_pairs<'a>(&'a self, id: &I) -> impl Iterator<Item = (&'a I, &'a V)> + 'a {
        self.neighbors(self.vertices.get(id).map(|r| &r.incoming))
    }

    /// Every adjacency entry as a [`Connection`]. Parallel edges appear once
    /// per entry.
    pub fn connections(&self) -> impl Iterator<Item = Connection<'_, I, V>> + '_ {
        self.vertices.entries().flat_map(move |(_, from_id, from)| {
            self.neighbors(Some(&from.outgoing))
                .map(move |(to_id, to_value)| Connection {
                    from_id,
                    from_value: &from.value,
                    to_id,
                    to_value,
                })
        })
    }

    /// Detach every edge, keeping the vertices. A materialized index stays
    /// materialized, empty.
    pub fn clear_edges(&mut self) {
        if let EdgeIndex::Indexed(index) = &mut self.edges {
            index.clear();
        }
        for rec in self.vertices.values_mut() {
            rec.outgoing.clear();
            rec.incoming.clear();
        }
        self.edge_count = 0;
    }

    /// Remove every vertex and edge.
    pub fn clear_vertices(&mut self) {
        if let EdgeIndex::Indexed(index) = &mut self.edges {
            index.clear();
        }
        self.vertices.clear();
        self.edge_count = 0;
    }

    /// Check the vertex table, degree bookkeeping, adjacency symmetry and,
    /// once materialized, that the index holds exactly the adjacent pairs.
    pub fn validate(&self) -> core::result::Result<(), InvariantViolation> {
        self.vertices.validate()?;
        let mut out_pairs: BTreeMap<EdgeKey, usize> = BTreeMap::new();
        let mut in_pairs: BTreeMap<EdgeKey, usize> = BTreeMap::new();
        for (h, _, rec) in self.vertices.entries() {
            let h = VertexHandle(h);
            for &to in &rec.outgoing {
                if self.record(to).is_none() {
                    return Err(InvariantViolation::DanglingVertex);
                }
                *out_pairs.entry(EdgeKey { from: h, to }).or_default() += 1;
            }
            for &from in &rec.incoming {
                if self.record(from).is_none() {
                    return Err(InvariantViolation::DanglingVertex);
                }
                *in_pairs.entry(EdgeKey { from, to: h }).or_default() += 1;
            }
        }
        let counted: usize = out_pairs.values().sum();
        if counted != self.edge_count {
            return Err(InvariantViolation::EdgeCountMismatch {
                recorded: self.edge_count,
                counted,
            });
        }
        if out_pairs != in_pairs {
            return Err(InvariantViolation::AdjacencyMismatch);
        }
        if let EdgeIndex::Indexed(index) = &self.edges {
            index.validate()?;
            if index.len() != out_pairs.len()
                || index.keys().any(|k| !out_pairs.contains_key(k))
            {
                return Err(InvariantViolation::EdgeIndexMismatch);
            }
        }
        Ok(())
    }

    fn indexed_edges(&self) -> impl Iterator<Item = Edge<'_, I, V>> + '_ {
        let index = match &self.edges {
            EdgeIndex::Indexed(index) => Some(index),
            EdgeIndex::AdjacencyOnly => None,
        };
        index
            .into_iter()
            .flat_map(|index| index.iter())
            .filter_map(move |(key, value)| {
                Some(Edge {
                    from_id: key.from.id(self)?,
                    to_id: key.to.id(self)?,
                    value,
                })
            })
    }
}

impl<I, V, IP, VP> DirectedGraph<I, V, IP, VP>
where
    IP: ElementProtocol<I>,
    VP: ElementProtocol<V> + Clone,
{
    /// Build the edge index from the adjacency lists, each edge holding a
    /// default value. No-op once materialized.
    pub fn materialize(&mut self) -> Result<()> {
        if self.is_materialized() {
            return Ok(());
        }
        let mut index = HashTable::with_protocols(Natural::new(), self.value_protocol().clone())?;
        for (from, _, rec) in self.vertices.entries() {
            for &to in &rec.outgoing {
                index.add(&EdgeKey {
                    from: VertexHandle(from),
                    to,
                })?;
            }
        }
        debug!(
            edges = self.edge_count,
            indexed = index.len(),
            "materialized edge index"
        );
        self.edges = EdgeIndex::Indexed(index);
        Ok(())
    }

    /// Store a copy of `value` on the edge `from -> to`, connecting the pair
    /// first if needed. Materializes the edge index.
    pub fn assign(&mut self, from: &I, to: &I, value: &V) -> GraphResult<()> {
        let (f, t) = self.endpoints(from, to)?;
        self.materialize()?;
        if !self.linked(f, t) {
            self.link(f, t)?;
        }
        if let EdgeIndex::Indexed(index) = &mut self.edges {
            index.set(&EdgeKey { from: f, to: t }, value)?;
        }
        Ok(())
    }

    /// Reset the value of an indexed edge to the default. Adjacency is left
    /// alone; no-op if the index is absent or the edge is not in it.
    pub fn unassign(&mut self, from: &I, to: &I) -> GraphResult<()> {
        let (f, t) = self.endpoints(from, to)?;
        if let EdgeIndex::Indexed(index) = &mut self.edges {
            index.reset(&EdgeKey { from: f, to: t });
        }
        Ok(())
    }

    /// Value stored on `from -> to`. Materializes the edge index when both
    /// vertices exist. `None` if either vertex is missing or the pair is not
    /// adjacent.
    pub fn edge_value(&mut self, from: &I, to: &I) -> Result<Option<&V>> {
        let Ok((f, t)) = self.endpoints(from, to) else {
            return Ok(None);
        };
        self.materialize()?;
        Ok(match &self.edges {
            EdgeIndex::Indexed(index) => index.get(&EdgeKey { from: f, to: t }),
            EdgeIndex::AdjacencyOnly => None,
        })
    }

    /// Iterate every indexed edge with its value. Materializes the edge
    /// index.
    pub fn edges(&mut self) -> Result<impl Iterator<Item = Edge<'_, I, V>> + '_> {
        self.materialize()?;
        let this: &Self = self;
        Ok(this.indexed_edges())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TotalOrder;
    use std::collections::BTreeSet;

    type Graph = DirectedGraph<char, f64, Natural, TotalOrder>;

    fn graph(vertices: &str, edges: &[(char, char)]) -> Graph {
        let mut g = Graph::with_protocols(Natural::new(), TotalOrder::new()).unwrap();
        for v in vertices.chars() {
            g.add(&v).unwrap();
        }
        for (f, t) in edges {
            g.connect(f, t).unwrap();
        }
        g
    }

    fn edge_set(g: &Graph) -> BTreeSet<(char, char)> {
        g.connections().map(|c| (*c.from_id, *c.to_id)).collect()
    }

    /// Invariant: removing a vertex drops every incident edge from both
    /// endpoints' lists and from the edge count.
    #[test]
    fn scenario_degrees_and_removal() {
        let mut g = graph("ABCD", &[('A', 'B'), ('B', 'C'), ('A', 'C')]);
        assert_eq!(g.out_degree(&'A'), 2);
        assert_eq!(g.in_degree(&'C'), 2);
        assert_eq!(g.edge_count(), 3);

        assert!(g.remove(&'B'));
        assert_eq!(edge_set(&g), BTreeSet::from([('A', 'C')]));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.out_degree(&'A'), 1);
        assert_eq!(g.in_degree(&'C'), 1);
        g.validate().unwrap();
    }

    /// Invariant: unassign resets the edge value but keeps adjacency.
    #[test]
    fn scenario_assign_unassign() {
        let mut g = graph("ABCD", &[('A', 'B'), ('B', 'C'), ('A', 'C')]);
        g.remove(&'B');
        g.assign(&'A', &'C', &5.0).unwrap();
        assert!(g.is_materialized());
        assert_eq!(g.edge_value(&'A', &'C').unwrap(), Some(&5.0));
        assert_eq!(g.edge_count(), 1, "assign on an existing edge adds nothing");

        g.unassign(&'A', &'C').unwrap();
        assert!(g.adjacent(&'A', &'C'));
        assert_eq!(g.edge_value(&'A', &'C').unwrap(), Some(&0.0));
        g.validate().unwrap();
    }

    /// Invariant: assign connects an unconnected pair exactly once.
    #[test]
    fn assign_creates_missing_edge() {
        let mut g = graph("XY", &[]);
        g.assign(&'X', &'Y', &2.5).unwrap();
        g.assign(&'X', &'Y', &3.5).unwrap();
        assert!(g.adjacent(&'X', &'Y'));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edge_value(&'X', &'Y').unwrap(), Some(&3.5));
        assert_eq!(g.edge_value(&'Y', &'X').unwrap(), None);
        g.validate().unwrap();
    }

    /// Invariant: edge operations with a missing endpoint fail before any
    /// state changes.
    #[test]
    fn missing_endpoint_rejected_without_mutation() {
        let mut g = graph("AB", &[('A', 'B')]);
        let missing_from = GraphError::MissingVertex {
            endpoint: Endpoint::From,
        };
        let missing_to = GraphError::MissingVertex {
            endpoint: Endpoint::To,
        };
        assert_eq!(g.connect(&'Z', &'A'), Err(missing_from));
        assert_eq!(g.connect(&'A', &'Z'), Err(missing_to));
        assert_eq!(g.disconnect(&'A', &'Z'), Err(missing_to));
        assert_eq!(g.assign(&'Z', &'B', &1.0), Err(missing_from));
        assert_eq!(g.unassign(&'A', &'Z'), Err(missing_to));
        assert!(!g.is_materialized(), "failed assign must not materialize");
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.vertex_count(), 2);
        assert!(!g.adjacent(&'A', &'Z'));
        assert_eq!(g.out_degree(&'Z'), 0);
        g.validate().unwrap();
    }

    /// Invariant: an edge lookup naming a missing vertex answers `None`
    /// without building the edge index.
    #[test]
    fn edge_value_with_missing_vertex_keeps_index_absent() {
        let mut g = graph("AB", &[('A', 'B')]);
        assert_eq!(g.edge_value(&'A', &'Z').unwrap(), None);
        assert_eq!(g.edge_value(&'Z', &'B').unwrap(), None);
        assert!(!g.is_materialized());

        assert_eq!(g.edge_value(&'A', &'B').unwrap(), Some(&0.0));
        assert!(g.is_materialized());
    }

    /// Invariant: connecting twice records two parallel adjacency entries
    /// but a single index entry, which survives until the last parallel
    /// entry is disconnected.
    #[test]
    fn repeated_connect_is_parallel_adjacency() {
        let mut g = graph("PQ", &[('P', 'Q'), ('P', 'Q')]);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.out_degree(&'P'), 2);
        g.materialize().unwrap();
        assert_eq!(g.edges().unwrap().count(), 1);
        g.validate().unwrap();

        assert!(g.disconnect(&'P', &'Q').unwrap());
        assert!(g.adjacent(&'P', &'Q'));
        assert_eq!(g.edge_count(), 1);
        g.validate().unwrap();

        assert!(g.disconnect(&'P', &'Q').unwrap());
        assert!(!g.adjacent(&'P', &'Q'));
        assert!(!g.disconnect(&'P', &'Q').unwrap(), "nothing left to remove");
        assert_eq!(g.edge_count(), 0);
        g.validate().unwrap();
    }

    /// Invariant: a self-loop counts once when its vertex is removed.
    #[test]
    fn self_loop_removal_counts_once() {
        let mut g = graph("AB", &[('A', 'A'), ('A', 'B'), ('B', 'A')]);
        assert_eq!(g.edge_count(), 3);
        g.materialize().unwrap();
        assert!(g.remove(&'A'));
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.in_degree(&'B'), 0);
        assert_eq!(g.out_degree(&'B'), 0);
        assert_eq!(g.edges().unwrap().count(), 0);
        g.validate().unwrap();
    }

    #[test]
    fn record_protocol_forwards_to_value_protocol() {
        let records = RecordProtocol {
            values: TotalOrder::new(),
        };
        let mut a: VertexRecord<f64> = records.create_default();
        assert_eq!(a.value, 0.0);
        a.value = 2.0;
        a.outgoing.push_front(VertexHandle::default());
        let b = records.copy(&a);
        assert_eq!(b.value, 2.0);
        assert_eq!(b.outgoing.len(), 1);
        assert_eq!(records.compare(&a, &b), Ordering::Equal);
        assert_eq!(records.hash(&a), records.values.hash(&2.0f64));
        records.destroy(b);
    }

    #[test]
    fn vertex_values_set_reset() {
        let mut g = graph("", &[]);
        g.set(&'v', &1.5).unwrap();
        assert_eq!(g.vertex_value(&'v'), Some(&1.5));
        *g.vertex_value_mut(&'v').unwrap() += 1.0;
        assert_eq!(g.vertex_value(&'v'), Some(&2.5));
        g.add(&'v').unwrap();
        assert_eq!(g.vertex_value(&'v'), Some(&2.5), "add keeps the existing value");
        g.reset(&'v');
        assert_eq!(g.vertex_value(&'v'), Some(&0.0));
        g.reset(&'w');
        assert!(!g.contains(&'w'));
        assert_eq!(g.vertex_id(&'v'), Some(&'v'));
        assert!(!g.remove(&'w'));
    }

    #[test]
    fn neighbor_iteration() {
        let mut g = graph("ABC", &[('A', 'B'), ('A', 'C'), ('C', 'A')]);
        g.set(&'B', &2.0).unwrap();
        let out: BTreeSet<char> = g.outgoing(&'A').copied().collect();
        assert_eq!(out, BTreeSet::from(['B', 'C']));
        let inc: Vec<char> = g.incoming(&'A').copied().collect();
        assert_eq!(inc, vec!['C']);
        let pairs: Vec<(char, f64)> = g.outgoing_pairs(&'A').map(|(i, v)| (*i, *v)).collect();
        assert!(pairs.contains(&('B', 2.0)));
        assert_eq!(g.incoming_pairs(&'B').count(), 1);
        assert_eq!(g.outgoing(&'Z').count(), 0);
        assert_eq!(g.vertices().count(), 3);
    }

    /// Invariant: clearing edges keeps vertices and leaves a materialized
    /// index empty; clearing vertices empties everything.
    #[test]
    fn clear_edges_then_vertices() {
        let mut g = graph("ABC", &[('A', 'B'), ('B', 'C')]);
        g.assign(&'A', &'C', &1.0).unwrap();
        g.clear_edges();
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.vertex_count(), 3);
        assert!(g.is_materialized());
        assert!(!g.adjacent(&'A', &'B'));
        g.validate().unwrap();

        g.connect(&'C', &'A').unwrap();
        g.clear_vertices();
        assert_eq!(g.vertex_count(), 0);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.edges().unwrap().count(), 0);
        g.validate().unwrap();
    }
}
