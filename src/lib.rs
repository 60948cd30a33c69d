//! protocol-collections: a hash table, an ordered set and a directed graph
//! whose element behavior comes from per-instance protocol values instead of
//! trait bounds on the element type.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: containers that never assume anything about their elements.
//!   Every construct, copy, compare, hash and release goes through an
//!   [`ElementProtocol`] value owned by the container.
//! - Layers:
//!   - HashTable<K, V, KP, VP>: open addressing with quadratic probing,
//!     tombstones and load-factor driven growth. Entries live in a
//!     generational arena and slots hold handles, so a [`Handle`] stays
//!     valid across rehash.
//!   - OrderedSet<T, P>: red-black tree with top-down recursive insert and
//!     delete fix-up; no parent pointers.
//!   - DirectedGraph<I, V, IP, VP>: vertices in a HashTable, edges in
//!     per-vertex adjacency deques, and an edge-value index materialized on
//!     first demand.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (marker inside the reentrancy
//!   tracker).
//! - Ownership: each container stores only the results of
//!   `ElementProtocol::copy` and destroys each stored copy exactly once.
//! - Absent keys are no-ops, never errors. Allocation failures while sizing
//!   a table surface as [`Error`]; graph edge operations on a missing vertex
//!   surface as [`GraphError::MissingVertex`] before any mutation.
//!
//! Reentrancy policy
//! - HashTable holds a debug-only guard while it probes (the only place it
//!   runs `compare`/`hash`). OrderedSet holds it while a mutation has the
//!   root detached. A protocol callback that re-enters the same container in
//!   those windows panics in debug builds; release builds compile the check
//!   away.
//!
//! Hashing and rehashing invariants
//! - Each entry stores the hash computed at insertion; rehash replays the
//!   stored hashes and never calls the key protocol.
//! - If a key's quadratic probe sequence has no free slot, the table grows
//!   and retries, so insertion always succeeds short of allocation failure.
//!
//! Diagnostics
//! - `validate()` on every container checks its structural invariants and
//!   reports an [`InvariantViolation`]; tests call it after each mutation.
//! - `tracing` events at `debug` level mark rehash, growth, edge-index
//!   materialization and vertex removal cascades.

pub mod error;
pub mod graph;
mod graph_proptest;
pub mod hash_table;
mod hash_table_proptest;
pub mod ordered_set;
mod ordered_set_proptest;
pub mod protocol;
mod reentrancy;

// Public surface
pub use error::{Endpoint, Error, GraphError, GraphResult, InvariantViolation, Result};
pub use graph::{Connection, DirectedGraph, Edge, VertexHandle};
pub use hash_table::{Handle, HashTable, HashTableConfig};
pub use ordered_set::OrderedSet;
pub use protocol::{ElementProtocol, Natural, OrderBy, Shallow, TotalOrder};
