//! Error types shared by the containers.
//!
//! Absent keys are never errors: `get`/`remove`/`reset` on a missing key are
//! silent no-ops. Only allocation, capacity and configuration problems (and
//! graph endpoint preconditions) are reported.

use thiserror::Error;

/// Failures reported by table construction, insertion and rehashing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("failed to allocate {requested} slots")]
    AllocationFailure { requested: usize },

    #[error("capacity {requested} cannot hold the current entries (need at least {required})")]
    CapacityTooSmall { requested: usize, required: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Which endpoint of an edge operation was not a member vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    From,
    To,
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Endpoint::From => f.write_str("source"),
            Endpoint::To => f.write_str("target"),
        }
    }
}

/// Errors from graph operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// An edge operation named a vertex that is not in the graph. Raised
    /// before any state is touched.
    #[error("{endpoint} vertex is not a member of the graph")]
    MissingVertex { endpoint: Endpoint },

    #[error(transparent)]
    Table(#[from] Error),
}

pub type GraphResult<T> = core::result::Result<T, GraphError>;

/// A broken structural invariant found by a container's `validate()`.
///
/// These should never be observable through the public API; they exist so
/// tests can assert the invariants after every mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("size {size} exceeds occupied count {occupied}")]
    SizeExceedsOccupied { size: usize, occupied: usize },

    #[error("occupied count {occupied} exceeds capacity {capacity}")]
    OccupiedExceedsCapacity { occupied: usize, capacity: usize },

    #[error("slot accounting mismatch: {0}")]
    SlotAccounting(&'static str),

    #[error("two occupied slots hold equal keys")]
    DuplicateKey,

    #[error("entry is not reachable along its probe sequence")]
    UnreachableEntry,

    #[error("root node is red")]
    RedRoot,

    #[error("red node has a red child")]
    RedRed,

    #[error("black height differs between paths")]
    BlackHeight,

    #[error("in-order traversal is not strictly increasing")]
    Ordering,

    #[error("recorded length {recorded} differs from node count {counted}")]
    LengthMismatch { recorded: usize, counted: usize },

    #[error("edge count {recorded} differs from total out-degree {counted}")]
    EdgeCountMismatch { recorded: usize, counted: usize },

    #[error("adjacency lists disagree between endpoints")]
    AdjacencyMismatch,

    #[error("adjacency list references a removed vertex")]
    DanglingVertex,

    #[error("edge index is out of sync with adjacency lists")]
    EdgeIndexMismatch,
}
