//! Error types for the kiln DAG.

use thiserror::Error;

/// Errors produced by graph construction and traversal.
#[derive(Debug, Error)]
pub enum Error {
    /// `add_edge`/`remove_node`/lookup referenced a node id that is not live
    /// in the graph (never inserted, or already removed).
    #[error("unknown graph node: {0:?}")]
    UnknownNode(crate::NodeId),

    /// The edge set closes a cycle. `witness` lists the node ids of the
    /// cycle in traversal order, starting and ending at the same node.
    #[error("cycle detected in task graph: {witness:?}")]
    CycleDetected {
        /// Node ids forming the cycle, in order.
        witness: Vec<crate::NodeId>,
    },
}

/// Convenience alias for fallible graph operations.
pub type Result<T> = std::result::Result<T, Error>;
