//! A small, dependency-free directed-acyclic-graph container used by
//! `kiln-core` to hold the task dependency DAG.
//!
//! This crate intentionally does not build on `petgraph`: the operations
//! the orchestrator needs (leaf/root predicates, pruning, neighbor tests,
//! descendants/ancestors, cycle detection) are a few hundred lines of
//! adjacency-list bookkeeping, and hand-rolling them keeps the dependency
//! that sits underneath every build graph trivially auditable.
//!
//! # Example
//!
//! ```
//! use kiln_graph::Graph;
//!
//! let mut g = Graph::new();
//! let a = g.add_node("a");
//! let b = g.add_node("b");
//! g.add_edge(b, a).unwrap(); // b depends on a
//! assert!(g.is_leaf(a));
//! assert!(!g.is_leaf(b));
//! assert!(kiln_graph::is_dag(&g));
//! ```

mod error;
mod graph;
mod traversal;
mod validation;

pub use error::{Error, Result};
pub use graph::{Graph, NodeId};
pub use traversal::{ancestors, descendants};
pub use validation::{find_cycle, is_dag};
