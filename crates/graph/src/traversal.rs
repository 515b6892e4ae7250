//! Iterative DFS traversals over a [`Graph`], kept free of recursion so
//! deep dependency chains never blow the stack.

use crate::graph::{Graph, NodeId};
use std::collections::HashSet;

/// Every node reachable from `start` by following dependency edges
/// (`start` itself is excluded).
pub fn descendants<T>(graph: &Graph<T>, start: NodeId) -> HashSet<NodeId> {
    reachable(start, |id| graph.child_ids(id).iter().copied())
}

/// Every node that can reach `start` by following dependency edges, i.e.
/// every node that (transitively) depends on it. `start` itself is excluded.
pub fn ancestors<T>(graph: &Graph<T>, start: NodeId) -> HashSet<NodeId> {
    reachable(start, |id| graph.parent_ids(id).iter().copied())
}

fn reachable<I>(start: NodeId, mut neighbors: impl FnMut(NodeId) -> I) -> HashSet<NodeId>
where
    I: IntoIterator<Item = NodeId>,
{
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        for next in neighbors(id) {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}
