//! Cycle detection via a coloring iterative DFS.

use crate::graph::{Graph, NodeId};
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Returns the node ids forming a cycle, in traversal order and closed
/// (first id repeated at the end), or `None` if the graph is a DAG.
pub fn find_cycle<T>(graph: &Graph<T>) -> Option<Vec<NodeId>> {
    let mut color: HashMap<NodeId, Color> = HashMap::new();
    for id in graph.node_ids() {
        color.entry(id).or_insert(Color::White);
    }

    for start in graph.node_ids() {
        if color.get(&start).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }
        // Explicit stack of (node, child-iterator-position) to avoid recursion.
        let mut path: Vec<NodeId> = Vec::new();
        let mut stack: Vec<(NodeId, std::vec::IntoIter<NodeId>)> =
            vec![(start, graph.child_ids(start).iter().copied().collect::<Vec<_>>().into_iter())];
        color.insert(start, Color::Gray);
        path.push(start);

        while let Some((node, iter)) = stack.last_mut() {
            match iter.next() {
                Some(next) => match color.get(&next).copied().unwrap_or(Color::White) {
                    Color::White => {
                        color.insert(next, Color::Gray);
                        path.push(next);
                        stack.push((
                            next,
                            graph.child_ids(next).iter().copied().collect::<Vec<_>>().into_iter(),
                        ));
                    }
                    Color::Gray => {
                        let pos = path.iter().position(|&n| n == next).unwrap_or(0);
                        let mut witness = path[pos..].to_vec();
                        witness.push(next);
                        return Some(witness);
                    }
                    Color::Black => {}
                },
                None => {
                    color.insert(*node, Color::Black);
                    path.pop();
                    stack.pop();
                }
            }
        }
    }
    None
}

/// True if the graph has no cycles.
#[must_use]
pub fn is_dag<T>(graph: &Graph<T>) -> bool {
    find_cycle(graph).is_none()
}
