//! Retention paths: why is this node alive?

use super::model::{HeapGraph, NodeIndex};
use std::collections::VecDeque;

const UNVISITED: NodeIndex = NodeIndex::MAX;

/// A distinct referrer of a node with the number of edges it contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referrer {
    pub node: NodeIndex,
    /// How many fields of `node` point at the target
    pub edges: usize,
}

/// Distinct referrers of `node`, in first-seen order
pub fn referrers<G: HeapGraph + ?Sized>(graph: &G, node: NodeIndex) -> Vec<Referrer> {
    let mut result: Vec<Referrer> = Vec::new();
    for &pred in graph.predecessors(node) {
        match result.iter_mut().find(|r| r.node == pred) {
            Some(existing) => existing.edges += 1,
            None => result.push(Referrer {
                node: pred,
                edges: 1,
            }),
        }
    }
    result
}

/// Shortest chain of referrers from `node` up to the process node
///
/// The returned path starts at `node` and ends at the process node.
/// `None` means the node cannot be reached from the process node.
pub fn shortest_path_to_process<G: HeapGraph + ?Sized>(
    graph: &G,
    node: NodeIndex,
) -> Option<Vec<NodeIndex>> {
    let process = graph.process_node();
    if node == process {
        return Some(vec![process]);
    }

    // next_hop[p] = the node (closer to `node`) that p was reached from
    let mut next_hop = vec![UNVISITED; graph.node_count()];
    let mut queue = VecDeque::new();
    next_hop[node] = node;
    queue.push_back(node);

    while let Some(current) = queue.pop_front() {
        for &pred in graph.predecessors(current) {
            if next_hop[pred] != UNVISITED {
                continue;
            }
            next_hop[pred] = current;
            if pred == process {
                let mut path = vec![process];
                let mut step = current;
                while step != node {
                    path.push(step);
                    step = next_hop[step];
                }
                path.push(node);
                path.reverse();
                return Some(path);
            }
            queue.push_back(pred);
        }
    }
    None
}
