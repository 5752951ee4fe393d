//! Immediate dominators by iterative fixpoint.
//!
//! Cooper, Harvey and Kennedy's "A Simple, Fast Dominance Algorithm",
//! specialised to graphs numbered so that the entry node has the highest
//! index and every dominator has a higher index than the nodes it
//! dominates. Under that numbering the finger walk in [`intersect`] only
//! ever moves towards larger indices, and a pass in decreasing index order
//! sees every node after at least one of its discovering referrers.

use crate::graph::{HeapGraph, NodeIndex};
use log::{debug, info};

/// Marker for "no dominator known"
const UNKNOWN: NodeIndex = NodeIndex::MAX;

/// Dominator tree over a borrowed graph
///
/// **Public** - built once, read-only afterwards
#[derive(Debug)]
pub struct DominatorTree<'g, G: HeapGraph + ?Sized> {
    graph: &'g G,
    root: NodeIndex,
    idom: Vec<NodeIndex>,
    /// `children[child_offsets[n]..child_offsets[n + 1]]` are dominated by `n`
    child_offsets: Vec<usize>,
    children: Vec<NodeIndex>,
    exclusive: Vec<u64>,
    inclusive: Vec<u64>,
    passes: usize,
    reachable: usize,
}

impl<'g, G: HeapGraph + ?Sized> DominatorTree<'g, G> {
    /// Compute immediate dominators, the tree adjacency and sizes
    ///
    /// **Public** - main entry point
    ///
    /// # Panics
    /// * If the graph is empty or its process node is not the last index
    /// * If a dominator does not have a higher index than a node it
    ///   dominates (the graph's numbering is not a valid postorder)
    pub fn build(graph: &'g G) -> Self {
        let node_count = graph.node_count();
        assert!(node_count > 0, "cannot build a dominator tree of an empty graph");
        let root = graph.process_node();
        assert_eq!(
            root,
            node_count - 1,
            "process node must be the highest node index"
        );

        let mut idom = vec![UNKNOWN; node_count];
        idom[root] = root;

        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;

            for node in (0..root).rev() {
                let mut candidate = UNKNOWN;
                for &pred in graph.predecessors(node) {
                    if idom[pred] == UNKNOWN {
                        continue;
                    }
                    candidate = if candidate == UNKNOWN {
                        pred
                    } else {
                        intersect(&idom, pred, candidate)
                    };
                }

                if candidate != UNKNOWN && idom[node] != candidate {
                    idom[node] = candidate;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }
        debug!("Dominators converged after {} passes", passes);

        // Verify the ordering the finger walk relies on
        for (node, &dominator) in idom.iter().enumerate().take(root) {
            assert!(
                dominator == UNKNOWN || dominator > node,
                "dominator {} of node {} does not have a higher index",
                dominator,
                node
            );
        }

        let mut counts = vec![0usize; node_count];
        for &dominator in idom.iter().take(root) {
            if dominator != UNKNOWN {
                counts[dominator] += 1;
            }
        }
        let mut child_offsets = Vec::with_capacity(node_count + 1);
        child_offsets.push(0);
        for count in &counts {
            let last = child_offsets[child_offsets.len() - 1];
            child_offsets.push(last + count);
        }
        let mut cursor = child_offsets[..node_count].to_vec();
        let mut children = vec![0; child_offsets[node_count]];
        for (node, &dominator) in idom.iter().enumerate().take(root) {
            if dominator != UNKNOWN {
                children[cursor[dominator]] = node;
                cursor[dominator] += 1;
            }
        }

        // Children always precede their dominator, so one ascending pass
        // folds every subtree into its parent
        let mut exclusive = vec![0u64; node_count];
        let mut reachable = 0;
        for node in 0..node_count {
            if idom[node] != UNKNOWN {
                exclusive[node] = graph.exclusive_size(node);
                reachable += 1;
            }
        }
        let mut inclusive = exclusive.clone();
        for node in 0..root {
            let dominator = idom[node];
            if dominator != UNKNOWN {
                inclusive[dominator] += inclusive[node];
            }
        }

        info!(
            "Dominator tree: {} of {} nodes reachable, {} bytes retained",
            reachable, node_count, inclusive[root]
        );

        Self {
            graph,
            root,
            idom,
            child_offsets,
            children,
            exclusive,
            inclusive,
            passes,
            reachable,
        }
    }

    pub fn graph(&self) -> &'g G {
        self.graph
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.idom.len()
    }

    /// Immediate dominator of `node`
    ///
    /// The root is its own dominator. `None` means the node is not
    /// reachable from the root.
    ///
    /// # Panics
    /// If `node` is out of range.
    pub fn dominator(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.check(node);
        let dominator = self.idom[node];
        (dominator != UNKNOWN).then_some(dominator)
    }

    pub fn is_reachable(&self, node: NodeIndex) -> bool {
        self.dominator(node).is_some()
    }

    /// Nodes immediately dominated by `node`, in ascending order
    pub fn children(&self, node: NodeIndex) -> &[NodeIndex] {
        self.check(node);
        &self.children[self.child_offsets[node]..self.child_offsets[node + 1]]
    }

    /// Own size of `node` (0 when unreachable)
    pub fn exclusive_size(&self, node: NodeIndex) -> u64 {
        self.check(node);
        self.exclusive[node]
    }

    /// Own size plus everything `node` exclusively retains
    pub fn inclusive_size(&self, node: NodeIndex) -> u64 {
        self.check(node);
        self.inclusive[node]
    }

    /// Total reachable bytes
    pub fn total_size(&self) -> u64 {
        self.inclusive[self.root]
    }

    /// `node`, its dominator, its dominator's dominator, ... up to the root
    ///
    /// Empty for unreachable nodes.
    pub fn dominator_chain(&self, node: NodeIndex) -> DominatorChain<'_> {
        self.check(node);
        DominatorChain {
            idom: &self.idom,
            next: (self.idom[node] != UNKNOWN).then_some(node),
        }
    }

    /// Number of fixpoint passes it took to converge
    pub fn pass_count(&self) -> usize {
        self.passes
    }

    pub fn reachable_count(&self) -> usize {
        self.reachable
    }

    #[inline]
    fn check(&self, node: NodeIndex) {
        assert!(
            node < self.idom.len(),
            "node index {} out of range (0..{})",
            node,
            self.idom.len()
        );
    }
}

/// Walk both fingers up until they meet
///
/// # Panics
/// If a step would not move to a higher index.
fn intersect(idom: &[NodeIndex], mut a: NodeIndex, mut b: NodeIndex) -> NodeIndex {
    while a != b {
        while a < b {
            a = step_up(idom, a);
        }
        while b < a {
            b = step_up(idom, b);
        }
    }
    a
}

#[inline]
fn step_up(idom: &[NodeIndex], node: NodeIndex) -> NodeIndex {
    let next = idom[node];
    assert!(
        next != UNKNOWN && next > node,
        "dominator walk from node {} does not move to a higher index",
        node
    );
    next
}

/// Iterator over a dominator chain
#[derive(Debug, Clone)]
pub struct DominatorChain<'a> {
    idom: &'a [NodeIndex],
    next: Option<NodeIndex>,
}

impl Iterator for DominatorChain<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.next?;
        let parent = self.idom[current];
        self.next = (parent != current).then_some(parent);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::heap::TypeIndex;

    /// Hand-numbered graph for exercising the algorithm directly
    struct TestGraph {
        preds: Vec<Vec<NodeIndex>>,
        sizes: Vec<u64>,
    }

    impl HeapGraph for TestGraph {
        fn node_count(&self) -> usize {
            self.preds.len()
        }

        fn predecessors(&self, node: NodeIndex) -> &[NodeIndex] {
            &self.preds[node]
        }

        fn kind(&self, node: NodeIndex) -> NodeKind {
            if node == self.preds.len() - 1 {
                NodeKind::Process
            } else {
                NodeKind::Object(node as u32)
            }
        }

        fn exclusive_size(&self, node: NodeIndex) -> u64 {
            self.sizes[node]
        }

        fn type_of(&self, _node: NodeIndex) -> Option<TypeIndex> {
            None
        }

        fn type_name(&self, _type_index: TypeIndex) -> Option<&str> {
            None
        }

        fn describe(&self, node: NodeIndex) -> String {
            format!("n{}", node)
        }
    }

    #[test]
    fn test_diamond() {
        // 4 -> 3, 3 -> 2, 3 -> 1, 2 -> 0, 1 -> 0
        let graph = TestGraph {
            preds: vec![vec![2, 1], vec![3], vec![3], vec![4], vec![]],
            sizes: vec![1, 2, 4, 8, 0],
        };
        let tree = DominatorTree::build(&graph);

        assert_eq!(tree.dominator(0), Some(3));
        assert_eq!(tree.dominator(1), Some(3));
        assert_eq!(tree.dominator(2), Some(3));
        assert_eq!(tree.dominator(3), Some(4));
        assert_eq!(tree.dominator(4), Some(4));
        assert_eq!(tree.children(3), &[0, 1, 2]);

        assert_eq!(tree.inclusive_size(3), 15);
        assert_eq!(tree.inclusive_size(2), 4);
        assert_eq!(tree.total_size(), 15);
        assert_eq!(tree.dominator_chain(0).collect::<Vec<_>>(), vec![0, 3, 4]);
    }

    #[test]
    fn test_unreachable_node_has_no_dominator() {
        // Node 1 has no predecessors at all
        let graph = TestGraph {
            preds: vec![vec![2], vec![], vec![]],
            sizes: vec![5, 7, 0],
        };
        let tree = DominatorTree::build(&graph);

        assert_eq!(tree.dominator(1), None);
        assert!(!tree.is_reachable(1));
        assert_eq!(tree.inclusive_size(1), 0);
        assert_eq!(tree.total_size(), 5);
        assert_eq!(tree.dominator_chain(1).count(), 0);
        assert_eq!(tree.reachable_count(), 2);
    }

    #[test]
    fn test_cycle_with_cross_edge() {
        // 5 is the root; 4 -> 3 -> 2 -> 1 -> 3 (back edge), 4 -> 0, 1 -> 0
        let graph = TestGraph {
            preds: vec![vec![4, 1], vec![2], vec![3], vec![4, 1], vec![5], vec![]],
            sizes: vec![1, 1, 1, 1, 1, 0],
        };
        let tree = DominatorTree::build(&graph);

        assert_eq!(tree.dominator(3), Some(4));
        assert_eq!(tree.dominator(2), Some(3));
        assert_eq!(tree.dominator(1), Some(2));
        assert_eq!(tree.dominator(0), Some(4));
        assert_eq!(tree.inclusive_size(4), 5);

        let total: u64 = (0..6).map(|n| tree.exclusive_size(n)).sum();
        assert_eq!(tree.total_size(), total);
        for n in 0..6 {
            assert!(tree.inclusive_size(n) >= tree.exclusive_size(n));
        }
    }

    #[test]
    #[should_panic(expected = "higher index")]
    fn test_bad_numbering_is_rejected() {
        // 2 -> 0 -> 1: node 1 is dominated by the lower-numbered node 0
        let graph = TestGraph {
            preds: vec![vec![2], vec![0], vec![]],
            sizes: vec![1, 1, 0],
        };
        DominatorTree::build(&graph);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_query_panics() {
        let graph = TestGraph {
            preds: vec![vec![]],
            sizes: vec![0],
        };
        let tree = DominatorTree::build(&graph);
        tree.dominator(3);
    }
}
