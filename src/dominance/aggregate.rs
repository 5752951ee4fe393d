//! Type-filtered sizes over an existing dominator tree.
//!
//! A node's own bytes count once the node or one of its dominators has a
//! selected type. Everything below the first match is attributed to it,
//! whatever its own type.

use super::tree::DominatorTree;
use crate::graph::{HeapGraph, NodeIndex};
use crate::heap::TypeIndex;
use log::debug;

/// Filtered exclusive/inclusive sizes
///
/// **Public** - borrows the tree, owns only size vectors
#[derive(Debug)]
pub struct SizeAggregator<'t, 'g, G: HeapGraph + ?Sized> {
    tree: &'t DominatorTree<'g, G>,
    exclusive: Vec<u64>,
    inclusive: Vec<u64>,
    matched: usize,
}

impl<'t, 'g, G: HeapGraph + ?Sized> SizeAggregator<'t, 'g, G> {
    /// Re-aggregate sizes keeping only subtrees rooted at a selected type
    pub fn new<F>(tree: &'t DominatorTree<'g, G>, selects: F) -> Self
    where
        F: Fn(TypeIndex) -> bool,
    {
        let graph = tree.graph();
        let node_count = tree.node_count();
        let root = tree.root();

        // Dominators have higher indices, so walking down visits every
        // parent before its children
        let mut selected = vec![false; node_count];
        let mut matched = 0;
        for node in (0..node_count).rev() {
            let Some(dominator) = tree.dominator(node) else {
                continue;
            };
            let own = graph.type_of(node).is_some_and(&selects);
            if own {
                matched += 1;
            }
            selected[node] = own || (node != root && selected[dominator]);
        }

        let exclusive: Vec<u64> = (0..node_count)
            .map(|n| if selected[n] { tree.exclusive_size(n) } else { 0 })
            .collect();
        let mut inclusive = exclusive.clone();
        for node in 0..root {
            if let Some(dominator) = tree.dominator(node) {
                inclusive[dominator] += inclusive[node];
            }
        }

        debug!(
            "Type filter matched {} nodes, {} bytes attributed",
            matched, inclusive[root]
        );

        Self {
            tree,
            exclusive,
            inclusive,
            matched,
        }
    }

    /// Sizes attributable to a single type
    pub fn for_type(tree: &'t DominatorTree<'g, G>, type_index: TypeIndex) -> Self {
        Self::new(tree, |t| t == type_index)
    }

    /// Sizes attributable to the type called `name`
    ///
    /// `None` when no live object in the tree's graph has that type.
    pub fn for_type_name(tree: &'t DominatorTree<'g, G>, name: &str) -> Option<Self> {
        let type_index = tree.graph().find_type(name)?;
        Some(Self::for_type(tree, type_index))
    }

    pub fn tree(&self) -> &'t DominatorTree<'g, G> {
        self.tree
    }

    pub fn exclusive_size(&self, node: NodeIndex) -> u64 {
        self.exclusive[node]
    }

    pub fn inclusive_size(&self, node: NodeIndex) -> u64 {
        self.inclusive[node]
    }

    /// Bytes attributed to the selection across the whole tree
    pub fn total(&self) -> u64 {
        self.inclusive[self.tree.root()]
    }

    /// Number of nodes whose own type was selected
    pub fn matched_count(&self) -> usize {
        self.matched
    }
}
