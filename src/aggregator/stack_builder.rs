//! Build collapsed stack format from a dominator tree.
//!
//! Collapsed stacks are the input format for flamegraph generation.
//! Format: "parent;child;grandchild weight"
//!
//! Example: "process;gc_handle cache;Dictionary;Entry[] 4096"
//! This means: the handle's dictionary retains an entry array whose own
//! size is 4096 bytes. Stack frames follow dominator edges, not references,
//! so each byte is counted exactly once.

use crate::dominance::DominatorTree;
use crate::graph::{HeapGraph, NodeIndex};
use log::debug;
use std::collections::HashMap;

/// A single collapsed stack entry
///
/// **Public** - used by flamegraph generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedStack {
    /// Stack trace as semicolon-separated string
    pub stack: String,

    /// Weight (own bytes of the nodes folded into this stack)
    pub weight: u64,
}

impl CollapsedStack {
    /// Create a new collapsed stack
    ///
    /// **Public** - constructor
    pub fn new(stack: String, weight: u64) -> Self {
        Self { stack, weight }
    }

    /// Render as a line of collapsed-stack text
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Build collapsed stacks from a dominator tree
///
/// **Public** - main entry point for stack building
///
/// # Arguments
/// * `tree` - Dominator tree to flatten
/// * `max_depth` - Frames deeper than this are folded into their ancestor
///
/// # Returns
/// Vector of collapsed stacks, one per unique label path, heaviest first
///
/// # Algorithm
/// 1. Walk the dominator tree depth-first with an explicit stack
/// 2. Keep the label path of the current node
/// 3. Add each node's exclusive bytes to its path
/// 4. Aggregate by unique path (sum weights)
pub fn build_dominator_stacks<G: HeapGraph + ?Sized>(
    tree: &DominatorTree<'_, G>,
    max_depth: usize,
) -> Vec<CollapsedStack> {
    let graph = tree.graph();
    let max_depth = max_depth.max(1);
    debug!(
        "Building collapsed stacks from {} reachable nodes",
        tree.reachable_count()
    );

    // Map to aggregate stacks: stack_string -> total_weight
    let mut stack_map: HashMap<String, u64> = HashMap::new();

    let mut frames: Vec<(NodeIndex, usize)> = vec![(tree.root(), 0)];
    let mut path: Vec<String> = Vec::new();

    while let Some((node, depth)) = frames.pop() {
        // Past max_depth the path still holds the folded ancestor chain
        if depth < max_depth {
            path.truncate(depth);
            path.push(frame_label(graph, node));
        }

        let weight = tree.exclusive_size(node);
        if weight > 0 {
            *stack_map.entry(path.join(";")).or_insert(0) += weight;
        }

        for &child in tree.children(node) {
            frames.push((child, depth + 1));
        }
    }

    // Convert map to vector and sort by weight (descending)
    let mut stacks: Vec<CollapsedStack> = stack_map
        .into_iter()
        .map(|(stack, weight)| CollapsedStack::new(stack, weight))
        .collect();

    stacks.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.stack.cmp(&b.stack)));

    debug!("Built {} unique collapsed stacks", stacks.len());

    stacks
}

/// Label of one frame; separators inside names would split the frame
fn frame_label<G: HeapGraph + ?Sized>(graph: &G, node: NodeIndex) -> String {
    graph.label(node).replace(';', ":")
}
