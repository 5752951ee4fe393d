//! Calculate retention metrics from a dominator tree.
//!
//! Top retainers are the nodes whose collection would free the most
//! memory. These are the primary targets when hunting a leak.

use crate::dominance::DominatorTree;
use crate::graph::{HeapGraph, NodeIndex, NodeKind};
use crate::heap::TypeIndex;
use crate::output::schema::{Retainer, TypeRetention};
use log::debug;
use std::collections::HashMap;

/// Calculate the top retainers of a dominator tree
///
/// **Public** - main entry point for metrics calculation
///
/// # Arguments
/// * `tree` - Dominator tree to rank
/// * `top_n` - Number of retainers to return
///
/// # Returns
/// Reachable nodes other than the process node, sorted by retained bytes
/// (descending, ties by node index)
pub fn top_retainers<G: HeapGraph + ?Sized>(
    tree: &DominatorTree<'_, G>,
    top_n: usize,
) -> Vec<Retainer> {
    debug!(
        "Ranking top {} retainers among {} reachable nodes",
        top_n,
        tree.reachable_count()
    );

    let root = tree.root();
    let mut nodes: Vec<NodeIndex> = (0..root).filter(|&n| tree.is_reachable(n)).collect();
    nodes.sort_by(|&a, &b| {
        tree.inclusive_size(b)
            .cmp(&tree.inclusive_size(a))
            .then(a.cmp(&b))
    });

    nodes
        .into_iter()
        .take(top_n)
        .map(|node| create_retainer(tree, node))
        .collect()
}

/// Create a Retainer entry for one node
///
/// **Public** - also used for backtrace output
pub fn create_retainer<G: HeapGraph + ?Sized>(
    tree: &DominatorTree<'_, G>,
    node: NodeIndex,
) -> Retainer {
    let graph = tree.graph();
    let total = tree.total_size();
    let inclusive = tree.inclusive_size(node);

    Retainer {
        node,
        kind: graph.kind(node).name().to_string(),
        description: graph.describe(node),
        exclusive_bytes: tree.exclusive_size(node),
        inclusive_bytes: inclusive,
        percentage: percentage_of(inclusive, total),
    }
}

/// Per-type instance counts, own bytes and retained bytes
///
/// **Public** - "which types hold the memory"
///
/// Retained bytes of a type only count instances that have no dominator
/// of the same type, so nested instances (a list node retaining the next
/// list node) are not counted twice. The walk uses an explicit stack with
/// enter/exit entries and a per-type count of open ancestors.
pub fn retained_by_type<G: HeapGraph + ?Sized>(tree: &DominatorTree<'_, G>) -> Vec<TypeRetention> {
    #[derive(Default)]
    struct Totals {
        count: usize,
        exclusive: u64,
        retained: u64,
    }

    enum Step {
        Enter(NodeIndex),
        Exit(TypeIndex),
    }

    let graph = tree.graph();
    let mut totals: HashMap<TypeIndex, Totals> = HashMap::new();
    let mut open: HashMap<TypeIndex, u32> = HashMap::new();
    let mut stack = vec![Step::Enter(tree.root())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) => {
                if let Some(type_index) = graph.type_of(node) {
                    let entry = totals.entry(type_index).or_default();
                    entry.count += 1;
                    entry.exclusive += tree.exclusive_size(node);

                    let depth = open.entry(type_index).or_insert(0);
                    if *depth == 0 {
                        entry.retained += tree.inclusive_size(node);
                    }
                    *depth += 1;
                    stack.push(Step::Exit(type_index));
                }
                for &child in tree.children(node) {
                    stack.push(Step::Enter(child));
                }
            }
            Step::Exit(type_index) => {
                if let Some(depth) = open.get_mut(&type_index) {
                    *depth -= 1;
                }
            }
        }
    }

    let mut result: Vec<TypeRetention> = totals
        .into_iter()
        .map(|(type_index, t)| TypeRetention {
            type_name: graph
                .type_name(type_index)
                .unwrap_or("<unknown type>")
                .to_string(),
            count: t.count,
            exclusive_bytes: t.exclusive,
            retained_bytes: t.retained,
        })
        .collect();

    result.sort_by(|a, b| {
        b.retained_bytes
            .cmp(&a.retained_bytes)
            .then_with(|| a.type_name.cmp(&b.type_name))
    });

    debug!("Computed retention for {} types", result.len());
    result
}

/// Retained bytes per group node (class, namespace, assembly)
///
/// **Public** - only meaningful on a grouped graph; empty otherwise
pub fn group_retention<G: HeapGraph + ?Sized>(tree: &DominatorTree<'_, G>) -> Vec<Retainer> {
    let mut groups: Vec<Retainer> = (0..tree.root())
        .filter(|&n| tree.is_reachable(n) && tree.graph().kind(n).is_group())
        .map(|n| create_retainer(tree, n))
        .collect();
    groups.sort_by(|a, b| b.inclusive_bytes.cmp(&a.inclusive_bytes));
    groups
}

/// Calculate size distribution statistics
///
/// **Public** - provides summary statistics
pub fn calculate_size_distribution<G: HeapGraph + ?Sized>(
    tree: &DominatorTree<'_, G>,
) -> SizeDistribution {
    let graph = tree.graph();
    let mut sizes: Vec<u64> = (0..tree.node_count())
        .filter(|&n| tree.is_reachable(n) && matches!(graph.kind(n), NodeKind::Object(_)))
        .map(|n| tree.exclusive_size(n))
        .collect();

    if sizes.is_empty() {
        return SizeDistribution::default();
    }

    let total: u64 = sizes.iter().sum();
    let count = sizes.len();
    let mean = total / count as u64;

    sizes.sort_unstable_by(|a, b| b.cmp(a));
    let median = sizes[sizes.len() / 2];

    // Largest 10% of objects
    let top_10_percent_count = (count as f64 * 0.1).ceil() as usize;
    let top_10_percent_bytes: u64 = sizes.iter().take(top_10_percent_count).sum();

    SizeDistribution {
        total_bytes: total,
        object_count: count,
        mean_object_size: mean,
        median_object_size: median,
        top_10_percent_bytes,
        top_10_percent_percentage: percentage_of(top_10_percent_bytes, total),
    }
}

fn percentage_of(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Object size distribution statistics
///
/// **Public** - returned from calculate_size_distribution
#[derive(Debug, Clone, Default)]
pub struct SizeDistribution {
    /// Total bytes across all reachable objects
    pub total_bytes: u64,

    /// Number of reachable objects
    pub object_count: usize,

    pub mean_object_size: u64,
    pub median_object_size: u64,

    /// Bytes held by the largest 10% of objects
    pub top_10_percent_bytes: u64,

    /// Percentage of total bytes in the largest 10%
    pub top_10_percent_percentage: f64,
}

impl SizeDistribution {
    /// Check if memory sits in a few large objects
    ///
    /// Returns true if the largest 10% of objects hold >80% of bytes
    pub fn is_highly_concentrated(&self) -> bool {
        self.top_10_percent_percentage > 80.0
    }

    /// Get human-readable summary
    ///
    /// **Public** - for logging and debugging
    pub fn summary(&self) -> String {
        format!(
            "Total: {} bytes | Objects: {} | Mean: {} | Median: {} | Top 10%: {:.1}%",
            self.total_bytes,
            self.object_count,
            self.mean_object_size,
            self.median_object_size,
            self.top_10_percent_percentage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphIndexer, HeapTracer, IndexerConfig};
    use crate::heap::RootEnumerator;
    use crate::snapshot::{parse_snapshot, HeapSnapshot};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Linked list Node(8) -> Node(8) -> Node(8) -> Payload(80), plus a
    /// second root holding a lone Node(8)
    fn list_heap() -> HeapSnapshot {
        parse_snapshot(&json!({
            "types": [
                { "name": "Node", "fields": [{ "name": "next" }, { "name": "value" }] },
                { "name": "Payload", "fields": [] }
            ],
            "objects": [
                { "address": 16, "type": 0, "size": 8, "refs": [{ "field": 0, "target": 32 }] },
                { "address": 32, "type": 0, "size": 8, "refs": [{ "field": 0, "target": 48 }] },
                { "address": 48, "type": 0, "size": 8, "refs": [{ "field": 1, "target": 64 }] },
                { "address": 64, "type": 1, "size": 80 },
                { "address": 96, "type": 0, "size": 8 }
            ],
            "roots": [
                { "address": 16, "kind": "gc_handle", "name": "list" },
                { "address": 96, "kind": "gc_handle", "name": "lone" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_top_retainers() {
        let heap = list_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let tree = DominatorTree::build(&graph);

        let top = top_retainers(&tree, 2);
        assert_eq!(top.len(), 2);
        // Root node and list head both retain 104 bytes; the head has the
        // lower index
        assert_eq!(top[0].description, "Node @ 0x10");
        assert_eq!(top[0].inclusive_bytes, 104);
        assert_eq!(top[1].kind, "root");
        assert_eq!(top[1].inclusive_bytes, 104);
        assert!((top[0].percentage - 92.857).abs() < 0.01);
    }

    #[test]
    fn test_retained_by_type_does_not_double_count() {
        let heap = list_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let tree = DominatorTree::build(&graph);

        let by_type = retained_by_type(&tree);
        assert_eq!(
            by_type,
            vec![
                TypeRetention {
                    type_name: "Node".to_string(),
                    count: 4,
                    exclusive_bytes: 32,
                    retained_bytes: 112,
                },
                TypeRetention {
                    type_name: "Payload".to_string(),
                    count: 1,
                    exclusive_bytes: 80,
                    retained_bytes: 80,
                },
            ]
        );
    }

    #[test]
    fn test_size_distribution() {
        let heap = list_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let tree = DominatorTree::build(&graph);

        let dist = calculate_size_distribution(&tree);
        assert_eq!(dist.total_bytes, 112);
        assert_eq!(dist.object_count, 5);
        assert_eq!(dist.mean_object_size, 22);
        assert_eq!(dist.median_object_size, 8);
        assert_eq!(dist.top_10_percent_bytes, 80);
        assert!(!dist.is_highly_concentrated());
        assert!(dist.summary().contains("Objects: 5"));
    }

    #[test]
    fn test_group_retention_empty_without_grouping() {
        let heap = list_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let tree = DominatorTree::build(&graph);

        assert!(group_retention(&tree).is_empty());
    }
}
