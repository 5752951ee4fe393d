//! Flat node-index space over a heap trace.
//!
//! Layout for N live objects and M walked roots:
//! - `[0, N)` objects, in tracer postorder
//! - `[N, N + M)` roots, in root order
//! - `N + M` the process node
//!
//! The predecessor relation is built once, stored compactly (one offset
//! table plus one flat vector) and never deduplicated: two fields pointing
//! at the same object give two entries.

use super::model::{HeapGraph, NodeIndex, NodeKind};
use super::tracer::{HeapTrace, ObjectIndex};
use crate::heap::{
    Address, FieldHop, HeapMemory, ReferenceClassifier, ReferenceFlags, RootEntry, SizeMode,
    TypeIndex,
};
use log::{debug, info};
use std::collections::HashMap;

/// Indexer construction options
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexerConfig {
    pub size_mode: SizeMode,
}

/// Objects, roots and the process node in one index space
///
/// **Public** - base graph for dominance and grouping
#[derive(Debug)]
pub struct GraphIndexer<'t> {
    trace: &'t HeapTrace,
    /// `predecessors[offsets[n]..offsets[n + 1]]` are the referrers of `n`
    offsets: Vec<usize>,
    predecessors: Vec<NodeIndex>,
    sizes: Vec<u64>,
    /// Classification of the edge that first reached each node
    first_edge: Vec<ReferenceFlags>,
    anchors: HashMap<NodeIndex, Vec<FieldHop>>,
    type_names: HashMap<TypeIndex, String>,
}

impl<'t> GraphIndexer<'t> {
    /// Build the index and the predecessor relation in one pass
    ///
    /// **Public** - main entry point
    ///
    /// Predecessor slots are sized from the tracer's predecessor counts,
    /// so `memory` must answer exactly as it did during tracing.
    ///
    /// # Panics
    /// If `memory` reports more references to an object than the trace saw.
    pub fn new<M, C>(
        trace: &'t HeapTrace,
        memory: &M,
        classifier: &C,
        config: IndexerConfig,
    ) -> Self
    where
        M: HeapMemory + ?Sized,
        C: ReferenceClassifier + ?Sized,
    {
        let object_count = trace.object_count();
        let root_count = trace.roots().len();
        let node_count = object_count + root_count + 1;
        let process = node_count - 1;

        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0usize);
        for index in 0..object_count {
            let count = trace.predecessor_count(index as ObjectIndex) as usize;
            offsets.push(offsets[index] + count);
        }
        for _ in 0..root_count {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + 1);
        }
        // Process node has no predecessors
        let total = offsets[offsets.len() - 1];
        offsets.push(total);

        let mut builder = EdgeBuilder {
            cursor: offsets[..node_count].to_vec(),
            offsets: &offsets,
            predecessors: vec![0; total],
            first_edge: vec![ReferenceFlags::NONE; node_count],
            anchors: HashMap::new(),
        };

        for (r, root) in trace.roots().iter().enumerate() {
            let root_node = object_count + r;
            builder.add(root_node, process, ReferenceFlags::NONE);
            if let Some(target) = trace.find_object(root.address) {
                builder.add(target as NodeIndex, root_node, ReferenceFlags::NONE);
            }
        }

        let mut sizes = Vec::with_capacity(object_count);
        let mut type_names = HashMap::new();
        for object in trace.objects() {
            let referrer = object.postorder as NodeIndex;
            sizes.push(memory.object_size(object.address, object.type_index, config.size_mode));
            type_names.entry(object.type_index).or_insert_with(|| {
                memory
                    .type_name(object.type_index)
                    .unwrap_or("<unknown type>")
                    .to_string()
            });

            for pointer in memory.pointer_fields(object.address, object.type_index) {
                if pointer.target == 0 {
                    continue;
                }
                let Some(target) = trace.find_object(pointer.target) else {
                    continue;
                };
                let target = target as NodeIndex;
                let flags = classifier.classify(object.type_index, pointer.field);
                if builder.add(target, referrer, flags) && flags.conditional_anchor {
                    let hops = classifier.resolve_anchor(object.type_index, pointer.field);
                    builder.anchors.insert(target, hops);
                }
            }
        }

        let EdgeBuilder {
            predecessors,
            first_edge,
            anchors,
            ..
        } = builder;

        info!(
            "Indexed {} nodes ({} objects, {} roots, {} edges)",
            node_count,
            object_count,
            root_count,
            predecessors.len()
        );
        debug!("{} nodes reached through conditional anchors", anchors.len());

        Self {
            trace,
            offsets,
            predecessors,
            sizes,
            first_edge,
            anchors,
            type_names,
        }
    }

    pub fn trace(&self) -> &'t HeapTrace {
        self.trace
    }

    pub fn object_count(&self) -> usize {
        self.trace.object_count()
    }

    pub fn root_count(&self) -> usize {
        self.trace.roots().len()
    }

    pub fn is_object(&self, node: NodeIndex) -> bool {
        self.check(node);
        node < self.object_count()
    }

    pub fn is_root(&self, node: NodeIndex) -> bool {
        self.check(node);
        node >= self.object_count() && node < self.object_count() + self.root_count()
    }

    pub fn is_process(&self, node: NodeIndex) -> bool {
        self.check(node);
        node == self.process_node()
    }

    /// # Panics
    /// If `object` is not a valid object index.
    pub fn node_for_object(&self, object: ObjectIndex) -> NodeIndex {
        self.trace.object_at(object).postorder as NodeIndex
    }

    pub fn object_for_node(&self, node: NodeIndex) -> Option<ObjectIndex> {
        self.is_object(node).then_some(node as ObjectIndex)
    }

    /// # Panics
    /// If `root` is not a valid root index.
    pub fn node_for_root(&self, root: usize) -> NodeIndex {
        assert!(
            root < self.root_count(),
            "root index {} out of range (0..{})",
            root,
            self.root_count()
        );
        self.object_count() + root
    }

    pub fn root_for_node(&self, node: NodeIndex) -> Option<usize> {
        self.is_root(node).then(|| node - self.object_count())
    }

    /// Node of the live object at `address`
    pub fn node_for_address(&self, address: Address) -> Option<NodeIndex> {
        self.trace.find_object(address).map(|i| i as NodeIndex)
    }

    pub fn root_entry(&self, node: NodeIndex) -> Option<&'t RootEntry> {
        let trace = self.trace;
        self.root_for_node(node).map(|r| &trace.roots()[r])
    }

    pub fn address_of(&self, node: NodeIndex) -> Option<Address> {
        self.object_for_node(node)
            .map(|o| self.trace.object_at(o).address)
    }

    pub fn kind_name(&self, node: NodeIndex) -> &'static str {
        self.kind(node).name()
    }

    /// Whether the edge that first reached `node` is owning
    pub fn is_owned(&self, node: NodeIndex) -> bool {
        self.check(node);
        self.first_edge[node].owning
    }

    pub fn is_weak(&self, node: NodeIndex) -> bool {
        self.check(node);
        self.first_edge[node].weak
    }

    pub fn is_external(&self, node: NodeIndex) -> bool {
        self.check(node);
        self.first_edge[node].external
    }

    /// Classification of the edge that first reached `node`
    pub fn first_edge_flags(&self, node: NodeIndex) -> ReferenceFlags {
        self.check(node);
        self.first_edge[node]
    }

    /// Resolved anchor path, when `node` was first reached through a
    /// conditional-anchor field
    pub fn anchor_hops(&self, node: NodeIndex) -> Option<&[FieldHop]> {
        self.check(node);
        self.anchors.get(&node).map(|h| h.as_slice())
    }

    #[inline]
    fn check(&self, node: NodeIndex) {
        assert!(
            node < self.node_count(),
            "node index {} out of range (0..{})",
            node,
            self.node_count()
        );
    }
}

struct EdgeBuilder<'o> {
    offsets: &'o [usize],
    cursor: Vec<usize>,
    predecessors: Vec<NodeIndex>,
    first_edge: Vec<ReferenceFlags>,
    anchors: HashMap<NodeIndex, Vec<FieldHop>>,
}

impl EdgeBuilder<'_> {
    /// Record `from -> to`; returns true if this is the first edge into `to`
    fn add(&mut self, to: NodeIndex, from: NodeIndex, flags: ReferenceFlags) -> bool {
        let slot = self.cursor[to];
        assert!(
            slot < self.offsets[to + 1],
            "node {} has more predecessors than the trace counted",
            to
        );
        self.predecessors[slot] = from;
        self.cursor[to] += 1;

        let first = slot == self.offsets[to];
        if first {
            self.first_edge[to] = flags;
        }
        first
    }
}

impl HeapGraph for GraphIndexer<'_> {
    fn node_count(&self) -> usize {
        self.object_count() + self.root_count() + 1
    }

    fn predecessors(&self, node: NodeIndex) -> &[NodeIndex] {
        self.check(node);
        &self.predecessors[self.offsets[node]..self.offsets[node + 1]]
    }

    fn kind(&self, node: NodeIndex) -> NodeKind {
        self.check(node);
        let objects = self.object_count();
        if node < objects {
            NodeKind::Object(node as ObjectIndex)
        } else if node < objects + self.root_count() {
            NodeKind::Root(node - objects)
        } else {
            NodeKind::Process
        }
    }

    fn exclusive_size(&self, node: NodeIndex) -> u64 {
        self.check(node);
        self.sizes.get(node).copied().unwrap_or(0)
    }

    fn type_of(&self, node: NodeIndex) -> Option<TypeIndex> {
        self.object_for_node(node)
            .map(|o| self.trace.object_at(o).type_index)
    }

    fn type_name(&self, type_index: TypeIndex) -> Option<&str> {
        self.type_names.get(&type_index).map(|s| s.as_str())
    }

    fn find_type(&self, name: &str) -> Option<TypeIndex> {
        self.type_names
            .iter()
            .find(|(_, type_name)| type_name.as_str() == name)
            .map(|(&type_index, _)| type_index)
    }

    fn describe(&self, node: NodeIndex) -> String {
        match self.kind(node) {
            NodeKind::Object(o) => {
                let record = self.trace.object_at(o);
                format!(
                    "{} @ {:#x}",
                    self.type_name(record.type_index).unwrap_or("<unknown type>"),
                    record.address
                )
            }
            NodeKind::Root(r) => self.trace.roots()[r].label(),
            _ => "process".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tracer::HeapTracer;
    use crate::heap::RootEnumerator;
    use crate::snapshot::{parse_snapshot, HeapSnapshot};
    use serde_json::json;

    fn diamond_heap() -> HeapSnapshot {
        // Root -> A; A.left -> B; A.right -> B (twice); B.owner -> C (owning)
        parse_snapshot(&json!({
            "types": [
                { "name": "Pair", "fields": [{ "name": "left" }, { "name": "right", "weak": true }] },
                { "name": "Leaf", "fields": [{ "name": "owner", "owning": true }] }
            ],
            "objects": [
                { "address": 16, "type": 0, "size": 32, "refs": [
                    { "field": 0, "target": 64 },
                    { "field": 1, "target": 64 }
                ]},
                { "address": 64, "type": 1, "size": 8, "refs": [{ "field": 0, "target": 128 }] },
                { "address": 128, "type": 1, "size": 4 }
            ],
            "roots": [
                { "address": 16, "kind": "gc_handle", "name": "pinned" },
                { "address": 7, "kind": "gc_handle" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_bands_partition_index_space() {
        let heap = diamond_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());

        assert_eq!(graph.node_count(), 3 + 2 + 1);
        for node in 0..graph.node_count() {
            let flags = [graph.is_object(node), graph.is_root(node), graph.is_process(node)];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "node {}", node);
        }
        assert_eq!(graph.process_node(), 5);
        assert_eq!(graph.kind(3), NodeKind::Root(0));
        assert_eq!(graph.kind_name(5), "process");
    }

    #[test]
    fn test_predecessors_keep_multiplicity() {
        let heap = diamond_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());

        let a = graph.node_for_address(16).unwrap();
        let b = graph.node_for_address(64).unwrap();
        let c = graph.node_for_address(128).unwrap();

        assert_eq!(graph.predecessors(b), &[a, a]);
        assert_eq!(graph.predecessors(c), &[b]);
        assert_eq!(graph.predecessors(a), &[graph.node_for_root(0)]);
        assert_eq!(graph.predecessors(graph.node_for_root(0)), &[graph.process_node()]);
        // Invalid root still has its process edge but no target edge
        assert_eq!(graph.predecessors(graph.node_for_root(1)), &[graph.process_node()]);
        assert!(graph.predecessors(graph.process_node()).is_empty());
    }

    #[test]
    fn test_first_edge_flags() {
        let heap = diamond_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());

        let b = graph.node_for_address(64).unwrap();
        let c = graph.node_for_address(128).unwrap();
        // B is first reached through `left`, which is plain
        assert!(!graph.is_weak(b));
        assert!(!graph.is_owned(b));
        assert!(graph.is_owned(c));
        assert!(graph.anchor_hops(c).is_none());
    }

    #[test]
    fn test_descriptions_and_sizes() {
        let heap = diamond_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());

        let a = graph.node_for_address(16).unwrap();
        assert_eq!(graph.describe(a), "Pair @ 0x10");
        assert_eq!(graph.label(a), "Pair");
        assert_eq!(graph.exclusive_size(a), 32);
        assert_eq!(graph.describe(graph.node_for_root(0)), "gc_handle pinned");
        assert_eq!(graph.exclusive_size(graph.process_node()), 0);
        assert_eq!(graph.address_of(a), Some(16));
        assert_eq!(graph.root_for_node(a), None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_node_panics() {
        let heap = diamond_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let graph = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        graph.predecessors(42);
    }
}
