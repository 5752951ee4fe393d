//! The node-index contract shared by the indexer and the summarizer.

use crate::heap::TypeIndex;

/// Dense node number within one graph stage
pub type NodeIndex = usize;

/// What a node stands for
///
/// Each variant occupies one contiguous band of the index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Live object, by postorder index
    Object(u32),
    /// Root entry, by position in the walked root list
    Root(usize),
    Class(usize),
    Namespace(usize),
    Assembly(usize),
    /// The synthetic node every root hangs off
    Process,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Object(_) => "object",
            NodeKind::Root(_) => "root",
            NodeKind::Class(_) => "class",
            NodeKind::Namespace(_) => "namespace",
            NodeKind::Assembly(_) => "assembly",
            NodeKind::Process => "process",
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(
            self,
            NodeKind::Class(_) | NodeKind::Namespace(_) | NodeKind::Assembly(_)
        )
    }
}

/// Read-only view of a heap graph with a single entry node
///
/// Implementors number nodes so that the process node is the last index
/// and every node is discovered from a node with a higher index. The
/// dominator builder relies on that ordering.
pub trait HeapGraph {
    fn node_count(&self) -> usize;

    /// Entry node of the graph
    fn process_node(&self) -> NodeIndex {
        self.node_count() - 1
    }

    /// Referrers of `node`, one entry per referencing edge
    fn predecessors(&self, node: NodeIndex) -> &[NodeIndex];

    fn kind(&self, node: NodeIndex) -> NodeKind;

    /// Bytes owned by the node itself (0 for non-objects)
    fn exclusive_size(&self, node: NodeIndex) -> u64;

    /// Type of an object node
    fn type_of(&self, node: NodeIndex) -> Option<TypeIndex>;

    fn type_name(&self, type_index: TypeIndex) -> Option<&str>;

    /// Type with the given name among the graph's objects
    ///
    /// `None` when no live object has that type.
    fn find_type(&self, name: &str) -> Option<TypeIndex> {
        (0..self.node_count())
            .filter_map(|node| self.type_of(node))
            .find(|&t| self.type_name(t) == Some(name))
    }

    fn describe(&self, node: NodeIndex) -> String;

    /// Short label used in flamegraph stacks
    fn label(&self, node: NodeIndex) -> String {
        match self.kind(node) {
            NodeKind::Object(_) => self
                .type_of(node)
                .and_then(|t| self.type_name(t))
                .unwrap_or("<unknown type>")
                .to_string(),
            _ => self.describe(node),
        }
    }
}
