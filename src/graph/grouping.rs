//! Static-root grouping by class, namespace and assembly.
//!
//! Wraps a [`GraphIndexer`] and renumbers its space as:
//! - `[0, R)` the wrapped nodes without the wrapped process node
//! - one band of classes that own static roots
//! - one band of namespaces (scoped per assembly)
//! - one band of assemblies
//! - a new process node
//!
//! Each group has exactly one parent: class -> namespace -> assembly ->
//! process. Static roots hang off their class; GC-handle roots stay
//! attached to the process node.

use super::indexer::GraphIndexer;
use super::model::{HeapGraph, NodeIndex, NodeKind};
use crate::heap::{RootKind, TypeIndex};
use crate::utils::config::{UNKNOWN_ASSEMBLY, UNKNOWN_CLASS, UNKNOWN_NAMESPACE};
use log::info;
use std::collections::HashMap;

/// Parent key used for assemblies, which hang off the process node
const PROCESS_PARENT: usize = usize::MAX;

/// Blank origin names share one placeholder group per band
fn or_placeholder<'s>(name: &'s str, placeholder: &'s str) -> &'s str {
    if name.trim().is_empty() {
        placeholder
    } else {
        name
    }
}

#[derive(Debug, Clone)]
struct Group {
    name: String,
    /// Position of the parent in the band above
    parent: usize,
}

/// Hash-consed groups of one band, keyed on (parent, name)
#[derive(Debug, Default)]
struct Band {
    groups: Vec<Group>,
    lookup: HashMap<(usize, String), usize>,
}

impl Band {
    fn intern(&mut self, parent: usize, name: &str) -> usize {
        if let Some(&index) = self.lookup.get(&(parent, name.to_string())) {
            return index;
        }
        let index = self.groups.len();
        self.groups.push(Group {
            name: name.to_string(),
            parent,
        });
        self.lookup.insert((parent, name.to_string()), index);
        index
    }

    fn len(&self) -> usize {
        self.groups.len()
    }
}

/// Grouped view over a base [`GraphIndexer`]
///
/// **Public** - optional decorator; only a plain indexer can be wrapped
#[derive(Debug)]
pub struct GroupSummarizer<'a, 't> {
    inner: &'a GraphIndexer<'t>,
    classes: Band,
    namespaces: Band,
    assemblies: Band,
    /// Parent node of each wrapped root
    root_parent: Vec<NodeIndex>,
    /// Parent node of each group node, classes first
    group_parent: Vec<NodeIndex>,
}

impl<'a, 't> GroupSummarizer<'a, 't> {
    /// Intern every static root's (assembly, namespace, class) and fix
    /// each group's parent
    pub fn new(inner: &'a GraphIndexer<'t>) -> Self {
        let objects = inner.object_count();
        let roots = inner.root_count();

        let mut classes = Band::default();
        let mut namespaces = Band::default();
        let mut assemblies = Band::default();
        let mut root_class: Vec<Option<usize>> = Vec::with_capacity(roots);

        for root in inner.trace().roots() {
            if root.kind != RootKind::Static {
                root_class.push(None);
                continue;
            }
            let (assembly, namespace, class) = match &root.origin {
                Some(origin) => (
                    or_placeholder(&origin.assembly, UNKNOWN_ASSEMBLY),
                    or_placeholder(&origin.namespace, UNKNOWN_NAMESPACE),
                    or_placeholder(&origin.class, UNKNOWN_CLASS),
                ),
                None => (UNKNOWN_ASSEMBLY, UNKNOWN_NAMESPACE, UNKNOWN_CLASS),
            };
            let a = assemblies.intern(PROCESS_PARENT, assembly);
            let n = namespaces.intern(a, namespace);
            let c = classes.intern(n, class);
            root_class.push(Some(c));
        }

        let base = objects + roots;
        let namespace_base = base + classes.len();
        let assembly_base = namespace_base + namespaces.len();
        let process = assembly_base + assemblies.len();

        let root_parent = root_class
            .iter()
            .map(|c| c.map_or(process, |c| base + c))
            .collect();

        let mut group_parent = Vec::with_capacity(process - base);
        group_parent.extend(classes.groups.iter().map(|g| namespace_base + g.parent));
        group_parent.extend(namespaces.groups.iter().map(|g| assembly_base + g.parent));
        group_parent.extend(assemblies.groups.iter().map(|_| process));

        info!(
            "Grouped static roots into {} classes, {} namespaces, {} assemblies",
            classes.len(),
            namespaces.len(),
            assemblies.len()
        );

        Self {
            inner,
            classes,
            namespaces,
            assemblies,
            root_parent,
            group_parent,
        }
    }

    /// The wrapped indexer
    pub fn inner(&self) -> &'a GraphIndexer<'t> {
        self.inner
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    pub fn assembly_count(&self) -> usize {
        self.assemblies.len()
    }

    /// First index after the wrapped nodes
    fn group_base(&self) -> NodeIndex {
        self.inner.object_count() + self.inner.root_count()
    }

    /// Name of a group node
    pub fn group_name(&self, node: NodeIndex) -> Option<&str> {
        let group = match self.kind(node) {
            NodeKind::Class(i) => &self.classes.groups[i],
            NodeKind::Namespace(i) => &self.namespaces.groups[i],
            NodeKind::Assembly(i) => &self.assemblies.groups[i],
            _ => return None,
        };
        Some(group.name.as_str())
    }

    /// Fixed parent of a group node
    pub fn group_parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        if self.kind(node).is_group() {
            Some(self.group_parent[node - self.group_base()])
        } else {
            None
        }
    }

    /// Class node a static root was folded into
    pub fn class_of_root(&self, node: NodeIndex) -> Option<NodeIndex> {
        match self.kind(node) {
            NodeKind::Root(r) => {
                let parent = self.root_parent[r];
                (parent != self.process_node()).then_some(parent)
            }
            _ => None,
        }
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

impl HeapGraph for GroupSummarizer<'_, '_> {
    fn node_count(&self) -> usize {
        self.group_base() + self.group_parent.len() + 1
    }

    fn predecessors(&self, node: NodeIndex) -> &[NodeIndex] {
        match self.kind(node) {
            // Objects only ever have object or root referrers, whose
            // indices are unchanged
            NodeKind::Object(_) => self.inner.predecessors(node),
            NodeKind::Root(r) => std::slice::from_ref(&self.root_parent[r]),
            NodeKind::Class(_) | NodeKind::Namespace(_) | NodeKind::Assembly(_) => {
                std::slice::from_ref(&self.group_parent[node - self.group_base()])
            }
            NodeKind::Process => &[],
        }
    }

    fn kind(&self, node: NodeIndex) -> NodeKind {
        self.check(node);
        let base = self.group_base();
        if node < base {
            return self.inner.kind(node);
        }
        let offset = node - base;
        let classes = self.classes.len();
        let namespaces = self.namespaces.len();
        let assemblies = self.assemblies.len();
        if offset < classes {
            NodeKind::Class(offset)
        } else if offset < classes + namespaces {
            NodeKind::Namespace(offset - classes)
        } else if offset < classes + namespaces + assemblies {
            NodeKind::Assembly(offset - classes - namespaces)
        } else {
            NodeKind::Process
        }
    }

    fn exclusive_size(&self, node: NodeIndex) -> u64 {
        if node < self.group_base() {
            self.inner.exclusive_size(node)
        } else {
            self.check(node);
            0
        }
    }

    fn type_of(&self, node: NodeIndex) -> Option<TypeIndex> {
        if node < self.group_base() {
            self.inner.type_of(node)
        } else {
            self.check(node);
            None
        }
    }

    fn type_name(&self, type_index: TypeIndex) -> Option<&str> {
        self.inner.type_name(type_index)
    }

    fn find_type(&self, name: &str) -> Option<TypeIndex> {
        self.inner.find_type(name)
    }

    fn describe(&self, node: NodeIndex) -> String {
        match self.kind(node) {
            NodeKind::Object(_) | NodeKind::Root(_) => self.inner.describe(node),
            NodeKind::Class(i) => format!("class {}", self.classes.groups[i].name),
            NodeKind::Namespace(i) => {
                let group = &self.namespaces.groups[i];
                format!(
                    "namespace {} ({})",
                    group.name, self.assemblies.groups[group.parent].name
                )
            }
            NodeKind::Assembly(i) => format!("assembly {}", self.assemblies.groups[i].name),
            NodeKind::Process => "process".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::indexer::IndexerConfig;
    use crate::graph::tracer::HeapTracer;
    use crate::heap::RootEnumerator;
    use crate::snapshot::{parse_snapshot, HeapSnapshot};
    use serde_json::json;

    fn statics_heap() -> HeapSnapshot {
        parse_snapshot(&json!({
            "types": [{ "name": "Blob", "fields": [] }],
            "objects": [
                { "address": 100, "type": 0, "size": 10 },
                { "address": 200, "type": 0, "size": 20 },
                { "address": 300, "type": 0, "size": 30 },
                { "address": 400, "type": 0, "size": 40 }
            ],
            "roots": [
                { "address": 100, "kind": "static", "assembly": "Core", "namespace": "Util", "class": "Cache", "field": "s_a" },
                { "address": 200, "kind": "static", "assembly": "Core", "namespace": "Util", "class": "Cache", "field": "s_b" },
                { "address": 300, "kind": "static", "assembly": "Plugin", "namespace": "Util", "class": "Cache", "field": "s_c" },
                { "address": 400, "kind": "gc_handle" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_group_bands() {
        let heap = statics_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let base = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let grouped = GroupSummarizer::new(&base);

        // Same namespace/class names under different assemblies are distinct
        assert_eq!(grouped.class_count(), 2);
        assert_eq!(grouped.namespace_count(), 2);
        assert_eq!(grouped.assembly_count(), 2);
        // 4 objects + 4 roots + 2 + 2 + 2 groups + process
        assert_eq!(grouped.node_count(), 15);
        assert_eq!(grouped.process_node(), 14);

        assert_eq!(grouped.kind(8), NodeKind::Class(0));
        assert_eq!(grouped.kind(10), NodeKind::Namespace(0));
        assert_eq!(grouped.kind(12), NodeKind::Assembly(0));
        assert_eq!(grouped.kind(14), NodeKind::Process);
    }

    #[test]
    fn test_predecessors_follow_group_chain() {
        let heap = statics_heap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let base = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let grouped = GroupSummarizer::new(&base);

        let first_static = base.node_for_root(0);
        let handle = base.node_for_root(3);
        let class = grouped.predecessors(first_static)[0];
        assert_eq!(grouped.kind(class), NodeKind::Class(0));
        assert_eq!(grouped.predecessors(base.node_for_root(1)), &[class]);
        assert_eq!(grouped.class_of_root(first_static), Some(class));

        let namespace = grouped.group_parent(class).unwrap();
        let assembly = grouped.group_parent(namespace).unwrap();
        assert_eq!(grouped.group_parent(assembly), Some(grouped.process_node()));
        assert_eq!(grouped.group_name(assembly), Some("Core"));
        assert_eq!(grouped.describe(namespace), "namespace Util (Core)");

        assert_eq!(grouped.predecessors(handle), &[grouped.process_node()]);
        assert_eq!(grouped.class_of_root(handle), None);

        // Object predecessors pass through
        let object = base.node_for_address(100).unwrap();
        assert_eq!(grouped.predecessors(object), base.predecessors(object));
        assert_eq!(grouped.exclusive_size(object), 10);
        assert_eq!(grouped.exclusive_size(class), 0);
    }

    #[test]
    fn test_static_root_without_origin() {
        let heap = parse_snapshot(&json!({
            "types": [{ "name": "Blob", "fields": [] }],
            "objects": [{ "address": 8, "type": 0, "size": 8 }],
            "roots": [{ "address": 8, "kind": "static" }]
        }))
        .unwrap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let base = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let grouped = GroupSummarizer::new(&base);

        let class = grouped.class_of_root(base.node_for_root(0)).unwrap();
        assert_eq!(grouped.group_name(class), Some(UNKNOWN_CLASS));
    }

    #[test]
    fn test_blank_origin_names_use_placeholders() {
        let heap = parse_snapshot(&json!({
            "types": [{ "name": "Blob", "fields": [] }],
            "objects": [
                { "address": 8, "type": 0, "size": 8 },
                { "address": 16, "type": 0, "size": 8 }
            ],
            "roots": [
                { "address": 8, "kind": "static", "assembly": "", "namespace": "", "class": "", "field": "s_a" },
                { "address": 16, "kind": "static", "field": "s_b" }
            ]
        }))
        .unwrap();
        let trace = HeapTracer::default().trace(&heap, &heap.roots());
        let base = GraphIndexer::new(&trace, &heap, &heap, IndexerConfig::default());
        let grouped = GroupSummarizer::new(&base);

        // Blank names and a missing origin land in the same groups
        assert_eq!(grouped.class_count(), 1);
        assert_eq!(grouped.namespace_count(), 1);
        assert_eq!(grouped.assembly_count(), 1);

        let class = grouped.class_of_root(base.node_for_root(0)).unwrap();
        assert_eq!(grouped.class_of_root(base.node_for_root(1)), Some(class));
        let namespace = grouped.group_parent(class).unwrap();
        let assembly = grouped.group_parent(namespace).unwrap();
        assert_eq!(grouped.group_name(class), Some(UNKNOWN_CLASS));
        assert_eq!(grouped.group_name(namespace), Some(UNKNOWN_NAMESPACE));
        assert_eq!(grouped.group_name(assembly), Some(UNKNOWN_ASSEMBLY));
        assert!(!grouped.describe(class).contains("()"));
    }
}
