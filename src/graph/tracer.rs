//! Mark traversal over an opaque heap.
//!
//! The tracer walks from the root set with an explicit stack, marks each
//! address once and emits objects in postorder. References that do not
//! resolve to an object are kept as diagnostics instead of failing the walk.

use crate::heap::{Address, AddressRange, FieldId, HeapMemory, RootEntry, RootKind, TypeIndex};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Position of a live object in tracer postorder
pub type ObjectIndex = u32;

/// A live object discovered by the tracer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRecord {
    pub address: Address,
    pub type_index: TypeIndex,
    pub postorder: ObjectIndex,
}

/// A root whose address is not a valid object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRoot {
    /// Position in [`HeapTrace::roots`]
    pub root_index: usize,
    pub address: Address,
}

/// A pointer field whose target is not a valid object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPointer {
    pub referrer: Address,
    pub field: FieldId,
    pub target: Address,
}

/// Construction-time tracer options
#[derive(Debug, Clone, Copy, Default)]
pub struct TracerConfig {
    /// Leave GC-handle roots out of the walked root set
    pub weak_gc_handles: bool,
}

/// Per-address mark state, owned by one trace
#[derive(Debug, Clone, Copy)]
struct Mark {
    type_index: TypeIndex,
    predecessors: u32,
}

/// Work-stack entry; `Processed` means the children were already pushed
#[derive(Debug, Clone, Copy)]
enum Visit {
    Pending(Address),
    Processed(Address),
}

/// Heap walker
///
/// **Public** - first stage of the pipeline
#[derive(Debug, Clone, Default)]
pub struct HeapTracer {
    config: TracerConfig,
}

/// Result of a heap walk
///
/// Immutable once built; later stages borrow it.
#[derive(Debug, Clone)]
pub struct HeapTrace {
    objects: Vec<ObjectRecord>,
    /// Object indices sorted by address
    by_address: Vec<ObjectIndex>,
    predecessor_counts: Vec<u32>,
    roots: Vec<RootEntry>,
    invalid_roots: Vec<InvalidRoot>,
    invalid_pointers: Vec<InvalidPointer>,
    skipped_weak_roots: usize,
    weak_gc_handles: bool,
}

impl HeapTracer {
    pub fn new(config: TracerConfig) -> Self {
        Self { config }
    }

    /// Walk the heap from `roots`
    ///
    /// **Public** - main entry point for tracing
    ///
    /// # Algorithm
    /// 1. Validate each root (range check, then type resolution)
    /// 2. Mark it and push it as pending
    /// 3. A pending entry is re-pushed as processed and its valid,
    ///    unmarked targets are marked and pushed above it
    /// 4. A processed entry is appended to the postorder list
    ///
    /// Marked targets only bump their predecessor count.
    pub fn trace<M: HeapMemory + ?Sized>(&self, memory: &M, roots: &[RootEntry]) -> HeapTrace {
        let range = memory.address_range();
        debug!(
            "Tracing heap [{:#x}, {:#x}) from {} candidate roots",
            range.start,
            range.end,
            roots.len()
        );

        let mut marks: HashMap<Address, Mark> = HashMap::new();
        let mut objects: Vec<ObjectRecord> = Vec::new();
        let mut walked_roots: Vec<RootEntry> = Vec::with_capacity(roots.len());
        let mut invalid_roots = Vec::new();
        let mut invalid_pointers = Vec::new();
        let mut skipped_weak_roots = 0;
        let mut stack: Vec<Visit> = Vec::new();

        for root in roots {
            if self.config.weak_gc_handles && root.kind == RootKind::GcHandle {
                skipped_weak_roots += 1;
                continue;
            }
            walked_roots.push(root.clone());

            if let Some(mark) = marks.get_mut(&root.address) {
                mark.predecessors += 1;
                continue;
            }
            let Some(type_index) = validate(memory, &range, root.address) else {
                invalid_roots.push(InvalidRoot {
                    root_index: walked_roots.len() - 1,
                    address: root.address,
                });
                continue;
            };
            marks.insert(
                root.address,
                Mark {
                    type_index,
                    predecessors: 1,
                },
            );
            stack.push(Visit::Pending(root.address));

            while let Some(visit) = stack.pop() {
                match visit {
                    Visit::Pending(address) => {
                        stack.push(Visit::Processed(address));
                        let type_index = marks[&address].type_index;

                        for pointer in memory.pointer_fields(address, type_index) {
                            if pointer.target == 0 {
                                continue;
                            }
                            if let Some(mark) = marks.get_mut(&pointer.target) {
                                mark.predecessors += 1;
                                continue;
                            }
                            match validate(memory, &range, pointer.target) {
                                Some(target_type) => {
                                    marks.insert(
                                        pointer.target,
                                        Mark {
                                            type_index: target_type,
                                            predecessors: 1,
                                        },
                                    );
                                    stack.push(Visit::Pending(pointer.target));
                                }
                                None => invalid_pointers.push(InvalidPointer {
                                    referrer: address,
                                    field: pointer.field,
                                    target: pointer.target,
                                }),
                            }
                        }
                    }
                    Visit::Processed(address) => {
                        objects.push(ObjectRecord {
                            address,
                            type_index: marks[&address].type_index,
                            postorder: objects.len() as ObjectIndex,
                        });
                    }
                }
            }
        }

        let predecessor_counts: Vec<u32> = objects
            .iter()
            .map(|o| marks[&o.address].predecessors)
            .collect();

        let mut by_address: Vec<ObjectIndex> = (0..objects.len() as ObjectIndex).collect();
        by_address.sort_unstable_by_key(|&i| objects[i as usize].address);

        if !invalid_roots.is_empty() {
            warn!("{} roots do not point at valid objects", invalid_roots.len());
        }
        if !invalid_pointers.is_empty() {
            warn!("{} pointers do not point at valid objects", invalid_pointers.len());
        }
        info!(
            "Traced {} live objects from {} roots ({} weak handles skipped)",
            objects.len(),
            walked_roots.len(),
            skipped_weak_roots
        );

        HeapTrace {
            objects,
            by_address,
            predecessor_counts,
            roots: walked_roots,
            invalid_roots,
            invalid_pointers,
            skipped_weak_roots,
            weak_gc_handles: self.config.weak_gc_handles,
        }
    }
}

/// Range check first, then the per-segment lookup
#[inline]
fn validate<M: HeapMemory + ?Sized>(
    memory: &M,
    range: &AddressRange,
    address: Address,
) -> Option<TypeIndex> {
    if !range.contains(address) {
        return None;
    }
    memory.resolve_type(address)
}

impl HeapTrace {
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Live objects in postorder
    pub fn objects(&self) -> &[ObjectRecord] {
        &self.objects
    }

    /// Object at a postorder index
    ///
    /// # Panics
    /// If `index` is not a valid object index.
    pub fn object_at(&self, index: ObjectIndex) -> &ObjectRecord {
        assert!(
            (index as usize) < self.objects.len(),
            "object index {} out of range (0..{})",
            index,
            self.objects.len()
        );
        &self.objects[index as usize]
    }

    /// Postorder index of the live object at `address`
    pub fn find_object(&self, address: Address) -> Option<ObjectIndex> {
        self.by_address
            .binary_search_by_key(&address, |&i| self.objects[i as usize].address)
            .ok()
            .map(|pos| self.by_address[pos])
    }

    /// Number of references (roots and fields) that reach an object
    pub fn predecessor_count(&self, index: ObjectIndex) -> u32 {
        self.predecessor_counts[self.object_at(index).postorder as usize]
    }

    /// Roots that were walked, in input order
    pub fn roots(&self) -> &[RootEntry] {
        &self.roots
    }

    pub fn invalid_roots(&self) -> &[InvalidRoot] {
        &self.invalid_roots
    }

    pub fn invalid_pointers(&self) -> &[InvalidPointer] {
        &self.invalid_pointers
    }

    pub fn skipped_weak_roots(&self) -> usize {
        self.skipped_weak_roots
    }

    pub fn weak_gc_handles(&self) -> bool {
        self.weak_gc_handles
    }
}
