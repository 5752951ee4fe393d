//! Collaborator contracts consumed by the graph core.
//!
//! The tracer, indexer and dominator stages never look at snapshot bytes
//! directly. They go through three small traits:
//! - [`HeapMemory`] - address validation, outgoing pointers, object sizes
//! - [`RootEnumerator`] - the root set, in order
//! - [`ReferenceClassifier`] - ownership flags per (type, field)

pub mod traits;
pub mod types;

// Re-export main types
pub use traits::{HeapMemory, PlainClassifier, ReferenceClassifier, RootEnumerator};
pub use types::{
    Address, AddressRange, FieldHop, FieldId, PointerField, ReferenceFlags, RootEntry, RootKind,
    SizeMode, StaticOrigin, TypeIndex,
};
