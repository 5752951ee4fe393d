//! Traits the graph core uses to see a heap.
//!
//! Implementations must be total and deterministic: any address, valid or
//! not, gets an answer, and the same question always gets the same answer.

use super::types::{
    Address, AddressRange, FieldHop, FieldId, PointerField, ReferenceFlags, RootEntry, SizeMode,
    TypeIndex,
};

/// Memory and type resolution over a heap snapshot
pub trait HeapMemory {
    /// Global bounds covering every heap segment
    ///
    /// Used as a cheap filter before [`HeapMemory::resolve_type`].
    fn address_range(&self) -> AddressRange;

    /// Type of the object starting at `address`, or `None` if the address
    /// is not a valid object start
    fn resolve_type(&self, address: Address) -> Option<TypeIndex>;

    /// Outgoing pointer fields of an object
    fn pointer_fields(&self, address: Address, type_index: TypeIndex) -> Vec<PointerField>;

    /// Allocated size of an object
    fn object_size(&self, address: Address, type_index: TypeIndex, mode: SizeMode) -> u64;

    /// Display name of a type
    fn type_name(&self, type_index: TypeIndex) -> Option<&str>;

    /// Look a type up by display name
    fn find_type(&self, name: &str) -> Option<TypeIndex>;
}

/// Produces the root set up front
pub trait RootEnumerator {
    fn roots(&self) -> Vec<RootEntry>;
}

/// Ownership policy for reference fields
///
/// The core only consumes the flags; how a policy is written down is up to
/// the implementation.
pub trait ReferenceClassifier {
    fn classify(&self, type_index: TypeIndex, field: FieldId) -> ReferenceFlags;

    /// Concrete hop chain for a conditional-anchor field
    fn resolve_anchor(&self, _type_index: TypeIndex, _field: FieldId) -> Vec<FieldHop> {
        Vec::new()
    }
}

/// A classifier that marks nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainClassifier;

impl ReferenceClassifier for PlainClassifier {
    fn classify(&self, _type_index: TypeIndex, _field: FieldId) -> ReferenceFlags {
        ReferenceFlags::NONE
    }
}
