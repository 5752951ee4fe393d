//! Plain data types shared by the heap contracts and the graph stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw heap address
pub type Address = u64;

/// Index of a type in the snapshot's type table
pub type TypeIndex = u32;

/// Index of a field within its declaring type
pub type FieldId = u32;

/// Half-open address interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    pub fn new(start: Address, end: Address) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One outgoing pointer of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerField {
    /// Field the pointer was read from
    pub field: FieldId,

    /// Address stored in the field (0 = null)
    pub target: Address,

    /// Whether the field is a static field of the type
    pub is_static: bool,
}

/// How a root keeps its target alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    GcHandle,
    Static,
}

impl RootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootKind::GcHandle => "gc_handle",
            RootKind::Static => "static",
        }
    }
}

impl std::str::FromStr for RootKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gc_handle" | "gchandle" | "handle" => Ok(Self::GcHandle),
            "static" | "static_field" => Ok(Self::Static),
            other => Err(format!("unknown root kind '{}'", other)),
        }
    }
}

/// Where a static root was declared
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaticOrigin {
    pub assembly: String,
    pub namespace: String,
    pub class: String,
    pub field: String,
}

/// A root entry as produced by the root enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    pub address: Address,
    pub kind: RootKind,

    /// Declaring class information (statics only)
    pub origin: Option<StaticOrigin>,

    /// Free-form label (handle type, thread, ...)
    pub name: Option<String>,
}

impl RootEntry {
    pub fn gc_handle(address: Address) -> Self {
        Self {
            address,
            kind: RootKind::GcHandle,
            origin: None,
            name: None,
        }
    }

    pub fn static_field(address: Address, origin: StaticOrigin) -> Self {
        Self {
            address,
            kind: RootKind::Static,
            origin: Some(origin),
            name: None,
        }
    }

    /// Short human-readable label
    pub fn label(&self) -> String {
        match (&self.origin, &self.name) {
            (Some(origin), _) => {
                if origin.namespace.is_empty() {
                    format!("static {}.{}", origin.class, origin.field)
                } else {
                    format!("static {}.{}.{}", origin.namespace, origin.class, origin.field)
                }
            }
            (None, Some(name)) => format!("{} {}", self.kind.as_str(), name),
            (None, None) => format!("{} @ {:#x}", self.kind.as_str(), self.address),
        }
    }
}

/// Ownership classification of a reference field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ReferenceFlags {
    pub owning: bool,
    pub weak: bool,
    pub external: bool,
    pub conditional_anchor: bool,
}

impl ReferenceFlags {
    pub const NONE: ReferenceFlags = ReferenceFlags {
        owning: false,
        weak: false,
        external: false,
        conditional_anchor: false,
    };

    pub fn owning() -> Self {
        Self {
            owning: true,
            ..Self::NONE
        }
    }

    pub fn weak() -> Self {
        Self {
            weak: true,
            ..Self::NONE
        }
    }
}

impl fmt::Display for ReferenceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.owning {
            parts.push("owning");
        }
        if self.weak {
            parts.push("weak");
        }
        if self.external {
            parts.push("external");
        }
        if self.conditional_anchor {
            parts.push("anchor");
        }
        if parts.is_empty() {
            write!(f, "plain")
        } else {
            write!(f, "{}", parts.join("|"))
        }
    }
}

/// One hop of a resolved conditional-anchor path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHop {
    pub type_index: TypeIndex,
    pub field: FieldId,
}

/// Which allocation size to report for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeMode {
    /// Size declared by the type layout
    Declared,
    /// Bytes actually committed for the object
    #[default]
    Committed,
}
