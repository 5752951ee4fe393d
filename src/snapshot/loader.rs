//! Snapshot loading and the in-memory heap model.
//!
//! Parses the JSON snapshot into lookup tables and implements
//! [`HeapMemory`], [`RootEnumerator`] and [`ReferenceClassifier`] on top of them.

use super::schema::{AddressLiteral, RawSnapshot};
use crate::heap::{
    Address, AddressRange, FieldHop, FieldId, HeapMemory, PointerField, ReferenceClassifier,
    ReferenceFlags, RootEntry, RootEnumerator, RootKind, SizeMode, StaticOrigin, TypeIndex,
};
use crate::utils::config::{UNKNOWN_ASSEMBLY, UNKNOWN_CLASS};
use crate::utils::error::SnapshotError;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
struct FieldInfo {
    name: String,
    flags: ReferenceFlags,
    anchor: Vec<FieldHop>,
}

#[derive(Debug, Clone)]
struct TypeInfo {
    name: String,
    fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone)]
struct ObjectInfo {
    type_index: TypeIndex,
    size: u64,
    committed_size: u64,
    refs: Vec<PointerField>,
}

/// A fully loaded heap snapshot
#[derive(Debug, Clone)]
pub struct HeapSnapshot {
    types: Vec<TypeInfo>,
    type_by_name: HashMap<String, TypeIndex>,
    objects: HashMap<Address, ObjectInfo>,
    /// Sorted by start, non-overlapping
    segments: Vec<AddressRange>,
    range: AddressRange,
    roots: Vec<RootEntry>,
}

/// Load a snapshot from a JSON file
///
/// **Public** - main entry point for the CLI
///
/// # Errors
/// * `SnapshotError::Io` - file cannot be read
/// * `SnapshotError::JsonError` - malformed JSON
/// * `SnapshotError::InvalidFormat` - dangling type or field references
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<HeapSnapshot, SnapshotError> {
    let path = path.as_ref();
    info!("Loading heap snapshot: {}", path.display());

    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    parse_snapshot(&value)
}

/// Build a snapshot from an already parsed JSON document
///
/// **Public** - used by tests and by callers that embed snapshots
pub fn parse_snapshot(value: &serde_json::Value) -> Result<HeapSnapshot, SnapshotError> {
    let raw: RawSnapshot = serde_json::from_value(value.clone())?;
    HeapSnapshot::from_raw(raw)
}

/// Parse an address literal (decimal or `0x` hex)
///
/// **Public** - shared with CLI argument handling
pub fn parse_address(text: &str) -> Result<Address, SnapshotError> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        text.parse::<u64>()
    };
    parsed.map_err(|_| SnapshotError::InvalidAddress(text.to_string()))
}

fn literal_to_address(literal: &AddressLiteral) -> Result<Address, SnapshotError> {
    match literal {
        AddressLiteral::Number(n) => Ok(*n),
        AddressLiteral::Text(s) => parse_address(s),
    }
}

impl HeapSnapshot {
    /// Validate and index a raw snapshot
    pub fn from_raw(raw: RawSnapshot) -> Result<Self, SnapshotError> {
        let type_by_name: HashMap<String, TypeIndex> = raw
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i as TypeIndex))
            .collect();

        // Anchor hops name types and fields, so the type table must exist first
        let mut types = Vec::with_capacity(raw.types.len());
        for raw_type in &raw.types {
            let mut fields = Vec::with_capacity(raw_type.fields.len());
            for raw_field in &raw_type.fields {
                let mut anchor = Vec::with_capacity(raw_field.anchor.len());
                for hop in &raw_field.anchor {
                    let hop_type = *type_by_name.get(&hop.type_name).ok_or_else(|| {
                        SnapshotError::InvalidFormat(format!(
                            "anchor of {}.{} names unknown type '{}'",
                            raw_type.name, raw_field.name, hop.type_name
                        ))
                    })?;
                    let hop_field = raw.types[hop_type as usize]
                        .fields
                        .iter()
                        .position(|f| f.name == hop.field)
                        .ok_or_else(|| {
                            SnapshotError::InvalidFormat(format!(
                                "anchor of {}.{} names unknown field '{}.{}'",
                                raw_type.name, raw_field.name, hop.type_name, hop.field
                            ))
                        })?;
                    anchor.push(FieldHop {
                        type_index: hop_type,
                        field: hop_field as FieldId,
                    });
                }

                fields.push(FieldInfo {
                    name: raw_field.name.clone(),
                    flags: ReferenceFlags {
                        owning: raw_field.owning,
                        weak: raw_field.weak,
                        external: raw_field.external,
                        conditional_anchor: !anchor.is_empty(),
                    },
                    anchor,
                });
            }
            types.push(TypeInfo {
                name: raw_type.name.clone(),
                fields,
            });
        }

        let mut objects = HashMap::with_capacity(raw.objects.len());
        for raw_object in &raw.objects {
            let address = literal_to_address(&raw_object.address)?;
            let type_info = types.get(raw_object.type_index as usize).ok_or_else(|| {
                SnapshotError::InvalidFormat(format!(
                    "object {:#x} has unknown type index {}",
                    address, raw_object.type_index
                ))
            })?;

            let mut refs = Vec::with_capacity(raw_object.refs.len());
            for raw_ref in &raw_object.refs {
                if raw_ref.field as usize >= type_info.fields.len() {
                    return Err(SnapshotError::InvalidFormat(format!(
                        "object {:#x} references field {} but type '{}' has {} fields",
                        address,
                        raw_ref.field,
                        type_info.name,
                        type_info.fields.len()
                    )));
                }
                refs.push(PointerField {
                    field: raw_ref.field,
                    target: literal_to_address(&raw_ref.target)?,
                    is_static: raw_ref.is_static,
                });
            }

            let info = ObjectInfo {
                type_index: raw_object.type_index,
                size: raw_object.size,
                committed_size: raw_object.committed_size.unwrap_or(raw_object.size),
                refs,
            };
            if objects.insert(address, info).is_some() {
                warn!("Duplicate object at {:#x}, keeping the last definition", address);
            }
        }

        let mut segments = Vec::new();
        if raw.segments.is_empty() {
            for (&address, info) in &objects {
                let end = address.checked_add(info.size.max(1)).ok_or_else(|| {
                    SnapshotError::InvalidFormat(format!(
                        "object at {:#x} of size {} runs past the end of the address space",
                        address, info.size
                    ))
                })?;
                segments.push(AddressRange::new(address, end));
            }
        } else {
            for raw_segment in &raw.segments {
                let segment = AddressRange::new(
                    literal_to_address(&raw_segment.start)?,
                    literal_to_address(&raw_segment.end)?,
                );
                if segment.is_empty() {
                    return Err(SnapshotError::InvalidFormat(format!(
                        "empty segment [{:#x}, {:#x})",
                        segment.start, segment.end
                    )));
                }
                segments.push(segment);
            }
        }
        segments.sort_by_key(|s| s.start);

        let range = match (segments.first(), segments.iter().map(|s| s.end).max()) {
            (Some(first), Some(end)) => AddressRange::new(first.start, end),
            _ => AddressRange::default(),
        };

        let mut roots = Vec::with_capacity(raw.roots.len());
        for raw_root in &raw.roots {
            let kind: RootKind = raw_root
                .kind
                .parse()
                .map_err(SnapshotError::InvalidFormat)?;
            let origin = if kind == RootKind::Static
                && (raw_root.assembly.is_some() || raw_root.class.is_some())
            {
                Some(StaticOrigin {
                    assembly: raw_root
                        .assembly
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_ASSEMBLY.to_string()),
                    namespace: raw_root.namespace.clone().unwrap_or_default(),
                    class: raw_root
                        .class
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
                    field: raw_root.field.clone().unwrap_or_default(),
                })
            } else {
                None
            };
            roots.push(RootEntry {
                address: literal_to_address(&raw_root.address)?,
                kind,
                origin,
                name: raw_root.name.clone(),
            });
        }

        debug!(
            "Snapshot loaded: {} types, {} objects, {} segments, {} roots",
            types.len(),
            objects.len(),
            segments.len(),
            roots.len()
        );

        Ok(Self {
            types,
            type_by_name,
            objects,
            segments,
            range,
            roots,
        })
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Name of a field, for backtrace output
    pub fn field_name(&self, type_index: TypeIndex, field: FieldId) -> Option<&str> {
        self.types
            .get(type_index as usize)?
            .fields
            .get(field as usize)
            .map(|f| f.name.as_str())
    }

    /// Segment containing `address`, if any
    fn segment_of(&self, address: Address) -> Option<&AddressRange> {
        let idx = self.segments.partition_point(|s| s.start <= address);
        if idx == 0 {
            return None;
        }
        let segment = &self.segments[idx - 1];
        segment.contains(address).then_some(segment)
    }

    fn field_info(&self, type_index: TypeIndex, field: FieldId) -> Option<&FieldInfo> {
        self.types
            .get(type_index as usize)?
            .fields
            .get(field as usize)
    }
}

impl HeapMemory for HeapSnapshot {
    fn address_range(&self) -> AddressRange {
        self.range
    }

    fn resolve_type(&self, address: Address) -> Option<TypeIndex> {
        self.segment_of(address)?;
        self.objects.get(&address).map(|o| o.type_index)
    }

    fn pointer_fields(&self, address: Address, type_index: TypeIndex) -> Vec<PointerField> {
        match self.objects.get(&address) {
            Some(object) if object.type_index == type_index => object.refs.clone(),
            _ => Vec::new(),
        }
    }

    fn object_size(&self, address: Address, type_index: TypeIndex, mode: SizeMode) -> u64 {
        match self.objects.get(&address) {
            Some(object) if object.type_index == type_index => match mode {
                SizeMode::Declared => object.size,
                SizeMode::Committed => object.committed_size,
            },
            _ => 0,
        }
    }

    fn type_name(&self, type_index: TypeIndex) -> Option<&str> {
        self.types.get(type_index as usize).map(|t| t.name.as_str())
    }

    fn find_type(&self, name: &str) -> Option<TypeIndex> {
        self.type_by_name.get(name).copied()
    }
}

impl RootEnumerator for HeapSnapshot {
    fn roots(&self) -> Vec<RootEntry> {
        self.roots.clone()
    }
}

impl ReferenceClassifier for HeapSnapshot {
    fn classify(&self, type_index: TypeIndex, field: FieldId) -> ReferenceFlags {
        self.field_info(type_index, field)
            .map(|f| f.flags)
            .unwrap_or_default()
    }

    fn resolve_anchor(&self, type_index: TypeIndex, field: FieldId) -> Vec<FieldHop> {
        self.field_info(type_index, field)
            .map(|f| f.anchor.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> HeapSnapshot {
        parse_snapshot(&json!({
            "types": [
                { "name": "Node", "fields": [
                    { "name": "next", "owning": true },
                    { "name": "cache", "weak": true, "anchor": [{ "type": "Node", "field": "next" }] }
                ]}
            ],
            "objects": [
                { "address": "0x1000", "type": 0, "size": 32, "refs": [{ "field": 0, "target": "0x1020" }] },
                { "address": 4128, "type": 0, "size": 16, "committed_size": 24 }
            ],
            "roots": [
                { "address": "0x1000", "kind": "static", "assembly": "App", "class": "Program", "field": "s_head" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x10").unwrap(), 16);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("0xZZ").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_resolve_type_uses_implied_segments() {
        let snapshot = sample();
        assert_eq!(snapshot.resolve_type(0x1000), Some(0));
        assert_eq!(snapshot.resolve_type(0x1020), Some(0));
        // Inside a segment but not an object start
        assert_eq!(snapshot.resolve_type(0x1008), None);
        assert_eq!(snapshot.resolve_type(0x9999), None);
        assert_eq!(snapshot.address_range(), AddressRange::new(0x1000, 0x1030));
    }

    #[test]
    fn test_sizes_by_mode() {
        let snapshot = sample();
        assert_eq!(snapshot.object_size(0x1020, 0, SizeMode::Declared), 16);
        assert_eq!(snapshot.object_size(0x1020, 0, SizeMode::Committed), 24);
        assert_eq!(snapshot.object_size(0x1000, 0, SizeMode::Committed), 32);
    }

    #[test]
    fn test_classifier_flags_and_anchor() {
        let snapshot = sample();
        assert!(snapshot.classify(0, 0).owning);
        let cache = snapshot.classify(0, 1);
        assert!(cache.weak);
        assert!(cache.conditional_anchor);
        assert_eq!(
            snapshot.resolve_anchor(0, 1),
            vec![FieldHop {
                type_index: 0,
                field: 0
            }]
        );
        assert_eq!(snapshot.classify(7, 0), ReferenceFlags::NONE);
    }

    #[test]
    fn test_static_root_origin() {
        let snapshot = sample();
        let roots = snapshot.roots();
        assert_eq!(roots.len(), 1);
        let origin = roots[0].origin.as_ref().unwrap();
        assert_eq!(origin.assembly, "App");
        assert_eq!(origin.namespace, "");
        assert_eq!(origin.class, "Program");
    }

    #[test]
    fn test_rejects_object_past_end_of_address_space() {
        let result = parse_snapshot(&json!({
            "types": [{ "name": "Blob", "fields": [] }],
            "objects": [{ "address": "0xfffffffffffffff0", "type": 0, "size": 32 }]
        }));
        assert!(matches!(result, Err(SnapshotError::InvalidFormat(_))));

        // Ending exactly at the top is fine
        let edge = parse_snapshot(&json!({
            "types": [{ "name": "Blob", "fields": [] }],
            "objects": [{ "address": "0xfffffffffffffff0", "type": 0, "size": 15 }]
        }))
        .unwrap();
        assert_eq!(edge.object_count(), 1);
    }

    #[test]
    fn test_rejects_unknown_type_index() {
        let result = parse_snapshot(&json!({
            "types": [],
            "objects": [{ "address": 1, "type": 3, "size": 8 }]
        }));
        assert!(matches!(result, Err(SnapshotError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let result = parse_snapshot(&json!({
            "types": [{ "name": "T", "fields": [] }],
            "objects": [{ "address": 1, "type": 0, "size": 8, "refs": [{ "field": 0, "target": 2 }] }]
        }));
        assert!(matches!(result, Err(SnapshotError::InvalidFormat(_))));
    }

    #[test]
    fn test_rejects_unknown_root_kind() {
        let result = parse_snapshot(&json!({
            "roots": [{ "address": 1, "kind": "stack" }]
        }));
        assert!(result.is_err());
    }
}
