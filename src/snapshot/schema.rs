//! Input JSON schema for heap snapshots.
//!
//! These structs mirror the file layout one to one; [`super::loader`]
//! turns them into a queryable [`super::HeapSnapshot`].

use serde::Deserialize;

/// Address written either as a JSON number or as a `0x` hex string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddressLiteral {
    Number(u64),
    Text(String),
}

/// Top-level snapshot document
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub types: Vec<RawType>,

    /// Heap segments; if empty, every object is its own segment
    #[serde(default)]
    pub segments: Vec<RawSegment>,

    #[serde(default)]
    pub objects: Vec<RawObject>,

    #[serde(default)]
    pub roots: Vec<RawRoot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawType {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<RawField>,
}

/// Reference field declaration with its classification flags
#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    pub name: String,

    #[serde(default)]
    pub owning: bool,

    #[serde(default)]
    pub weak: bool,

    #[serde(default)]
    pub external: bool,

    /// Conditional-anchor path; a non-empty path marks the field as an anchor
    #[serde(default)]
    pub anchor: Vec<RawHop>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHop {
    #[serde(rename = "type")]
    pub type_name: String,
    pub field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub start: AddressLiteral,
    pub end: AddressLiteral,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawObject {
    pub address: AddressLiteral,

    #[serde(rename = "type")]
    pub type_index: u32,

    pub size: u64,

    /// Defaults to `size` when absent
    #[serde(default, alias = "committedSize")]
    pub committed_size: Option<u64>,

    #[serde(default)]
    pub refs: Vec<RawRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRef {
    pub field: u32,
    pub target: AddressLiteral,

    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRoot {
    pub address: AddressLiteral,
    pub kind: String,

    #[serde(default)]
    pub assembly: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub class: Option<String>,

    #[serde(default)]
    pub field: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}
