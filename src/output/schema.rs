//! Output JSON schema definitions for heap reports.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution.

use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Snapshot the report was computed from
    pub snapshot: String,

    /// Timestamp when the report was generated
    pub generated_at: String,

    /// Live objects found by the tracer
    pub object_count: usize,

    /// Roots that were walked
    pub root_count: usize,

    /// Total reachable bytes
    pub total_bytes: u64,

    /// Whether static roots were grouped by class/namespace/assembly
    pub grouped: bool,

    /// Whether GC handles were treated as weak
    pub weak_gc_handles: bool,

    /// Malformed-snapshot diagnostics
    pub diagnostics: Diagnostics,

    /// Largest retainers (ranked by retained bytes)
    pub top_retainers: Vec<Retainer>,

    /// Retained bytes per type
    pub retained_by_type: Vec<TypeRetention>,

    /// Retained bytes per class/namespace/assembly (grouped runs only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Retainer>,

    /// Retention restricted to one type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_filter: Option<TypeFilterSummary>,

    /// Path from a requested object up to the process node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<Backtrace>,
}

/// Counts of references that did not resolve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub invalid_roots: usize,
    pub invalid_pointers: usize,
    pub skipped_weak_roots: usize,

    /// A few sample invalid pointers, as "referrer -> target"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

/// A node that keeps memory alive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retainer {
    /// Node index in the analysed graph
    pub node: usize,

    /// Node kind ("object", "root", "class", ...)
    pub kind: String,

    pub description: String,

    pub exclusive_bytes: u64,

    /// Bytes freed if this node were collected
    pub inclusive_bytes: u64,

    /// Percentage of total reachable bytes
    pub percentage: f64,
}

/// Per-type totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRetention {
    pub type_name: String,
    pub count: usize,
    pub exclusive_bytes: u64,

    /// Bytes retained by instances not nested under another instance of
    /// the same type
    pub retained_bytes: u64,
}

/// Result of a type-filtered size aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeFilterSummary {
    pub type_name: String,
    pub matched_nodes: usize,
    pub retained_bytes: u64,
    pub percentage: f64,
}

/// Retention path of one object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backtrace {
    /// Address the backtrace was requested for, as hex
    pub address: String,

    /// Object first, process node last
    pub path: Vec<Retainer>,
}
