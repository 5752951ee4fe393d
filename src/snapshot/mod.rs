//! JSON heap-snapshot backend.
//!
//! This module handles:
//! - Deserializing the on-disk JSON description of a heap
//! - Validating type/field references and address literals
//! - Serving the result through the `heap` contracts

pub mod loader;
pub mod schema;

// Re-export main types
pub use loader::{load_snapshot, parse_address, parse_snapshot, HeapSnapshot};
pub use schema::RawSnapshot;
