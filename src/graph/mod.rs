//! Heap reference graph construction.
//!
//! Stages, leaves first:
//! - [`HeapTracer`] walks the root set and produces a [`HeapTrace`]
//!   (live objects in postorder plus diagnostics)
//! - [`GraphIndexer`] numbers objects, roots and the process node in one
//!   index space and materializes the predecessor relation
//! - [`GroupSummarizer`] optionally folds static roots into
//!   class / namespace / assembly nodes
//!
//! Every stage is built once and borrows the stage below it, so a stage
//! cannot outlive (or be rebuilt under) the stages that depend on it.

pub mod backtrace;
pub mod grouping;
pub mod indexer;
pub mod model;
pub mod tracer;

// Re-export main types
pub use backtrace::{referrers, shortest_path_to_process, Referrer};
pub use grouping::GroupSummarizer;
pub use indexer::{GraphIndexer, IndexerConfig};
pub use model::{HeapGraph, NodeIndex, NodeKind};
pub use tracer::{
    HeapTrace, HeapTracer, InvalidPointer, InvalidRoot, ObjectIndex, ObjectRecord, TracerConfig,
};
