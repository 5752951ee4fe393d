//! Heapsight
//!
//! Heap snapshot forensics: which objects are alive, and who keeps them
//! alive.
//!
//! The pipeline is a chain of read-only stages, each borrowing the one
//! below it:
//!
//! 1. [`graph::HeapTracer`] walks the heap from its roots
//! 2. [`graph::GraphIndexer`] numbers objects, roots and the process node
//!    and records every node's referrers
//! 3. [`graph::GroupSummarizer`] optionally folds static roots into class,
//!    namespace and assembly nodes
//! 4. [`dominance::DominatorTree`] computes immediate dominators and
//!    retained sizes
//! 5. [`dominance::SizeAggregator`] restricts retained sizes to a type
//!
//! ## Getting Started
//!
//! ```bash
//! heapsight analyze --snapshot heap.json --flamegraph retention.svg --summary
//! ```

pub mod aggregator;
pub mod commands;
pub mod dominance;
pub mod flamegraph;
pub mod graph;
pub mod heap;
pub mod output;
pub mod snapshot;
pub mod utils;
