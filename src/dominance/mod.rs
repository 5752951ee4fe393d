//! Dominator tree and retained-size computation.
//!
//! [`DominatorTree`] answers "what would be freed if this node went away"
//! for any [`crate::graph::HeapGraph`]; [`SizeAggregator`] re-weights an
//! existing tree by type without rebuilding it.

pub mod aggregate;
pub mod tree;

// Re-export main types
pub use aggregate::SizeAggregator;
pub use tree::{DominatorChain, DominatorTree};
