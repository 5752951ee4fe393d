//! Aggregation of a dominator tree into report metrics.
//!
//! This module turns a built dominator tree into:
//! - Top retainers (largest retained sizes)
//! - Retained bytes per type and per group
//! - Collapsed stacks (for flamegraph generation)
//! - Object size distribution statistics

pub mod metrics;
pub mod stack_builder;

// Re-export main types and functions
pub use metrics::{
    calculate_size_distribution, create_retainer, group_retention, retained_by_type,
    top_retainers, SizeDistribution,
};
pub use stack_builder::{build_dominator_stacks, CollapsedStack};
