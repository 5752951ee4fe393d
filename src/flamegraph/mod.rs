//! Retention flamegraphs.
//!
//! This module converts collapsed dominator stacks into SVG flamegraphs
//! and renders terminal summaries of the largest retainers.

pub mod generator;

// Re-export main types
pub use generator::{
    format_bytes, generate_flamegraph, generate_text_summary, FlamegraphConfig,
};
