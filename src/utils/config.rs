//! Configuration and constants for the analysis pipeline.

use crate::heap::SizeMode;

/// Current report schema version
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Default number of top retainers written to a report
pub const DEFAULT_TOP_RETAINERS: usize = 20;

/// Upper bound accepted for `--top`
pub const MAX_TOP_RETAINERS: usize = 1000;

/// Default flamegraph width in pixels
pub const DEFAULT_FLAMEGRAPH_WIDTH: usize = 1200;

/// Dominator chains deeper than this are folded into their ancestor
/// when building flamegraph stacks
pub const MAX_STACK_DEPTH: usize = 64;

// Placeholder names used when a static root carries no origin metadata
pub const UNKNOWN_ASSEMBLY: &str = "<unknown assembly>";
pub const UNKNOWN_NAMESPACE: &str = "<global>";
pub const UNKNOWN_CLASS: &str = "<unknown class>";

/// Named flags that decide how each stage is built.
///
/// Every flag belongs to exactly one stage; changing it means rebuilding
/// that stage and everything layered on top of it:
/// - `weak_gc_handles` - tracer (and therefore everything)
/// - `size_mode` - graph indexer and dominator sizes
/// - `group_statics` - group summarizer and dominator tree
/// - `type_filter` - size aggregator only
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Treat GC-handle roots as weak (they are not walked)
    pub weak_gc_handles: bool,

    /// Fold static roots into class / namespace / assembly groups
    pub group_statics: bool,

    /// Which object size counts as exclusive size
    pub size_mode: SizeMode,

    /// Restrict retained sizes to a type name
    pub type_filter: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            weak_gc_handles: false,
            group_statics: false,
            size_mode: SizeMode::Committed,
            type_filter: None,
        }
    }
}
