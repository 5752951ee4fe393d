use crate::flamegraph::FlamegraphConfig;
use crate::utils::config::{AnalysisConfig, DEFAULT_TOP_RETAINERS};
use std::path::PathBuf;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Heap snapshot (JSON) to analyse
    pub snapshot: PathBuf,

    /// Output path for JSON report
    pub output_json: PathBuf,

    /// Output path for SVG retention flamegraph (optional)
    pub output_svg: Option<PathBuf>,

    /// Number of top retainers to include in the report
    pub top_retainers: usize,

    /// Stage options (weak handles, grouping, size mode, type filter)
    pub analysis: AnalysisConfig,

    /// Object address to explain, decimal or 0x-prefixed hex
    pub backtrace: Option<String>,

    /// Flamegraph configuration
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::new(),
            output_json: PathBuf::from("report.json"),
            output_svg: None,
            top_retainers: DEFAULT_TOP_RETAINERS,
            analysis: AnalysisConfig::default(),
            backtrace: None,
            flamegraph_config: None,
            print_summary: false,
        }
    }
}
