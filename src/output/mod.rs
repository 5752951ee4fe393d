//! Output writers for heap reports and flamegraphs.
//!
//! This module handles writing data to disk in various formats:
//! - JSON reports (pretty, consistency-checked)
//! - SVG flamegraphs
//!
//! Both writers stage their output next to the destination and rename it
//! into place.

mod fs;
pub mod json;
pub mod schema;
pub mod svg;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report};
pub use schema::{
    Backtrace, Diagnostics, HeapReport, Retainer, TypeFilterSummary, TypeRetention,
};
pub use svg::write_svg;
