use crate::flamegraph::format_bytes;
use crate::output::read_report;
use crate::utils::config::REPORT_SCHEMA_VERSION;
use anyhow::Result;
use std::path::PathBuf;

/// Validate a report JSON file
pub fn validate_report_file(file_path: PathBuf) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    if report.version != REPORT_SCHEMA_VERSION {
        log::warn!(
            "Report schema v{} differs from current v{}",
            report.version,
            REPORT_SCHEMA_VERSION
        );
    }

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Snapshot: {}", report.snapshot);
    println!("  Objects: {}", report.object_count);
    println!("  Roots: {}", report.root_count);
    println!("  Reachable: {}", format_bytes(report.total_bytes));
    println!("  Top Retainers: {}", report.top_retainers.len());
    println!(
        "  Invalid roots / pointers: {} / {}",
        report.diagnostics.invalid_roots, report.diagnostics.invalid_pointers
    );

    Ok(())
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Heapsight Report Schema");
    println!("Current Version: {}", REPORT_SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string            - Schema version (e.g., '1.0.0')");
        println!("  snapshot: string           - Snapshot the report was computed from");
        println!("  generated_at: string       - RFC 3339 timestamp");
        println!("  object_count: number       - Live objects");
        println!("  root_count: number         - Walked roots");
        println!("  total_bytes: number        - Reachable bytes");
        println!("  grouped: bool              - Static roots grouped by class/namespace/assembly");
        println!("  weak_gc_handles: bool      - GC handles treated as weak");
        println!("  diagnostics: object        - Invalid roots and pointers");
        println!("  top_retainers: array       - Nodes retaining the most bytes");
        println!("    node: number             - Node index");
        println!("    kind: string             - object, root, class, namespace, assembly");
        println!("    description: string      - Human-readable node name");
        println!("    exclusive_bytes: number  - Own size");
        println!("    inclusive_bytes: number  - Retained size");
        println!("    percentage: number       - Share of reachable bytes");
        println!("  retained_by_type: array    - Count, own and retained bytes per type");
        println!("  groups: array?             - Retained bytes per group (grouped runs)");
        println!("  type_filter: object?       - Retention restricted to one type");
        println!("  backtrace: object?         - Retention path of one object");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Heapsight v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", REPORT_SCHEMA_VERSION);
    println!();
    println!("Heap snapshot forensics: who keeps this memory alive.");
}
