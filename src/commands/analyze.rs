//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Loads the heap snapshot
//! 2. Traces live objects from the roots
//! 3. Indexes the object graph (optionally grouping static roots)
//! 4. Builds the dominator tree and retention metrics
//! 5. Generates the retention flamegraph
//! 6. Writes the report

use super::models::AnalyzeArgs;
use crate::aggregator::{
    build_dominator_stacks, calculate_size_distribution, create_retainer, group_retention,
    retained_by_type, top_retainers, CollapsedStack, SizeDistribution,
};
use crate::dominance::{DominatorTree, SizeAggregator};
use crate::flamegraph::{format_bytes, generate_flamegraph, generate_text_summary};
use crate::graph::{
    shortest_path_to_process, GraphIndexer, GroupSummarizer, HeapGraph, HeapTrace, HeapTracer,
    IndexerConfig, NodeIndex, TracerConfig,
};
use crate::heap::{Address, HeapMemory, RootEnumerator};
use crate::output::{
    write_report, write_svg, Backtrace, Diagnostics, HeapReport, Retainer, TypeFilterSummary,
    TypeRetention,
};
use crate::snapshot::{load_snapshot, parse_address, HeapSnapshot};
use crate::utils::config::{MAX_STACK_DEPTH, MAX_TOP_RETAINERS, REPORT_SCHEMA_VERSION};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Instant;

/// Invalid pointers quoted verbatim in the report
const DIAGNOSTIC_SAMPLES: usize = 5;

/// Everything derived from one dominator tree
struct Retention {
    total_bytes: u64,
    top_retainers: Vec<Retainer>,
    retained_by_type: Vec<TypeRetention>,
    groups: Vec<Retainer>,
    type_filter: Option<TypeFilterSummary>,
    backtrace: Option<Vec<Retainer>>,
    stacks: Vec<CollapsedStack>,
    distribution: SizeDistribution,
}

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Returns
/// The report that was written to `args.output_json`
///
/// # Errors
/// * Snapshot read or format errors
/// * `--type-filter` names a type with no live instances
/// * File write errors
pub fn execute_analyze(args: AnalyzeArgs) -> Result<HeapReport> {
    let start_time = Instant::now();

    info!("Starting analysis of snapshot: {}", args.snapshot.display());

    // Step 1: Load snapshot
    info!("Step 1/6: Loading snapshot...");
    let heap = load_snapshot(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;

    debug!("Snapshot: {} objects, {} types", heap.object_count(), heap.type_count());

    let backtrace_address = args
        .backtrace
        .as_deref()
        .map(parse_address)
        .transpose()
        .context("Invalid backtrace address")?;

    // Step 2: Trace
    info!("Step 2/6: Tracing live objects...");
    let tracer = HeapTracer::new(TracerConfig {
        weak_gc_handles: args.analysis.weak_gc_handles,
    });
    let trace = tracer.trace(&heap, &heap.roots());

    // Step 3: Index
    info!("Step 3/6: Indexing object graph...");
    let indexer = GraphIndexer::new(
        &trace,
        &heap,
        &heap,
        IndexerConfig {
            size_mode: args.analysis.size_mode,
        },
    );

    // Object nodes keep their index under grouping, so the lookup is shared
    let backtrace_node = backtrace_address.and_then(|address| {
        let node = indexer.node_for_address(address);
        if node.is_none() {
            warn!("0x{:x} is not a live object; no backtrace", address);
        }
        node
    });

    // Step 4: Dominators
    let retention = if args.analysis.group_statics {
        let grouped = GroupSummarizer::new(&indexer);
        info!(
            "Step 4/6: Building dominator tree ({} classes, {} namespaces, {} assemblies)...",
            grouped.class_count(),
            grouped.namespace_count(),
            grouped.assembly_count()
        );
        compute_retention(&grouped, &args, backtrace_node)?
    } else {
        info!("Step 4/6: Building dominator tree...");
        compute_retention(&indexer, &args, backtrace_node)?
    };

    info!("Size distribution: {}", retention.distribution.summary());
    if retention.distribution.is_highly_concentrated() {
        info!("Most memory sits in a few large objects");
    }

    // Step 5: Generate flamegraph (if requested)
    let svg_content = match &args.output_svg {
        Some(_) if retention.stacks.is_empty() => {
            warn!("Step 5/6: Nothing reachable; skipping flamegraph");
            None
        }
        Some(_) => {
            info!("Step 5/6: Generating flamegraph...");
            let svg = generate_flamegraph(&retention.stacks, args.flamegraph_config.as_ref())
                .context("Failed to generate flamegraph")?;
            Some(svg)
        }
        None => {
            info!("Step 5/6: Skipping flamegraph generation (not requested)");
            None
        }
    };

    // Step 6: Write outputs
    info!("Step 6/6: Writing output files...");

    let report = HeapReport {
        version: REPORT_SCHEMA_VERSION.to_string(),
        snapshot: args.snapshot.display().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        object_count: trace.object_count(),
        root_count: trace.roots().len(),
        total_bytes: retention.total_bytes,
        grouped: args.analysis.group_statics,
        weak_gc_handles: trace.weak_gc_handles(),
        diagnostics: diagnostics(&trace, &heap),
        top_retainers: retention.top_retainers,
        retained_by_type: retention.retained_by_type,
        groups: retention.groups,
        type_filter: retention.type_filter,
        backtrace: backtrace_address
            .zip(retention.backtrace)
            .map(|(address, path)| Backtrace {
                address: format!("0x{:x}", address),
                path,
            }),
    };

    write_report(&report, &args.output_json).context("Failed to write report JSON")?;
    info!("✓ Report written to: {}", args.output_json.display());

    if let (Some(svg), Some(svg_path)) = (svg_content, &args.output_svg) {
        write_svg(&svg, svg_path).context("Failed to write flamegraph SVG")?;
        info!("✓ Flamegraph written to: {}", svg_path.display());
    }

    if args.print_summary {
        print_summary(&report, &retention.distribution);
    }

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(report)
}

/// Build the dominator tree over `graph` and derive all metrics from it
///
/// **Private** - shared by the plain and grouped pipelines
fn compute_retention<G: HeapGraph + ?Sized>(
    graph: &G,
    args: &AnalyzeArgs,
    backtrace_node: Option<NodeIndex>,
) -> Result<Retention> {
    let tree = DominatorTree::build(graph);
    let total_bytes = tree.total_size();

    debug!("Dominator tree converged in {} passes", tree.pass_count());

    let type_filter = match args.analysis.type_filter.as_deref() {
        Some(name) => Some(summarize_type_filter(&tree, name)?),
        None => None,
    };

    let backtrace = backtrace_node.and_then(|node| {
        let path = shortest_path_to_process(graph, node);
        if path.is_none() {
            warn!("Node {} has no path to the process node", node);
        }
        path.map(|path| path.into_iter().map(|n| create_retainer(&tree, n)).collect())
    });

    let stacks = if args.output_svg.is_some() {
        build_dominator_stacks(&tree, MAX_STACK_DEPTH)
    } else {
        Vec::new()
    };

    Ok(Retention {
        total_bytes,
        top_retainers: top_retainers(&tree, args.top_retainers),
        retained_by_type: retained_by_type(&tree),
        groups: group_retention(&tree),
        type_filter,
        backtrace,
        stacks,
        distribution: calculate_size_distribution(&tree),
    })
}

/// Retained bytes of one type, looked up by name in the analysed graph
fn summarize_type_filter<G: HeapGraph + ?Sized>(
    tree: &DominatorTree<'_, G>,
    name: &str,
) -> Result<TypeFilterSummary> {
    let sizes = SizeAggregator::for_type_name(tree, name)
        .with_context(|| format!("Type '{}' has no live instances in snapshot", name))?;
    let total_bytes = tree.total_size();
    let percentage = if total_bytes > 0 {
        (sizes.total() as f64 / total_bytes as f64) * 100.0
    } else {
        0.0
    };
    info!(
        "Type filter '{}': {} instances retain {}",
        name,
        sizes.matched_count(),
        format_bytes(sizes.total())
    );
    Ok(TypeFilterSummary {
        type_name: name.to_string(),
        matched_nodes: sizes.matched_count(),
        retained_bytes: sizes.total(),
        percentage,
    })
}

/// Summarize the tracer's diagnostics
fn diagnostics(trace: &HeapTrace, heap: &HeapSnapshot) -> Diagnostics {
    let invalid_pointers = trace.invalid_pointers();
    if !trace.invalid_roots().is_empty() || !invalid_pointers.is_empty() {
        warn!(
            "Snapshot has {} invalid roots and {} invalid pointers",
            trace.invalid_roots().len(),
            invalid_pointers.len()
        );
    }

    let samples = invalid_pointers
        .iter()
        .take(DIAGNOSTIC_SAMPLES)
        .map(|pointer| {
            let field = heap
                .resolve_type(pointer.referrer)
                .and_then(|type_index| heap.field_name(type_index, pointer.field))
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", pointer.field));
            format!(
                "0x{:x}.{} -> 0x{:x}",
                pointer.referrer, field, pointer.target
            )
        })
        .collect();

    Diagnostics {
        invalid_roots: trace.invalid_roots().len(),
        invalid_pointers: invalid_pointers.len(),
        skipped_weak_roots: trace.skipped_weak_roots(),
        samples,
    }
}

fn print_summary(report: &HeapReport, distribution: &SizeDistribution) {
    println!("\n{}", "=".repeat(80));
    println!("HEAP SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Snapshot:   {}", report.snapshot);
    println!("Objects:    {}", report.object_count);
    println!("Roots:      {}", report.root_count);
    println!("Reachable:  {}", format_bytes(report.total_bytes));
    println!("Median Obj: {}", format_bytes(distribution.median_object_size));
    println!(
        "\n{}",
        generate_text_summary(&report.top_retainers, 10, report.total_bytes)
    );

    if !report.groups.is_empty() {
        println!("\n  GROUPS");
        for group in report.groups.iter().take(10) {
            println!(
                "  {:<60} {:>12}",
                group.description,
                format_bytes(group.inclusive_bytes)
            );
        }
    }

    if let Some(filter) = &report.type_filter {
        println!(
            "\n  {} ({} instances) retains {} ({:.1}%)",
            filter.type_name,
            filter.matched_nodes,
            format_bytes(filter.retained_bytes),
            filter.percentage
        );
    }

    if let Some(backtrace) = &report.backtrace {
        println!("\n  WHY IS {} ALIVE?", backtrace.address);
        for (depth, step) in backtrace.path.iter().enumerate() {
            println!("  {}{}", "  ".repeat(depth), step.description);
        }
    }

    println!("{}", "=".repeat(80));
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.snapshot.as_os_str().is_empty() {
        anyhow::bail!("Snapshot path cannot be empty");
    }

    if args.output_json.as_os_str().is_empty() {
        anyhow::bail!("Output path cannot be empty");
    }

    if args.top_retainers == 0 {
        anyhow::bail!("top must be greater than 0");
    }

    if args.top_retainers > MAX_TOP_RETAINERS {
        anyhow::bail!("top is too large (max {})", MAX_TOP_RETAINERS);
    }

    if let Some(address) = &args.backtrace {
        let _: Address = parse_address(address)
            .with_context(|| format!("Invalid backtrace address '{}'", address))?;
    }

    if let Some(name) = &args.analysis.type_filter {
        if name.trim().is_empty() {
            anyhow::bail!("Type filter cannot be empty");
        }
    }

    if let Some(config) = &args.flamegraph_config {
        if config.width == 0 {
            anyhow::bail!("Flamegraph width must be greater than 0");
        }
    }

    Ok(())
}
