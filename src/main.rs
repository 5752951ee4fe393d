//! Heapsight CLI
//!
//! Heap snapshot forensics for managed runtimes.
//! Generates retention reports and flamegraphs from heap snapshots.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use heapsight::commands::{
    display_schema, display_version, execute_analyze, validate_args, validate_report_file,
    AnalyzeArgs,
};
use heapsight::flamegraph::FlamegraphConfig;
use heapsight::heap::SizeMode;
use heapsight::utils::config::{AnalysisConfig, DEFAULT_FLAMEGRAPH_WIDTH, DEFAULT_TOP_RETAINERS};

/// Heapsight - who keeps this memory alive?
#[derive(Parser, Debug)]
#[command(name = "heapsight")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a heap snapshot
    Analyze {
        /// Heap snapshot JSON file
        #[arg(short, long, env = "HEAPSIGHT_SNAPSHOT")]
        snapshot: PathBuf,

        /// Output path for JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Output path for SVG retention flamegraph (optional)
        #[arg(short, long)]
        flamegraph: Option<PathBuf>,

        /// Number of top retainers to include
        #[arg(long, default_value_t = DEFAULT_TOP_RETAINERS)]
        top: usize,

        /// Treat GC handles as weak roots
        #[arg(long)]
        weak_handles: bool,

        /// Group static roots by class, namespace and assembly
        #[arg(long)]
        group_statics: bool,

        /// Use declared type sizes instead of committed sizes
        #[arg(long)]
        declared_sizes: bool,

        /// Report bytes retained by instances of this type
        #[arg(long)]
        type_filter: Option<String>,

        /// Explain why the object at this address is alive
        #[arg(long)]
        backtrace: Option<String>,

        /// Flamegraph title
        #[arg(long)]
        title: Option<String>,

        /// Flamegraph width in pixels
        #[arg(long, default_value_t = DEFAULT_FLAMEGRAPH_WIDTH)]
        width: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Analyze {
            snapshot,
            output,
            flamegraph,
            top,
            weak_handles,
            group_statics,
            declared_sizes,
            type_filter,
            backtrace,
            title,
            width,
            summary,
        } => {
            // Create flamegraph config
            let fg_config = if flamegraph.is_some() {
                let mut config = FlamegraphConfig::new().with_width(width);
                if let Some(title_str) = title {
                    config = config.with_title(title_str);
                }
                Some(config)
            } else {
                None
            };

            let args = AnalyzeArgs {
                snapshot,
                output_json: output,
                output_svg: flamegraph,
                top_retainers: top,
                analysis: AnalysisConfig {
                    weak_gc_handles: weak_handles,
                    group_statics,
                    size_mode: if declared_sizes {
                        SizeMode::Declared
                    } else {
                        SizeMode::Committed
                    },
                    type_filter,
                },
                backtrace,
                flamegraph_config: fg_config,
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            execute_analyze(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
