//! Out-of-order timing-core simulator CLI.
//!
//! Streams a recorded JSON-lines trace through the configured timing model
//! and prints the statistics report. Configuration is JSON; without a
//! config file the built-in defaults are used.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::{fs, process};

use ooo_core::Config;
use ooo_core::SimContext;
use ooo_core::sim::read_trace;
use ooo_core::stats::{STATS_SECTIONS, StderrBackend};

#[derive(Parser, Debug)]
#[command(
    name = "oosim",
    author,
    version,
    about = "Trace-driven out-of-order timing-core simulator",
    long_about = "Replay a recorded instruction trace through one of the three timing models \
(Cache, Fetch, Issue).\n\nExamples:\n  oosim run -t traces/qsort.jsonl\n  oosim run -t traces/qsort.jsonl -c configs/fetch.json --stats summary"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace file and print the statistics report.
    Run {
        /// Trace file (JSON lines).
        #[arg(short, long)]
        trace: PathBuf,

        /// Configuration file (JSON). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Statistics sections to print (default: all).
        #[arg(long)]
        stats: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            trace,
            config,
            stats,
        } => cmd_run(&trace, config.as_deref(), &stats),
    }
}

/// Runs the simulator: builds the context, joins every core, streams the
/// trace, and prints the report.
fn cmd_run(trace_path: &Path, config_path: Option<&Path>, stats: &[String]) {
    for section in stats {
        if !STATS_SECTIONS.contains(&section.as_str()) {
            eprintln!("unknown stats section '{section}' (expected one of {STATS_SECTIONS:?})");
            process::exit(1);
        }
    }

    let config: Config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("error reading config {}: {e}", path.display());
                process::exit(1);
            });
            serde_json::from_str(&text).unwrap_or_else(|e| {
                eprintln!("error parsing config {}: {e}", path.display());
                process::exit(1);
            })
        }
        None => Config::default(),
    };
    config.validate();

    let records = read_trace(trace_path).unwrap_or_else(|e| {
        eprintln!("error loading trace {}: {e}", trace_path.display());
        process::exit(1);
    });

    let mut ctx = SimContext::new(&config);
    ctx.set_periodic_backend(Box::new(StderrBackend));

    for tid in 0..config.general.num_cores {
        ctx.join(tid);
    }
    ctx.run(&records);
    for tid in 0..config.general.num_cores {
        ctx.leave(tid);
    }

    let counters = ctx.globals.counters;
    ctx.globals.periodic.dump(true, &counters);
    ctx.report().print_sections(stats);
}
