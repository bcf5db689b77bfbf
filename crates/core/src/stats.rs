//! Simulation statistics collection and reporting.
//!
//! This module tracks the simulator's published metrics. It provides:
//! 1. **Global counters:** instruction counts maintained by the front-end
//!    dispatch layer, with per-interval shadows for periodic dumps.
//! 2. **Core counters:** the soft-error tallies each timing model keeps
//!    (mispredictions, fetch stalls, issue stalls).
//! 3. **Reports:** an aggregate snapshot with sectioned printing.
//! 4. **Periodic backend:** the sink flushed every `interval_size`
//!    instructions.

/// Process-wide instruction accounting.
///
/// `total_pcount` advances when a deferred block is handed to its core, so
/// a core's retired-instruction count must equal it after every simulated
/// block. The interval shadows reset at each periodic dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalCounters {
    /// Instructions observed by the front-end.
    pub total_icount: u64,
    /// Instructions handed to the timing cores.
    pub total_pcount: u64,
    /// Front-end instructions since the last periodic dump.
    pub interval_icount: u64,
    /// Simulated instructions since the last periodic dump.
    pub interval_pcount: u64,
}

/// Soft-error counters a timing model maintains; models fill only the
/// hazards they simulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreCounters {
    /// Mispredicted conditional branches.
    pub mispred_branches: u64,
    /// Cycles the decoders waited on instruction fetch.
    pub fetch_stalls: u64,
    /// Cycles lost to the issue-width limit.
    pub issue_stalls: u64,
}

/// Snapshot of one core's published statistics.
#[derive(Debug, Clone)]
pub struct CoreReport {
    /// Core name.
    pub name: String,
    /// Simulated unhalted cycles.
    pub cycles: u64,
    /// Cycles due to contention stalls.
    pub c_cycles: u64,
    /// Retired instructions.
    pub instrs: u64,
    /// Model-specific soft-error counters.
    pub counters: CoreCounters,
}

/// Aggregate snapshot of a simulation.
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Global instruction accounting at snapshot time.
    pub counters: GlobalCounters,
    /// One entry per bound core.
    pub cores: Vec<CoreReport>,
}

/// Section names for selective stats output.
///
/// Valid identifiers: `"summary"`, `"cores"`. Pass an empty slice to
/// `print_sections` to print everything.
pub const STATS_SECTIONS: &[&str] = &["summary", "cores"];

impl SimReport {
    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`];
    /// an empty slice prints all sections.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);

        if want("summary") {
            println!("==========================================================");
            println!("OOO TIMING SIMULATION STATISTICS");
            println!("==========================================================");
            println!("sim_icount               {}", self.counters.total_icount);
            println!("sim_pcount               {}", self.counters.total_pcount);
            println!("----------------------------------------------------------");
        }
        if want("cores") {
            for core in &self.cores {
                let instrs = if core.instrs == 0 { 1 } else { core.instrs };
                let cycles = if core.cycles == 0 { 1 } else { core.cycles };
                println!("{}", core.name);
                println!("  cycles                 {}", core.cycles);
                println!("  cCycles                {}", core.c_cycles);
                println!("  instrs                 {}", core.instrs);
                println!(
                    "  ipc                    {:.4}",
                    core.instrs as f64 / cycles as f64
                );
                println!(
                    "  cpi                    {:.4}",
                    core.cycles as f64 / instrs as f64
                );
                println!("  mispredBranches        {}", core.counters.mispred_branches);
                println!("  fetchStalls            {}", core.counters.fetch_stalls);
                println!("  issueStalls            {}", core.counters.issue_stalls);
                println!("----------------------------------------------------------");
            }
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}

/// Sink for the periodic stats flush.
pub trait PeriodicBackend {
    /// Dumps the interval counters; `is_final` marks the end-of-run flush.
    fn dump(&mut self, is_final: bool, counters: &GlobalCounters);
}

/// Discards periodic dumps; the default for library use and tests.
#[derive(Debug, Default)]
pub struct NullBackend;

impl PeriodicBackend for NullBackend {
    fn dump(&mut self, _is_final: bool, _counters: &GlobalCounters) {}
}

/// Logs interval progress to stderr; used by the CLI driver.
#[derive(Debug, Default)]
pub struct StderrBackend;

impl PeriodicBackend for StderrBackend {
    fn dump(&mut self, is_final: bool, counters: &GlobalCounters) {
        eprintln!(
            "interval_icount: {} total_icount: {}{}",
            counters.interval_icount,
            counters.total_icount,
            if is_final { " (final)" } else { "" }
        );
    }
}
