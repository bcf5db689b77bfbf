//! Configuration system for the timing-core simulator.
//!
//! This module defines all configuration structures used to parameterize the
//! simulator. It provides:
//! 1. **Defaults:** baseline hardware constants (pipeline widths, queue
//!    capacities, predictor geometry, filter-cache size).
//! 2. **Structures:** hierarchical config for general simulation settings,
//!    the out-of-order core, and the L1 filter caches.
//! 3. **Validation:** the capacity-ordering invariants the backend
//!    structures rely on.
//!
//! Configuration is supplied as JSON (`serde_json`) or via
//! `Config::default()`.

use serde::Deserialize;

/// Default configuration constants for the simulator.
mod defaults {
    /// Number of simulated cores (one software thread per core).
    pub const NUM_CORES: usize = 1;

    /// Cycles per barrier phase.
    pub const PHASE_LENGTH: u64 = 10_000;

    /// log2 of the cache line size (64-byte lines).
    pub const LINE_BITS: u32 = 6;

    /// Instructions between periodic stats dumps.
    pub const INTERVAL_SIZE: u64 = 10_000_000;

    /// Issue width (uops issued per cycle).
    pub const WIDTH: u32 = 4;

    /// Register-file read ports available per cycle.
    pub const PRF_PORTS: u32 = 2;

    /// Reorder-buffer capacity.
    pub const ROB_CAP: usize = 128;

    /// Instruction-window capacity.
    pub const INS_WIN_CAP: usize = 36;

    /// Uop-issue-queue capacity.
    pub const ISSUE_QUEUE_CAP: usize = 28;

    /// Load-queue capacity.
    pub const LOAD_QUEUE_CAP: usize = 32;

    /// Store-queue capacity.
    pub const STORE_QUEUE_CAP: usize = 32;

    /// Frontend fetch bandwidth in bytes per cycle.
    pub const FETCH_BYTES_PER_CYCLE: u64 = 16;

    /// Number of tagged TAGE tables (8, 16, ... 64 bits of history).
    pub const TAGE_NUM_TABLES: usize = 8;

    /// log2 of the per-table TAGE entry count.
    pub const TAGE_INDEX_SIZE: u32 = 12;

    /// Lines in the L1 filter cache.
    pub const FILTER_LINES: usize = 256;

    /// Cycles charged for a filter-cache miss.
    pub const FILTER_MISS_LATENCY: u64 = 100;
}

/// Which timing model each core runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CoreModelKind {
    /// Data-cache timing only; fixed-latency frontend, no branch prediction.
    Cache,
    /// Instruction-fetch and branch-prediction timing; no LSU timing.
    Fetch,
    /// Backend structural-hazard timing (IW, ROB, LSQs, RF ports).
    #[default]
    Issue,
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use ooo_core::config::{Config, CoreModelKind};
///
/// let json = r#"{
///     "general": { "num_cores": 1, "model": "Fetch" },
///     "core": { "width": 4, "rob_cap": 128 },
///     "cache": { "num_lines": 256, "miss_latency": 100 }
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// config.validate();
/// assert_eq!(config.general.model, CoreModelKind::Fetch);
/// assert_eq!(config.core.width, 4);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Out-of-order core parameters.
    #[serde(default)]
    pub core: OOOParams,
    /// L1 filter-cache parameters.
    #[serde(default)]
    pub cache: FilterCacheConfig,
}

impl Config {
    /// Validates the whole configuration tree.
    ///
    /// # Panics
    ///
    /// Panics with a diagnostic if any structural invariant is violated;
    /// a bad configuration must never reach the timing models.
    pub fn validate(&self) {
        assert!(self.general.num_cores > 0, "at least one core is required");
        assert!(
            self.general.line_bits > 0 && self.general.line_bits < 16,
            "line_bits must be in (0, 16)"
        );
        assert!(self.general.phase_length > 0, "phase_length must be non-zero");
        self.core.validate();
        self.cache.validate();
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Number of cores (and software threads).
    #[serde(default = "GeneralConfig::default_num_cores")]
    pub num_cores: usize,

    /// Timing model to instantiate per core.
    #[serde(default)]
    pub model: CoreModelKind,

    /// Cycles per barrier phase.
    #[serde(default = "GeneralConfig::default_phase_length")]
    pub phase_length: u64,

    /// log2 of the cache line size.
    #[serde(default = "GeneralConfig::default_line_bits")]
    pub line_bits: u32,

    /// Instructions between periodic stats dumps.
    #[serde(default = "GeneralConfig::default_interval_size")]
    pub interval_size: u64,
}

impl GeneralConfig {
    /// Returns the default core count.
    fn default_num_cores() -> usize {
        defaults::NUM_CORES
    }

    /// Returns the default phase length in cycles.
    fn default_phase_length() -> u64 {
        defaults::PHASE_LENGTH
    }

    /// Returns the default log2 line size.
    fn default_line_bits() -> u32 {
        defaults::LINE_BITS
    }

    /// Returns the default periodic-dump interval.
    fn default_interval_size() -> u64 {
        defaults::INTERVAL_SIZE
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            num_cores: defaults::NUM_CORES,
            model: CoreModelKind::default(),
            phase_length: defaults::PHASE_LENGTH,
            line_bits: defaults::LINE_BITS,
            interval_size: defaults::INTERVAL_SIZE,
        }
    }
}

/// Out-of-order core parameters.
///
/// The capacity ordering enforced by [`OOOParams::validate`] reflects how
/// the backend structures nest: uops cannot occupy the instruction window
/// without a ROB slot, and the LSQ entries are a subset of the window.
#[derive(Debug, Clone, Deserialize)]
pub struct OOOParams {
    /// Issue width (uops per cycle).
    #[serde(default = "OOOParams::default_width")]
    pub width: u32,

    /// Register-file read ports per cycle.
    #[serde(default = "OOOParams::default_prf_ports")]
    pub prf_ports: u32,

    /// Reorder-buffer capacity.
    #[serde(default = "OOOParams::default_rob_cap")]
    pub rob_cap: usize,

    /// Instruction-window capacity.
    #[serde(default = "OOOParams::default_ins_win_cap")]
    pub ins_win_cap: usize,

    /// Uop-issue-queue capacity.
    #[serde(default = "OOOParams::default_issue_queue_cap")]
    pub issue_queue_cap: usize,

    /// Load-queue capacity.
    #[serde(default = "OOOParams::default_load_queue_cap")]
    pub load_queue_cap: usize,

    /// Store-queue capacity.
    #[serde(default = "OOOParams::default_store_queue_cap")]
    pub store_queue_cap: usize,

    /// Frontend fetch bandwidth in bytes per cycle.
    #[serde(default = "OOOParams::default_fetch_bytes")]
    pub fetch_bytes_per_cycle: u64,

    /// Number of tagged TAGE tables (at most 8).
    #[serde(default = "OOOParams::default_tage_num_tables")]
    pub tage_num_tables: usize,

    /// log2 of the per-table TAGE entry count (at most 64).
    #[serde(default = "OOOParams::default_tage_index_size")]
    pub tage_index_size: u32,
}

impl OOOParams {
    /// Returns the default issue width.
    fn default_width() -> u32 {
        defaults::WIDTH
    }

    /// Returns the default register-file port count.
    fn default_prf_ports() -> u32 {
        defaults::PRF_PORTS
    }

    /// Returns the default ROB capacity.
    fn default_rob_cap() -> usize {
        defaults::ROB_CAP
    }

    /// Returns the default instruction-window capacity.
    fn default_ins_win_cap() -> usize {
        defaults::INS_WIN_CAP
    }

    /// Returns the default uop-queue capacity.
    fn default_issue_queue_cap() -> usize {
        defaults::ISSUE_QUEUE_CAP
    }

    /// Returns the default load-queue capacity.
    fn default_load_queue_cap() -> usize {
        defaults::LOAD_QUEUE_CAP
    }

    /// Returns the default store-queue capacity.
    fn default_store_queue_cap() -> usize {
        defaults::STORE_QUEUE_CAP
    }

    /// Returns the default fetch bandwidth.
    fn default_fetch_bytes() -> u64 {
        defaults::FETCH_BYTES_PER_CYCLE
    }

    /// Returns the default tagged-table count.
    fn default_tage_num_tables() -> usize {
        defaults::TAGE_NUM_TABLES
    }

    /// Returns the default TAGE index width.
    fn default_tage_index_size() -> u32 {
        defaults::TAGE_INDEX_SIZE
    }

    /// Validates the core parameters.
    ///
    /// # Panics
    ///
    /// Panics if the issue width is zero, the TAGE geometry is out of range,
    /// or the capacity ordering is violated.
    pub fn validate(&self) {
        assert!(self.width > 0, "issue width must be non-zero");
        assert!(self.prf_ports > 0, "prf_ports must be non-zero");
        assert!(
            self.fetch_bytes_per_cycle > 0,
            "fetch_bytes_per_cycle must be non-zero"
        );
        assert!(
            self.tage_num_tables >= 1 && self.tage_num_tables <= 8,
            "tage_num_tables must be in [1, 8]"
        );
        assert!(
            self.tage_index_size >= 2 && self.tage_index_size <= 64,
            "tage_index_size must be in [2, 64]"
        );
        assert!(
            self.rob_cap >= self.ins_win_cap,
            "rob_cap ({}) must be >= ins_win_cap ({})",
            self.rob_cap,
            self.ins_win_cap
        );
        assert!(
            self.ins_win_cap >= self.issue_queue_cap,
            "ins_win_cap ({}) must be >= issue_queue_cap ({})",
            self.ins_win_cap,
            self.issue_queue_cap
        );
        assert!(
            self.ins_win_cap >= self.load_queue_cap,
            "ins_win_cap ({}) must be >= load_queue_cap ({})",
            self.ins_win_cap,
            self.load_queue_cap
        );
        assert!(
            self.ins_win_cap >= self.store_queue_cap,
            "ins_win_cap ({}) must be >= store_queue_cap ({})",
            self.ins_win_cap,
            self.store_queue_cap
        );
        assert!(
            self.issue_queue_cap >= self.width as usize,
            "issue_queue_cap ({}) must be >= width ({})",
            self.issue_queue_cap,
            self.width
        );
    }
}

impl Default for OOOParams {
    fn default() -> Self {
        Self {
            width: defaults::WIDTH,
            prf_ports: defaults::PRF_PORTS,
            rob_cap: defaults::ROB_CAP,
            ins_win_cap: defaults::INS_WIN_CAP,
            issue_queue_cap: defaults::ISSUE_QUEUE_CAP,
            load_queue_cap: defaults::LOAD_QUEUE_CAP,
            store_queue_cap: defaults::STORE_QUEUE_CAP,
            fetch_bytes_per_cycle: defaults::FETCH_BYTES_PER_CYCLE,
            tage_num_tables: defaults::TAGE_NUM_TABLES,
            tage_index_size: defaults::TAGE_INDEX_SIZE,
        }
    }
}

/// L1 filter-cache parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterCacheConfig {
    /// Number of filter lines (power of two).
    #[serde(default = "FilterCacheConfig::default_num_lines")]
    pub num_lines: usize,

    /// Cycles charged on a filter miss.
    #[serde(default = "FilterCacheConfig::default_miss_latency")]
    pub miss_latency: u64,
}

impl FilterCacheConfig {
    /// Returns the default filter line count.
    fn default_num_lines() -> usize {
        defaults::FILTER_LINES
    }

    /// Returns the default miss latency.
    fn default_miss_latency() -> u64 {
        defaults::FILTER_MISS_LATENCY
    }

    /// Validates the filter-cache parameters.
    ///
    /// # Panics
    ///
    /// Panics if the line count is not a non-zero power of two.
    pub fn validate(&self) {
        assert!(
            self.num_lines.is_power_of_two(),
            "filter cache num_lines ({}) must be a power of two",
            self.num_lines
        );
    }
}

impl Default for FilterCacheConfig {
    fn default() -> Self {
        Self {
            num_lines: defaults::FILTER_LINES,
            miss_latency: defaults::FILTER_MISS_LATENCY,
        }
    }
}
