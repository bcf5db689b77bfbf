//! Trace-driven out-of-order x86 timing-core simulator.
//!
//! This crate implements the timing core of a cycle-accurate, trace-driven
//! simulator of a Nehalem/Westmere-class out-of-order pipeline:
//! 1. **Basic blocks:** decoded-BBL metadata (`BblInfo`, `DynUop`) and the
//!    `(addr, instrs)`-keyed decode cache.
//! 2. **Branch prediction:** a TAGE direction predictor with a folded global
//!    history window.
//! 3. **Timing models:** three separately-configurable engines:
//!    `CacheModel` (data-cache timing), `FetchModel` (frontend and branch
//!    prediction), and `IssueModel` (backend structural hazards).
//! 4. **Memory:** the L1 filter-cache interface and a line-granular
//!    implementation of it.
//! 5. **Simulation:** the per-process context (thread → core dispatch,
//!    global counters, phase barrier) and a JSON-lines trace driver.

/// Common scalar types and sentinels (addresses, cycles, thread ids).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Decoded basic blocks: per-uop metadata and the decode cache.
pub mod bbl;
/// Branch prediction (TAGE and its folded history window).
pub mod bpred;
/// Timing cores: shared skeleton, backend structures, and the three models.
pub mod core;
/// L1 filter-cache interface and implementation.
pub mod mem;
/// Simulation context, phase barrier, and trace driver.
pub mod sim;
/// Statistics counters, reports, and the periodic dump backend.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The three timing models behind one statically-dispatched wrapper.
pub use crate::core::CoreModel;
/// Per-process simulation state; owns the thread → core dispatch table.
pub use crate::sim::SimContext;
