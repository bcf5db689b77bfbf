//! Simulation plumbing around the timing cores.
//!
//! This module owns everything process-wide:
//! 1. **Context:** the thread → core dispatch table, global counters,
//!    phase clock, and the front-end event dispatch.
//! 2. **Barrier:** the rendezvous that synchronises cores at phase
//!    boundaries and may migrate threads between contexts.
//! 3. **Trace:** serialisable front-end event records and a JSON-lines
//!    loader.

/// Phase-barrier contract and the single-process realisation.
pub mod barrier;
/// Per-process simulation context and event dispatch.
pub mod context;
/// Trace records and the JSON-lines loader.
pub mod trace;

pub use self::barrier::{Barrier, FixedBarrier};
pub use self::context::{SimContext, SimGlobals};
pub use self::trace::{TraceRecord, read_trace};
