//! Contention-recorder glue between a core and the global phase model.
//!
//! During the bound phase each core logs its memory accesses as
//! (issue, request, response) cycle triples and keeps running totals of
//! scheduling gaps. The contention-simulation epoch bracketed by
//! `c_sim_start`/`c_sim_end` replays the logged accesses in a weave
//! backend; the recorder exposes the resulting targets and the
//! halted-cycle accounting the statistics contract needs.

use crate::common::Cycle;

/// One memory access logged during the bound phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    /// Issue-stage cycle at which the access was generated.
    pub issue_cycle: Cycle,
    /// Cycle the request left the core.
    pub req_cycle: Cycle,
    /// Cycle the response arrived.
    pub resp_cycle: Cycle,
}

/// Per-core recorder for gap accounting and weave-phase access replay.
#[derive(Debug, Default)]
pub struct CoreRecorder {
    /// Cycles spent descheduled; excluded from the unhalted count.
    gap_cycles: u64,
    /// Stall cycles attributed to cross-core contention by a weave backend.
    contention_cycles: u64,
    accesses: Vec<AccessRecord>,
}

impl CoreRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs a memory access for the next weave epoch.
    #[inline]
    pub fn record(&mut self, issue_cycle: Cycle, req_cycle: Cycle, resp_cycle: Cycle) {
        self.accesses.push(AccessRecord {
            issue_cycle,
            req_cycle,
            resp_cycle,
        });
    }

    /// Accesses logged since the last weave epoch.
    pub fn accesses(&self) -> &[AccessRecord] {
        &self.accesses
    }

    /// Called when the owning thread regains a hardware context.
    ///
    /// Returns the cycle the core must advance to: descheduled time is
    /// bridged to the global phase clock and counted as a gap.
    pub fn notify_join(&mut self, cur_cycle: Cycle, glob_phase_cycles: Cycle) -> Cycle {
        if glob_phase_cycles > cur_cycle {
            self.gap_cycles += glob_phase_cycles - cur_cycle;
            glob_phase_cycles
        } else {
            cur_cycle
        }
    }

    /// Called when the owning thread loses its hardware context.
    pub fn notify_leave(&mut self, _cur_cycle: Cycle) {}

    /// Opens a contention-simulation epoch; the logged accesses are handed
    /// to the weave backend. Returns the cycle the core must advance to.
    pub fn c_sim_start(&mut self, cur_cycle: Cycle) -> Cycle {
        self.accesses.clear();
        cur_cycle
    }

    /// Closes the contention-simulation epoch. Returns the cycle the core
    /// must advance to once cross-core stalls are merged.
    pub fn c_sim_end(&mut self, cur_cycle: Cycle) -> Cycle {
        cur_cycle
    }

    /// Cycles the core actually ran, excluding descheduled gaps.
    #[inline]
    pub fn unhalted_cycles(&self, cur_cycle: Cycle) -> u64 {
        cur_cycle - self.gap_cycles
    }

    /// Stall cycles attributed to cross-core contention.
    #[inline]
    pub fn contention_cycles(&self) -> u64 {
        self.contention_cycles
    }
}
