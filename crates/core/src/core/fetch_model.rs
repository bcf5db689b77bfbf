//! Frontend and branch-prediction timing model.
//!
//! Executes uops with plain dataflow latencies and spends its detail on the
//! frontend: a TAGE predictor gates decode progress, mispredictions fetch
//! down the wrong path to model instruction-cache pollution, and the
//! instruction fetch of every block is throttled by the fetch bandwidth.

use std::sync::Arc;

use crate::bbl::BblInfo;
use crate::bpred::Tage;
use crate::common::{Address, Cycle};
use crate::config::OOOParams;
use crate::core::recorder::CoreRecorder;
use crate::core::{Core, CoreState, DECODE_STAGE, DISPATCH_STAGE, FETCH_STAGE, ISSUE_STAGE};
use crate::mem::FilterCache;
use crate::sim::SimGlobals;
use crate::stats::CoreCounters;

/// The conditional branch terminating the block in flight.
/// `pc == 0` means the block did not end in a conditional branch.
#[derive(Debug, Clone, Copy, Default)]
struct PendingBranch {
    pc: Address,
    taken: bool,
    taken_npc: Address,
    not_taken_npc: Address,
}

/// Frontend timing engine.
pub struct FetchModel {
    state: CoreState,
    l1i: Box<dyn FilterCache>,
    branch_pred: Tage,
    pending_branch: PendingBranch,
    fetch_bytes_per_cycle: u64,
    mispred_branches: u64,
    fetch_stalls: u64,
}

impl FetchModel {
    /// Creates a core timing its instruction fetches against `l1i`.
    pub fn new(
        l1i: Box<dyn FilterCache>,
        params: &OOOParams,
        name: String,
        phase_length: u64,
    ) -> Self {
        Self {
            state: CoreState::new(name, phase_length),
            l1i,
            branch_pred: Tage::new(params.tage_num_tables, params.tage_index_size),
            pending_branch: PendingBranch::default(),
            fetch_bytes_per_cycle: params.fetch_bytes_per_cycle,
            mispred_branches: 0,
            fetch_stalls: 0,
        }
    }

    /// Mispredicted conditional branches so far.
    pub fn mispred_branches(&self) -> u64 {
        self.mispred_branches
    }

    /// Runs the deferred block; only dataflow latencies matter here.
    /// Returns the last uop's commit cycle, which bounds how long a
    /// mispredicted branch can keep the frontend on the wrong path.
    fn simulate_prev(&mut self, prev: &BblInfo, globals: &SimGlobals) -> Cycle {
        let s = &mut self.state;

        let mut prev_dec_cycle: u32 = 0;
        let mut last_commit_cycle: Cycle = 0;

        for uop in &prev.bbl.uops {
            // Decode stalls
            let dec_diff = uop.dec_cycle - prev_dec_cycle;
            s.decode_cycle += Cycle::from(dec_diff);
            s.cur_cycle = s.cur_cycle.max(s.decode_cycle);
            prev_dec_cycle = uop.dec_cycle;

            let (c0, c1) = s.scoreboard.source_cycles(s.cur_cycle, uop.rs);
            let c_ops = c0.max(c1);

            // RAT + ROB + RS delay between issue and dispatch
            let dispatch_cycle = c_ops.max(s.cur_cycle + (DISPATCH_STAGE - ISSUE_STAGE));
            let commit_cycle = dispatch_cycle + Cycle::from(uop.lat);

            s.scoreboard.record_writes(uop.rd, commit_cycle);
            last_commit_cycle = commit_cycle;
        }

        s.instrs += u64::from(prev.instrs);
        assert_eq!(
            s.instrs, globals.counters.total_pcount,
            "{}: retired instruction count diverged from front-end accounting",
            s.name
        );

        last_commit_cycle
    }

    /// Frontend: branch prediction, wrong-path fetches, and the ifetch of
    /// the incoming block.
    fn fetch_current(
        &mut self,
        bbl_addr: Address,
        bbl_info: &BblInfo,
        last_commit_cycle: Cycle,
        globals: &SimGlobals,
    ) {
        let s = &mut self.state;
        let mut fetch_cycle = s.decode_cycle - (DECODE_STAGE - FETCH_STAGE);
        let line_size = 1u64 << globals.line_bits;

        let branch = self.pending_branch;
        if branch.pc != 0 {
            let target = if branch.taken {
                branch.taken_npc
            } else {
                branch.not_taken_npc
            };
            if !self.branch_pred.predict(branch.pc, branch.taken, target) {
                self.mispred_branches += 1;

                /* Fetch down the wrong path until the branch resolves.
                 * This is not charged as latency; it models the fetched
                 * code footprint and L1I pollution. The BTB is assumed
                 * perfect and the wrong path is assumed straight-line, so
                 * the fetch runs at most as far as a fully backpressured
                 * frontend can buffer: about five 64-byte lines. */
                let wrong_path_addr = if branch.taken {
                    branch.not_taken_npc
                } else {
                    branch.taken_npc
                };
                let mut req_cycle = fetch_cycle;
                for i in 0..(5 * 64 / line_size) {
                    let fetch_lat =
                        self.l1i.load(wrong_path_addr + line_size * i, s.cur_cycle) - s.cur_cycle;
                    s.rec.record(s.cur_cycle, s.cur_cycle, s.cur_cycle + fetch_lat);
                    let resp_cycle = req_cycle + fetch_lat;
                    if resp_cycle > last_commit_cycle {
                        break;
                    }
                    // fetch throughput limit
                    req_cycle = resp_cycle + line_size / self.fetch_bytes_per_cycle;
                }

                fetch_cycle = last_commit_cycle;
            }
        }
        self.pending_branch.pc = 0; // consumed

        // Fetch the incoming block at the frontend's access width.
        let end_addr = bbl_addr + u64::from(bbl_info.bytes);
        let step = line_size.min(self.fetch_bytes_per_cycle);
        let mut fetch_addr = bbl_addr;
        while fetch_addr < end_addr {
            let fetch_lat = self.l1i.load(fetch_addr, s.cur_cycle) - s.cur_cycle;
            s.rec.record(s.cur_cycle, s.cur_cycle, s.cur_cycle + fetch_lat);
            fetch_cycle += fetch_lat;
            fetch_addr += step;
        }

        // If fetch rules, charge the fetch-decode offset; if decode rules,
        // a block boundary costs the decoders one cycle.
        s.decode_cycle += 1;
        let min_fetch_dec_cycle = fetch_cycle + (DECODE_STAGE - FETCH_STAGE);
        if min_fetch_dec_cycle > s.decode_cycle {
            self.fetch_stalls += min_fetch_dec_cycle - s.decode_cycle;
            s.decode_cycle = min_fetch_dec_cycle;
        }
    }
}

impl Core for FetchModel {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn bbl(&mut self, bbl_addr: Address, bbl_info: &Arc<BblInfo>, globals: &mut SimGlobals) {
        let Some(prev) = self.state.defer_bbl(bbl_info) else {
            return;
        };
        let last_commit_cycle = self.simulate_prev(&prev, globals);
        self.fetch_current(bbl_addr, bbl_info, last_commit_cycle, globals);
        globals.flush_periodic_if_due();
    }

    fn branch(&mut self, pc: Address, taken: bool, taken_npc: Address, not_taken_npc: Address) {
        self.pending_branch = PendingBranch {
            pc,
            taken,
            taken_npc,
            not_taken_npc,
        };
    }

    fn join(&mut self, globals: &SimGlobals) {
        let s = &mut self.state;
        let target = s.rec.notify_join(s.cur_cycle, globals.glob_phase_cycles);
        if target > s.cur_cycle {
            s.advance(target);
        }
        s.phase_end_cycle = globals.glob_phase_cycles + globals.phase_length;
    }

    fn leave(&mut self) {
        self.state.rec.notify_leave(self.state.cur_cycle);
    }

    fn context_switch(&mut self, gid: i64) {
        if gid == -1 {
            // do not simulate the deferred block; we were switched out
            self.state.prev_bbl = None;
            self.l1i.context_switch();
        }
    }

    fn c_sim_start(&mut self) {
        let s = &mut self.state;
        let target = s.rec.c_sim_start(s.cur_cycle);
        if target > s.cur_cycle {
            s.advance(target);
        }
    }

    fn c_sim_end(&mut self) {
        let s = &mut self.state;
        let target = s.rec.c_sim_end(s.cur_cycle);
        if target > s.cur_cycle {
            s.advance(target);
        }
    }

    fn event_recorder(&self) -> &CoreRecorder {
        &self.state.rec
    }

    fn cycles(&self) -> u64 {
        self.state.rec.unhalted_cycles(self.state.cur_cycle)
    }

    fn instrs(&self) -> u64 {
        self.state.instrs
    }

    fn phase_cycles(&self, phase_length: u64) -> u64 {
        self.state.cur_cycle % phase_length
    }

    fn cur_cycle(&self) -> Cycle {
        self.state.cur_cycle
    }

    fn decode_cycle(&self) -> Cycle {
        self.state.decode_cycle
    }

    fn phase_end_cycle(&self) -> Cycle {
        self.state.phase_end_cycle
    }

    fn push_phase_end(&mut self, phase_length: u64) {
        self.state.phase_end_cycle += phase_length;
    }

    fn counters(&self) -> CoreCounters {
        CoreCounters {
            mispred_branches: self.mispred_branches,
            fetch_stalls: self.fetch_stalls,
            issue_stalls: 0,
        }
    }

    fn reg_ready_cycle(&self, reg: u16) -> Cycle {
        self.state.scoreboard.ready_cycle(reg)
    }
}
