//! Backend structural-hazard timing model.
//!
//! Times the out-of-order backend: uop-queue bandwidth gates decode, the
//! issue width and register-file read ports throttle issue, the
//! instruction window schedules execution ports, and the ROB and the
//! load/store queues bound how far execution runs ahead of retirement.
//! Loads see a fixed L1 latency here plus store-to-load forwarding through
//! a small direct-mapped table; instruction fetch is left to the upstream
//! decode clock.

use std::sync::Arc;

use crate::bbl::{BblInfo, UopKind};
use crate::common::{Address, Cycle, INVALID_ADDRESS};
use crate::config::OOOParams;
use crate::core::recorder::CoreRecorder;
use crate::core::rob::{CycleQueue, ReorderBuffer};
use crate::core::window::{SCHED_HORIZON, WindowStructure};
use crate::core::{Core, CoreState, DISPATCH_STAGE, ISSUE_STAGE, L1D_LAT, LsuState};
use crate::sim::SimGlobals;
use crate::stats::CoreCounters;

/// Store-forwarding table size: two lines' worth of 4-byte blocks.
const FWD_ENTRIES: usize = 32;

/// Last store cycle to a 4-byte-aligned block, direct-mapped by
/// `(addr >> 2) & (FWD_ENTRIES - 1)`.
#[derive(Debug, Clone, Copy)]
struct FwdEntry {
    addr: Address,
    store_cycle: Cycle,
}

/// Backend timing engine.
pub struct IssueModel {
    state: CoreState,
    lsu: LsuState,

    width: u32,
    prf_ports: u32,

    ins_window: WindowStructure,
    rob: ReorderBuffer,
    /* The LSU queues are modelled like the ROB: entries are grabbed in
     * dataflow order and leave in program order. The associative lookup
     * lives in the forwarding table; these only model capacity. */
    load_queue: ReorderBuffer,
    store_queue: ReorderBuffer,
    uop_queue: CycleQueue,

    cur_cycle_issued_uops: u32,
    cur_cycle_rf_reads: u32,

    fwd_array: [FwdEntry; FWD_ENTRIES],

    issue_stalls: u64,
}

impl IssueModel {
    /// Creates a backend core with the configured structure capacities.
    pub fn new(params: &OOOParams, name: String, phase_length: u64) -> Self {
        Self {
            state: CoreState::new(name, phase_length),
            lsu: LsuState::new(),
            width: params.width,
            prf_ports: params.prf_ports,
            ins_window: WindowStructure::new(SCHED_HORIZON, params.ins_win_cap as u32),
            rob: ReorderBuffer::new(params.rob_cap, params.width),
            load_queue: ReorderBuffer::new(params.load_queue_cap, params.width),
            store_queue: ReorderBuffer::new(params.store_queue_cap, params.width),
            uop_queue: CycleQueue::new(params.issue_queue_cap),
            cur_cycle_issued_uops: 0,
            cur_cycle_rf_reads: 0,
            fwd_array: [FwdEntry {
                addr: INVALID_ADDRESS,
                store_cycle: 0,
            }; FWD_ENTRIES],
            issue_stalls: 0,
        }
    }

    /// Issue-width stall count.
    pub fn issue_stalls(&self) -> u64 {
        self.issue_stalls
    }

    /// The forwarding cycle recorded for `addr`, if its block still tags it.
    pub fn forward_cycle(&self, addr: Address) -> Option<Cycle> {
        let entry = self.fwd_array[fwd_index(addr)];
        (entry.addr == addr).then_some(entry.store_cycle)
    }

    /// Runs the deferred block through the full backend.
    fn simulate_prev(&mut self, prev: &BblInfo, globals: &SimGlobals) {
        let s = &mut self.state;

        let mut load_idx: usize = 0;
        let mut store_idx: usize = 0;
        let mut prev_dec_cycle: u32 = 0;

        for uop in &prev.bbl.uops {
            // Decode is gated by the uop queue as well as the decoders.
            let dec_diff = uop.dec_cycle - prev_dec_cycle;
            s.decode_cycle =
                (s.decode_cycle + Cycle::from(dec_diff)).max(self.uop_queue.min_alloc_cycle());
            if s.decode_cycle > s.cur_cycle {
                let stall = s.decode_cycle - s.cur_cycle;
                self.cur_cycle_issued_uops = 0;
                self.cur_cycle_rf_reads = 0;
                for _ in 0..stall {
                    self.ins_window.advance_pos(&mut s.cur_cycle);
                }
            }
            prev_dec_cycle = uop.dec_cycle;
            self.uop_queue.mark_leave(s.cur_cycle);

            // Issue width limit
            if self.cur_cycle_issued_uops >= self.width {
                self.issue_stalls += 1;
                self.cur_cycle_issued_uops = 0;
                self.cur_cycle_rf_reads = 0;
                self.ins_window.advance_pos(&mut s.cur_cycle);
            }
            self.cur_cycle_issued_uops += 1;

            let (c0, c1) = s.scoreboard.source_cycles(s.cur_cycle, uop.rs);

            // RF read stalls: operands not in flight at issue go through
            // the register file and compete for its read ports.
            self.cur_cycle_rf_reads +=
                u32::from(c0 < s.cur_cycle) + u32::from(c1 < s.cur_cycle);
            if self.cur_cycle_rf_reads > self.prf_ports {
                self.cur_cycle_rf_reads -= self.prf_ports;
                self.cur_cycle_issued_uops = 0;
                self.ins_window.advance_pos(&mut s.cur_cycle);
            }

            let c2 = self.rob.min_alloc_cycle();
            let c3 = s.cur_cycle;
            let c_ops = c0.max(c1);

            // RAT + ROB + RS delay between issue and dispatch
            let mut dispatch_cycle = c_ops.max(c2.max(c3) + (DISPATCH_STAGE - ISSUE_STAGE));

            // The port scheduler may push both clocks forward.
            self.ins_window.schedule(
                &mut s.cur_cycle,
                &mut dispatch_cycle,
                uop.port_mask,
                uop.extra_slots,
            );
            if s.cur_cycle > c3 {
                self.cur_cycle_issued_uops = 0;
                self.cur_cycle_rf_reads = 0;
            }

            let commit_cycle = match uop.kind {
                UopKind::General => dispatch_cycle + Cycle::from(uop.lat),

                UopKind::Load => {
                    dispatch_cycle = dispatch_cycle.max(self.load_queue.min_alloc_cycle());
                    // wait for all previous store addresses to resolve
                    dispatch_cycle = dispatch_cycle.max(self.lsu.last_store_addr_commit_cycle + 1);

                    let addr = self.lsu.load_addrs.get(load_idx);
                    load_idx += 1;
                    let mut req_satisfied_cycle = dispatch_cycle + L1D_LAT;

                    /* Store-to-load forwarding. The forwarding table is
                     * word-granular and therefore stricter than the cache,
                     * which tracks availability per line and does not move
                     * a line's avail cycle on a store. */
                    let fwd = self.fwd_array[fwd_index(addr)];
                    if fwd.addr == addr {
                        req_satisfied_cycle = req_satisfied_cycle.max(fwd.store_cycle);
                    }

                    self.load_queue.mark_retire(req_satisfied_cycle);
                    req_satisfied_cycle
                }

                UopKind::Store => {
                    dispatch_cycle = dispatch_cycle.max(self.store_queue.min_alloc_cycle());
                    // stores queue behind earlier store addresses too
                    dispatch_cycle = dispatch_cycle.max(self.lsu.last_store_addr_commit_cycle + 1);

                    let addr = self.lsu.store_addrs.get(store_idx);
                    store_idx += 1;
                    let req_satisfied_cycle = dispatch_cycle + L1D_LAT;

                    self.fwd_array[fwd_index(addr)] = FwdEntry {
                        addr,
                        store_cycle: req_satisfied_cycle,
                    };

                    self.lsu.last_store_commit_cycle =
                        self.lsu.last_store_commit_cycle.max(req_satisfied_cycle);
                    self.store_queue.mark_retire(req_satisfied_cycle);
                    req_satisfied_cycle
                }

                UopKind::StoreAddr => {
                    let commit = dispatch_cycle + Cycle::from(uop.lat);
                    self.lsu.last_store_addr_commit_cycle =
                        self.lsu.last_store_addr_commit_cycle.max(commit);
                    commit
                }

                UopKind::Fence => {
                    let commit = dispatch_cycle + Cycle::from(uop.lat);
                    // future loads serialise behind everything outstanding
                    self.lsu.last_store_addr_commit_cycle = commit
                        .max(self.lsu.last_store_addr_commit_cycle)
                        .max(self.lsu.last_store_commit_cycle + Cycle::from(uop.lat));
                    commit
                }
            };

            self.rob.mark_retire(commit_cycle);
            s.scoreboard.record_writes(uop.rd, commit_cycle);
        }

        s.instrs += u64::from(prev.instrs);
        assert_eq!(
            s.instrs, globals.counters.total_pcount,
            "{}: retired instruction count diverged from front-end accounting",
            s.name
        );

        // A mismatch here means the decoder and the observed address stream
        // disagree about this block's memory ops.
        assert_eq!(
            load_idx as u32,
            self.lsu.load_addrs.len(),
            "{}: consumed {} load addresses, front-end buffered {}",
            s.name,
            load_idx,
            self.lsu.load_addrs.len()
        );
        assert_eq!(
            store_idx as u32,
            self.lsu.store_addrs.len(),
            "{}: consumed {} store addresses, front-end buffered {}",
            s.name,
            store_idx,
            self.lsu.store_addrs.len()
        );
        self.lsu.clear_bufs();
    }

    /// Bulk advance that drains the instruction window on the way.
    fn advance(&mut self, target_cycle: Cycle) {
        let s = &mut self.state;
        s.decode_cycle += target_cycle - s.cur_cycle;
        self.ins_window.long_advance(&mut s.cur_cycle, target_cycle);
        self.cur_cycle_issued_uops = 0;
        self.cur_cycle_rf_reads = 0;
        debug_assert_eq!(s.cur_cycle, target_cycle);
    }
}

/// Direct-mapped slot of a 4-byte block in the forwarding table.
#[inline]
fn fwd_index(addr: Address) -> usize {
    ((addr >> 2) & (FWD_ENTRIES as u64 - 1)) as usize
}

impl Core for IssueModel {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn bbl(&mut self, _bbl_addr: Address, bbl_info: &Arc<BblInfo>, globals: &mut SimGlobals) {
        let Some(prev) = self.state.defer_bbl(bbl_info) else {
            // first block since scheduling: kill lingering memory ops
            self.lsu.clear_bufs();
            return;
        };
        // no ifetch here: the decode clock upstream carries fetch stalls
        self.simulate_prev(&prev, globals);
        globals.flush_periodic_if_due();
    }

    fn load(&mut self, addr: Address) {
        self.lsu.load_addrs.push(addr);
    }

    fn store(&mut self, addr: Address) {
        self.lsu.store_addrs.push(addr);
    }

    fn pred_load(&mut self, addr: Address, pred: bool) {
        if pred {
            self.lsu.load_addrs.push(addr);
        } else {
            self.lsu.load_addrs.push_pred_false();
        }
    }

    fn pred_store(&mut self, addr: Address, pred: bool) {
        if pred {
            self.lsu.store_addrs.push(addr);
        } else {
            self.lsu.store_addrs.push_pred_false();
        }
    }

    fn join(&mut self, globals: &SimGlobals) {
        let target = self
            .state
            .rec
            .notify_join(self.state.cur_cycle, globals.glob_phase_cycles);
        if target > self.state.cur_cycle {
            self.advance(target);
        }
        self.state.phase_end_cycle = globals.glob_phase_cycles + globals.phase_length;
    }

    fn leave(&mut self) {
        self.state.rec.notify_leave(self.state.cur_cycle);
    }

    fn context_switch(&mut self, gid: i64) {
        if gid == -1 {
            // do not simulate the deferred block; we were switched out
            self.state.prev_bbl = None;
            self.lsu.clear_bufs();
        }
    }

    fn c_sim_start(&mut self) {
        let target = self.state.rec.c_sim_start(self.state.cur_cycle);
        if target > self.state.cur_cycle {
            self.advance(target);
        }
    }

    fn c_sim_end(&mut self) {
        let target = self.state.rec.c_sim_end(self.state.cur_cycle);
        if target > self.state.cur_cycle {
            self.advance(target);
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
            mispred_branches: 0,
            fetch_stalls: 0,
            issue_stalls: self.issue_stalls,
        }
    }

    fn reg_ready_cycle(&self, reg: u16) -> Cycle {
        self.state.scoreboard.ready_cycle(reg)
    }
}
